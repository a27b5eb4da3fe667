//! The strategy module holds the pluggable segment selection used by the
//! [Challenger](super::Challenger).

use super::{Bisection, ChallengeError};
use std::fmt::Debug;

/// The [ChallengeStrategy] trait decides which segment of a bisection the challenger disputes.
pub trait ChallengeStrategy: Send + Sync + Debug {
    /// Chooses the segment to dispute.
    ///
    /// ### Takes
    /// - `bisection`: The validated bisection.
    /// - `divergence`: The result of replaying the bisection locally: the first divergent segment,
    ///   or [ChallengeError::DisagreementNotFound].
    ///
    /// ### Returns
    /// - `Ok(usize)`: The index of the segment to dispute.
    /// - `Err(ChallengeError)`: The challenger gives up.
    fn choose_segment(
        &self,
        bisection: &Bisection,
        divergence: Result<usize, ChallengeError>,
    ) -> Result<usize, ChallengeError>;
}

/// Disputes the first segment local execution disagrees with, and concedes when there is none.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardStrategy;

impl ChallengeStrategy for StandardStrategy {
    fn choose_segment(
        &self,
        _: &Bisection,
        divergence: Result<usize, ChallengeError>,
    ) -> Result<usize, ChallengeError> {
        divergence
    }
}

/// Always disputes the segment at `index` (clamped to the last segment), whatever local execution
/// says. A challenger playing this against an honest asserter loses at the one step proof.
#[derive(Debug, Clone, Copy)]
pub struct FixedSegmentStrategy {
    pub index: usize,
}

impl ChallengeStrategy for FixedSegmentStrategy {
    fn choose_segment(
        &self,
        bisection: &Bisection,
        _: Result<usize, ChallengeError>,
    ) -> Result<usize, ChallengeError> {
        Ok(self.index.min(bisection.segment_count().saturating_sub(1)))
    }
}
