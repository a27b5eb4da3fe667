//! The error module contains the [ChallengeError] type.

use super::{Actor, MoveKind, Role};
use thiserror::Error;

/// The [ChallengeError] enum covers every way a move can be illegal or a participant can be unable
/// to respond.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    /// It is the opponent's turn.
    #[error("not the {0}'s turn")]
    NotMyTurn(Role),

    /// A one step proof has been submitted and the anchor has not ruled on it yet.
    #[error("awaiting adjudication of a one step proof")]
    AwaitingAdjudication,

    /// The participant's own deadline has passed; the opponent may claim a timeout.
    #[error("deadline at block {deadline} has passed (current block {current})")]
    DeadlineExpired { deadline: u64, current: u64 },

    /// The game has already been resolved.
    #[error("dispute already resolved in favor of the {0}")]
    GameOver(Role),

    /// A bisection failed validation against the disputed segment.
    #[error("invalid bisection: {0}")]
    InvalidBisection(String),

    /// A segment shorter than two steps cannot be bisected.
    #[error("segment of {0} steps cannot be bisected")]
    SegmentTooShort(u64),

    /// A one step proof over a segment that is not exactly one step long.
    #[error("one step proof over a segment of {0} steps")]
    NotSingleStep(u64),

    /// A segment index does not exist in the pending bisection.
    #[error("segment index {index} out of range for {count} segments")]
    SegmentOutOfRange { index: u64, count: u64 },

    /// Local replay agrees with every cut of the claimed bisection.
    #[error("no disagreement found with the claimed bisection")]
    DisagreementNotFound,

    /// A move that is not legal for its author in the current phase.
    #[error("{actor} may not submit {kind:?} during {phase}")]
    IllegalMove {
        actor: Actor,
        kind: MoveKind,
        phase: &'static str,
    },

    /// A move mined after the active party's deadline.
    #[error("move at block {block} is past the deadline at block {deadline}")]
    LateMove { block: u64, deadline: u64 },

    /// A timeout claimed before the deadline passed.
    #[error("timeout at block {block} claimed before the deadline at block {deadline}")]
    PrematureTimeout { block: u64, deadline: u64 },

    /// The machine stopped before reaching a requested step.
    #[error("machine halted after {executed} of {requested} steps")]
    MachineHalted { executed: u64, requested: u64 },

    /// An assertion that cannot be disputed.
    #[error("invalid assertion: {0}")]
    InvalidAssertion(String),

    /// Game parameters that cannot produce a playable game.
    #[error("invalid game parameters: {0}")]
    InvalidParams(String),
}

impl ChallengeError {
    /// Returns `true` if the error only means the participant should keep watching the game.
    pub fn is_wait(&self) -> bool {
        matches!(
            self,
            ChallengeError::NotMyTurn(_)
                | ChallengeError::AwaitingAdjudication
                | ChallengeError::DeadlineExpired { .. }
        )
    }
}
