//! The machine module holds the [Machine] trait, the interface to the deterministic interpreter
//! whose execution is being disputed.

use super::{Assertion, StateHash, TimeBounds};
use ethers::types::{Bytes, H256};

/// The [Machine] trait defines the interface of the interpreter a dispute is played over.
///
/// `Clone` must produce an independent deep copy: each participant advances its own copy and no
/// state may be shared between copies.
pub trait Machine: Clone + Send + Sync + 'static {
    /// Returns the hash of the current machine state.
    fn hash(&self) -> StateHash;

    /// Runs the machine for up to `max_steps` steps.
    ///
    /// ### Takes
    /// - `max_steps`: The maximum number of steps to execute.
    /// - `time_bounds`: The time bounds the execution is valid within.
    /// - `inbox`: The inbox commitment the machine may read.
    ///
    /// ### Returns
    /// - The [Assertion] describing the run, and the number of steps actually executed. The
    ///   machine may stop early if it halts.
    fn execute_assertion(
        &mut self,
        max_steps: u64,
        time_bounds: &TimeBounds,
        inbox: H256,
    ) -> (Assertion, u64);

    /// Returns the evidence the anchor needs to replay the next instruction.
    fn one_step_proof(&self) -> Bytes;
}
