//! The game module holds the [Solver] trait.

use super::{ChallengeError, ChallengeState, Response, Role};

/// The [Solver] trait defines the interface for a participant's local strategy in an execution
/// challenge.
pub trait Solver: Send + Sync {
    /// Returns the [Role] the solver plays.
    fn role(&self) -> Role;

    /// Respond to the current state of the dispute.
    ///
    /// ### Takes
    /// - `state`: The [ChallengeState], caught up with the move log.
    /// - `current_block`: The current block height of the settlement layer.
    ///
    /// ### Returns
    /// - `Ok(Response)`: The move to submit, or [Response::Resolved] if the game is over.
    /// - `Err(ChallengeError)`: The solver cannot move. Errors for which
    ///   [ChallengeError::is_wait] holds mean the caller should keep watching the game.
    fn respond(
        &self,
        state: &ChallengeState,
        current_block: u64,
    ) -> Result<Response, ChallengeError>;
}

/// Handles every situation in which `role` does not get to make a regular move.
///
/// ### Returns
/// - `Ok(Some(Response))`: The game is over, or the opponent missed its deadline.
/// - `Ok(None)`: It is `role`'s turn and its deadline has not passed.
/// - `Err(ChallengeError)`: A wait condition.
pub(crate) fn check_turn(
    role: Role,
    state: &ChallengeState,
    current_block: u64,
) -> Result<Option<Response>, ChallengeError> {
    if let Some(winner) = state.winner() {
        return Ok(Some(Response::Resolved(winner)));
    }

    match state.phase.active() {
        None => Err(ChallengeError::AwaitingAdjudication),
        Some(active) if active != role => {
            if state.is_expired(current_block) {
                Ok(Some(Response::Timeout))
            } else {
                Err(ChallengeError::NotMyTurn(role))
            }
        }
        Some(_) if state.is_expired(current_block) => Err(ChallengeError::DeadlineExpired {
            deadline: state.deadline,
            current: current_block,
        }),
        Some(_) => Ok(None),
    }
}
