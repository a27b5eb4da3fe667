//! The asserter module contains the [Solver] for the party defending an execution assertion.

use super::{
    build_one_step_proof, check_turn, propose_bisection, replay_to, ChallengeError,
    ChallengeState, Dispute, Machine, Precondition, Response, Role, Solver,
};

/// The [Asserter] defends its [ExecutionAssertion](super::ExecutionAssertion) by bisecting every
/// segment the challenger disputes, and proving the final single step.
#[derive(Debug, Clone)]
pub struct Asserter<M> {
    precondition: Precondition,
    /// The asserter's own machine, positioned at the start of the dispute.
    machine: M,
}

impl<M: Machine> Asserter<M> {
    /// Creates a new [Asserter] for `dispute`. `machine` must be in the dispute's starting state.
    pub fn try_new(dispute: &Dispute, machine: M) -> Result<Self, ChallengeError> {
        if machine.hash() != dispute.precondition.before_state {
            return Err(ChallengeError::InvalidAssertion(
                "machine does not match the precondition".to_string(),
            ));
        }
        Ok(Self {
            precondition: dispute.precondition,
            machine,
        })
    }
}

impl<M: Machine> Solver for Asserter<M> {
    fn role(&self) -> Role {
        Role::Asserter
    }

    fn respond(
        &self,
        state: &ChallengeState,
        current_block: u64,
    ) -> Result<Response, ChallengeError> {
        if let Some(response) = check_turn(Role::Asserter, state, current_block)? {
            return Ok(response);
        }

        let segment = &state.segment;
        let at_start = replay_to(&self.machine, segment.start.step_count, &self.precondition)?;

        if segment.is_single_step() {
            tracing::info!(
                target: "asserter",
                "Proving step {} -> {} in dispute {:?}",
                segment.start.step_count,
                segment.end.step_count,
                state.dispute_id
            );
            let proof = build_one_step_proof(&at_start, &segment.start, &self.precondition)?;
            return Ok(Response::OneStepProof {
                segment_index: None,
                proof,
            });
        }

        let bisection =
            propose_bisection(segment, &at_start, state.params.segment_count, &self.precondition)?;
        tracing::info!(
            target: "asserter",
            "Bisecting steps {}..{} into {} segments in dispute {:?}",
            segment.start.step_count,
            segment.end.step_count,
            bisection.segment_count(),
            state.dispute_id
        );
        Ok(Response::Bisect(bisection))
    }
}
