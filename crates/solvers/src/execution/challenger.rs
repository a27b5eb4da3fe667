//! The challenger module contains the [Solver] for the party disputing an execution assertion.

use super::{
    build_one_step_proof, check_bisection, check_turn, replay_to, select_disagreement,
    ChallengeError, ChallengePhase, ChallengeState, ChallengeStrategy, Dispute, Machine,
    Precondition, Response, Role, Solver, StandardStrategy,
};

/// The [Challenger] disputes an [ExecutionAssertion](super::ExecutionAssertion) by replaying every
/// bisection the asserter makes and picking the segment it disagrees with.
#[derive(Debug)]
pub struct Challenger<M> {
    precondition: Precondition,
    /// The challenger's own machine, positioned at the start of the dispute.
    machine: M,
    strategy: Box<dyn ChallengeStrategy>,
}

impl<M: Machine> Challenger<M> {
    /// Creates a new [Challenger] for `dispute` playing the [StandardStrategy]. `machine` must be
    /// in the dispute's starting state.
    pub fn try_new(dispute: &Dispute, machine: M) -> Result<Self, ChallengeError> {
        if machine.hash() != dispute.precondition.before_state {
            return Err(ChallengeError::InvalidAssertion(
                "machine does not match the precondition".to_string(),
            ));
        }
        Ok(Self {
            precondition: dispute.precondition,
            machine,
            strategy: Box::new(StandardStrategy),
        })
    }

    /// Replaces the [ChallengeStrategy].
    pub fn with_strategy(mut self, strategy: impl ChallengeStrategy + 'static) -> Self {
        self.strategy = Box::new(strategy);
        self
    }
}

impl<M: Machine> Solver for Challenger<M> {
    fn role(&self) -> Role {
        Role::Challenger
    }

    fn respond(
        &self,
        state: &ChallengeState,
        current_block: u64,
    ) -> Result<Response, ChallengeError> {
        if let Some(response) = check_turn(Role::Challenger, state, current_block)? {
            return Ok(response);
        }
        let ChallengePhase::ChallengerTurn { bisection } = &state.phase else {
            return Err(ChallengeError::NotMyTurn(Role::Challenger));
        };

        check_bisection(bisection, &state.segment, state.params.segment_count)?;
        let base = state.segment.start.step_count;
        let at_start = replay_to(&self.machine, base, &self.precondition)?;

        let divergence = select_disagreement(bisection, &at_start, &self.precondition);
        if let Err(e) = &divergence {
            tracing::warn!(target: "challenger", "Local replay of dispute {:?}: {}", state.dispute_id, e);
        }
        let index = self.strategy.choose_segment(bisection, divergence)?;
        let segment = bisection
            .segment(index)
            .ok_or(ChallengeError::SegmentOutOfRange {
                index: index as u64,
                count: bisection.segment_count() as u64,
            })?;

        if segment.is_single_step() {
            tracing::info!(
                target: "challenger",
                "Forcing a one step proof of step {} -> {} in dispute {:?}",
                segment.start.step_count,
                segment.end.step_count,
                state.dispute_id
            );
            let at_step =
                replay_to(&at_start, segment.start.step_count - base, &self.precondition)?;
            let proof = build_one_step_proof(&at_step, &segment.start, &self.precondition)?;
            return Ok(Response::OneStepProof {
                segment_index: Some(index as u64),
                proof,
            });
        }

        tracing::info!(
            target: "challenger",
            "Disputing segment {} (steps {}..{}) in dispute {:?}",
            index,
            segment.start.step_count,
            segment.end.step_count,
            state.dispute_id
        );
        Ok(Response::ChooseSegment(index as u64))
    }
}
