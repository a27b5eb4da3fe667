//! The adjudicator module holds the [OneStepAdjudicator] trait, the settlement layer's verdict on
//! a single disputed step, and a replay based reference implementation.

use super::{
    build_one_step_proof, replay_to, Cut, Dispute, Machine, OneStepProof, Precondition, Role,
};

/// The [OneStepAdjudicator] trait is the settlement layer's decision function for a single step.
/// Its verdict is final.
pub trait OneStepAdjudicator: Send + Sync {
    /// Re-executes the step from `start` and awards the asserter if the result matches `end`.
    fn adjudicate(&self, start: &Cut, end: &Cut, proof: &OneStepProof) -> Role;
}

/// An adjudicator that reconstructs the start state from a trusted machine and re-executes the
/// step itself.
#[derive(Debug, Clone)]
pub struct ReplayAdjudicator<M> {
    precondition: Precondition,
    /// The trusted machine, positioned at the start of the dispute.
    machine: M,
}

impl<M: Machine> ReplayAdjudicator<M> {
    /// Creates a new [ReplayAdjudicator] for `dispute`.
    pub fn new(dispute: &Dispute, machine: M) -> Self {
        Self {
            precondition: dispute.precondition,
            machine,
        }
    }
}

impl<M: Machine> OneStepAdjudicator for ReplayAdjudicator<M> {
    fn adjudicate(&self, start: &Cut, end: &Cut, proof: &OneStepProof) -> Role {
        if end.step_count != start.step_count + 1 {
            tracing::warn!(target: "adjudicator", "Asked to adjudicate {} steps", end.step_count.saturating_sub(start.step_count));
            return Role::Challenger;
        }

        // Without a preimage for the start state there is nothing the asserter's claim can be
        // checked against.
        let at_start = match replay_to(&self.machine, start.step_count, &self.precondition) {
            Ok(machine) if machine.hash() == start.state_hash => machine,
            _ => {
                tracing::warn!(target: "adjudicator", "No preimage for the state at step {}", start.step_count);
                return Role::Challenger;
            }
        };
        if proof.evidence != at_start.one_step_proof() {
            tracing::debug!(target: "adjudicator", "Submitted evidence differs from the replayed instruction");
        }

        match build_one_step_proof(&at_start, start, &self.precondition) {
            Ok(expected)
                if expected.after_state == end.state_hash
                    && expected.after_pending == end.pending_value_hash =>
            {
                Role::Asserter
            }
            _ => Role::Challenger,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::execution::{propose_bisection, AlphabetMachine, GameParams, TimeBounds};
    use ethers::types::H256;

    fn cuts(machine: &AlphabetMachine, steps: u64) -> (Dispute, Vec<Cut>) {
        let dispute = Dispute::from_execution(
            machine,
            steps,
            TimeBounds::default(),
            H256::zero(),
            GameParams {
                segment_count: steps,
                ..Default::default()
            },
            0,
        )
        .unwrap();
        let bisection =
            propose_bisection(&dispute.segment(), machine, steps, &dispute.precondition).unwrap();
        (dispute, bisection.cuts().to_vec())
    }

    fn proof(machine: &AlphabetMachine, start: &Cut, dispute: &Dispute) -> OneStepProof {
        let at_start = replay_to(machine, start.step_count, &dispute.precondition).unwrap();
        build_one_step_proof(&at_start, start, &dispute.precondition).unwrap()
    }

    #[test]
    fn correct_steps_go_to_the_asserter() {
        let machine = AlphabetMachine::default();
        let (dispute, cuts) = cuts(&machine, 12);
        let adjudicator = ReplayAdjudicator::new(&dispute, machine.clone());

        for w in cuts.windows(2) {
            let p = proof(&machine, &w[0], &dispute);
            assert_eq!(adjudicator.adjudicate(&w[0], &w[1], &p), Role::Asserter);
        }
    }

    #[test]
    fn faulty_steps_go_to_the_challenger() {
        let honest = AlphabetMachine::default();
        let faulty = AlphabetMachine::default().with_fault_at(7);
        let (dispute, cuts) = cuts(&faulty, 12);
        let adjudicator = ReplayAdjudicator::new(&dispute, honest);

        let p = proof(&faulty, &cuts[6], &dispute);
        assert_eq!(adjudicator.adjudicate(&cuts[6], &cuts[7], &p), Role::Challenger);
        assert_eq!(
            adjudicator.adjudicate(&cuts[5], &cuts[6], &proof(&faulty, &cuts[5], &dispute)),
            Role::Asserter
        );
        // Past the fault the start state itself has no honest preimage.
        assert_eq!(
            adjudicator.adjudicate(&cuts[7], &cuts[8], &proof(&faulty, &cuts[7], &dispute)),
            Role::Challenger
        );
    }

    #[test]
    fn multi_step_ranges_are_never_upheld() {
        let machine = AlphabetMachine::default();
        let (dispute, cuts) = cuts(&machine, 4);
        let adjudicator = ReplayAdjudicator::new(&dispute, machine.clone());
        let p = proof(&machine, &cuts[0], &dispute);
        assert_eq!(adjudicator.adjudicate(&cuts[0], &cuts[2], &p), Role::Challenger);
    }
}
