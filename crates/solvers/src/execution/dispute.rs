//! The dispute module holds the parameters and identity of a single execution challenge.

use super::{
    dispute_id, hash_assertion, hash_precondition, ChallengeError, ChallengeState, Cut, DisputeId,
    ExecutionAssertion, Machine, Precondition, Segment, TimeBounds,
};
use ethers::types::H256;
use serde::{Deserialize, Serialize};

/// The default number of segments per bisection.
pub const DEFAULT_SEGMENT_COUNT: u64 = 4;

/// The default number of blocks a party has to respond.
pub const DEFAULT_CHALLENGE_PERIOD: u64 = 20;

/// The default maximum number of steps a single assertion may cover.
pub const DEFAULT_MAX_STEPS: u64 = 1 << 32;

/// The [GameParams] struct holds the protocol parameters every participant and the anchor agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameParams {
    /// The number of segments a bisection splits the disputed segment into.
    pub segment_count: u64,
    /// The number of blocks the active party has to move before it can be timed out.
    pub challenge_period: u64,
    /// The maximum number of steps an assertion may cover.
    pub max_steps: u64,
}

impl GameParams {
    /// Validates the [GameParams].
    pub fn validate(&self) -> Result<(), ChallengeError> {
        if self.segment_count < 2 {
            return Err(ChallengeError::InvalidParams(format!(
                "segment count must be at least 2, got {}",
                self.segment_count
            )));
        }
        if self.challenge_period == 0 {
            return Err(ChallengeError::InvalidParams(
                "challenge period must be at least one block".to_string(),
            ));
        }
        if self.max_steps == 0 {
            return Err(ChallengeError::InvalidParams(
                "max steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for GameParams {
    fn default() -> Self {
        Self {
            segment_count: DEFAULT_SEGMENT_COUNT,
            challenge_period: DEFAULT_CHALLENGE_PERIOD,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// A [Dispute] is a committed [Precondition] and [ExecutionAssertion] under challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub precondition: Precondition,
    pub assertion: ExecutionAssertion,
    pub params: GameParams,
    /// The block the dispute was opened in.
    pub opened_at: u64,
}

impl Dispute {
    /// Creates a new [Dispute], validating the parameters and the assertion's step count.
    pub fn new(
        precondition: Precondition,
        assertion: ExecutionAssertion,
        params: GameParams,
        opened_at: u64,
    ) -> Result<Self, ChallengeError> {
        params.validate()?;
        if assertion.num_steps == 0 {
            return Err(ChallengeError::InvalidAssertion(
                "an assertion must cover at least one step".to_string(),
            ));
        }
        if assertion.num_steps > params.max_steps {
            return Err(ChallengeError::InvalidAssertion(format!(
                "{} steps exceeds the maximum of {}",
                assertion.num_steps, params.max_steps
            )));
        }

        Ok(Self {
            precondition,
            assertion,
            params,
            opened_at,
        })
    }

    /// Runs `machine` for up to `max_steps` steps and builds the [Dispute] over the resulting
    /// claim.
    pub fn from_execution<M: Machine>(
        machine: &M,
        max_steps: u64,
        time_bounds: TimeBounds,
        inbox: H256,
        params: GameParams,
        opened_at: u64,
    ) -> Result<Self, ChallengeError> {
        let precondition = Precondition {
            before_state: machine.hash(),
            time_bounds,
            inbox,
        };
        let mut after = machine.clone();
        let (assertion, _) = after.execute_assertion(max_steps, &time_bounds, inbox);
        Self::new(precondition, assertion.stub(), params, opened_at)
    }

    /// Returns the identity of the [Dispute].
    pub fn id(&self) -> DisputeId {
        dispute_id(
            self.assertion.num_steps,
            hash_precondition(&self.precondition),
            hash_assertion(&self.assertion),
        )
    }

    /// Returns the cut at step 0, fixed by the [Precondition].
    pub fn start_cut(&self) -> Cut {
        Cut::new(0, self.precondition.before_state, H256::zero())
    }

    /// Returns the cut at the final step, fixed by the [ExecutionAssertion].
    pub fn end_cut(&self) -> Cut {
        Cut::new(
            self.assertion.num_steps,
            self.assertion.after_state,
            self.assertion.outputs,
        )
    }

    /// Returns the full disputed [Segment].
    pub fn segment(&self) -> Segment {
        Segment::new(self.start_cut(), self.end_cut())
    }

    /// Returns the [ChallengeState] every dispute starts in.
    pub fn initial_state(&self) -> ChallengeState {
        ChallengeState::new(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::execution::AlphabetMachine;

    #[test]
    fn rejects_unplayable_parameters() {
        let params = GameParams {
            segment_count: 1,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(ChallengeError::InvalidParams(_))));

        let params = GameParams {
            challenge_period: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
        assert!(GameParams::default().validate().is_ok());
    }

    #[test]
    fn step_count_is_bounded() {
        let machine = AlphabetMachine::default();
        let params = GameParams {
            max_steps: 100,
            ..Default::default()
        };
        let build = |steps| {
            Dispute::from_execution(&machine, steps, TimeBounds::default(), H256::zero(), params, 0)
        };

        assert!(matches!(build(0), Err(ChallengeError::InvalidAssertion(_))));
        assert!(matches!(build(101), Err(ChallengeError::InvalidAssertion(_))));
        assert!(build(100).is_ok());
    }

    #[test]
    fn fixed_cuts_come_from_the_claim() {
        let machine = AlphabetMachine::default();
        let dispute = Dispute::from_execution(
            &machine,
            500,
            TimeBounds::default(),
            H256::zero(),
            GameParams::default(),
            7,
        )
        .unwrap();

        assert_eq!(dispute.start_cut().step_count, 0);
        assert_eq!(dispute.start_cut().state_hash, machine.hash());
        assert_eq!(dispute.end_cut().step_count, 500);
        assert_eq!(dispute.segment().len(), 500);
        assert_eq!(dispute.initial_state().deadline, 7 + DEFAULT_CHALLENGE_PERIOD);
    }
}
