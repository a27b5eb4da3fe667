//! The types module contains all of the types relevant to the execution challenge game.

use ethers::types::{Bytes, H256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The [StateHash] type is a commitment to a machine state or accumulated value.
pub type StateHash = H256;

/// The [DisputeId] type identifies a single execution challenge. It is the hash of the number of
/// steps, the precondition hash, and the assertion hash.
pub type DisputeId = H256;

/// The two parties to a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// The party that made the [ExecutionAssertion].
    Asserter,
    /// The party that disputes the [ExecutionAssertion].
    Challenger,
}

impl Role {
    /// Returns the opposing [Role].
    pub fn opponent(self) -> Self {
        match self {
            Role::Asserter => Role::Challenger,
            Role::Challenger => Role::Asserter,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Asserter => write!(f, "asserter"),
            Role::Challenger => write!(f, "challenger"),
        }
    }
}

/// The author of a [Move] in the dispute log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    /// One of the two parties.
    Party(Role),
    /// The settlement layer itself, which emits adjudication verdicts.
    Anchor,
}

impl From<Role> for Actor {
    fn from(role: Role) -> Self {
        Actor::Party(role)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Party(role) => role.fmt(f),
            Actor::Anchor => write!(f, "anchor"),
        }
    }
}

/// The [TimeBounds] struct bounds the blocks and timestamps an execution is valid within.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub lower_block: u64,
    pub upper_block: u64,
    pub lower_timestamp: u64,
    pub upper_timestamp: u64,
}

/// The [Precondition] struct commits to the state a disputed execution starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precondition {
    /// The hash of the machine before execution.
    pub before_state: StateHash,
    /// The time bounds the execution ran within.
    pub time_bounds: TimeBounds,
    /// The commitment to the inbox the machine could read from.
    pub inbox: H256,
}

/// The [ExecutionAssertion] struct is the committed claim about the result of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionAssertion {
    /// The hash of the machine after execution.
    pub after_state: StateHash,
    /// The number of steps executed.
    pub num_steps: u64,
    /// The gas consumed by the execution.
    pub num_gas: u64,
    /// Whether or not the machine read from its inbox.
    pub did_inbox_insn: bool,
    /// The hash-chain of every output emitted during the execution.
    pub outputs: H256,
}

/// The [Assertion] struct is the full result of running a machine, as returned by
/// [Machine::execute_assertion](super::Machine::execute_assertion).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assertion {
    pub after_state: StateHash,
    pub num_steps: u64,
    pub num_gas: u64,
    pub did_inbox_insn: bool,
    /// The hashes of the emitted outputs, in emission order.
    pub outputs: Vec<H256>,
}

impl Assertion {
    /// Commits to the [Assertion], producing the [ExecutionAssertion] that is published.
    pub fn stub(&self) -> ExecutionAssertion {
        ExecutionAssertion {
            after_state: self.after_state,
            num_steps: self.num_steps,
            num_gas: self.num_gas,
            did_inbox_insn: self.did_inbox_insn,
            outputs: super::accumulate_outputs(H256::zero(), &self.outputs),
        }
    }
}

/// A [Cut] claims that after `step_count` steps from the start of the dispute, the machine hashes
/// to `state_hash` and the outputs accumulated so far hash to `pending_value_hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cut {
    pub step_count: u64,
    pub state_hash: StateHash,
    pub pending_value_hash: H256,
}

impl Cut {
    /// Creates a new [Cut].
    pub fn new(step_count: u64, state_hash: StateHash, pending_value_hash: H256) -> Self {
        Self {
            step_count,
            state_hash,
            pending_value_hash,
        }
    }
}

/// A [Segment] is the step range between two [Cut]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Cut,
    pub end: Cut,
}

impl Segment {
    /// Creates a new [Segment].
    pub fn new(start: Cut, end: Cut) -> Self {
        Self { start, end }
    }

    /// Returns the number of steps covered by the [Segment].
    pub fn len(&self) -> u64 {
        self.end.step_count.saturating_sub(self.start.step_count)
    }

    /// Returns `true` if the [Segment] covers no steps.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the [Segment] covers exactly one step, which can only be settled by a
    /// one step proof.
    pub fn is_single_step(&self) -> bool {
        self.len() == 1
    }
}

/// A [Bisection] is an ordered sequence of [Cut]s partitioning a [Segment].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bisection {
    cuts: Vec<Cut>,
}

impl Bisection {
    /// Wraps an ordered cut sequence. The sequence is not validated here; see
    /// [check_bisection](super::check_bisection).
    pub fn from_cuts(cuts: Vec<Cut>) -> Self {
        Self { cuts }
    }

    /// Returns the cuts of the [Bisection].
    pub fn cuts(&self) -> &[Cut] {
        &self.cuts
    }

    /// Returns the number of segments the [Bisection] splits its parent into.
    pub fn segment_count(&self) -> usize {
        self.cuts.len().saturating_sub(1)
    }

    /// Returns the segment at `index`, if any.
    pub fn segment(&self, index: usize) -> Option<Segment> {
        Some(Segment::new(
            *self.cuts.get(index)?,
            *self.cuts.get(index + 1)?,
        ))
    }

    /// Returns an iterator over the segments of the [Bisection].
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.cuts.windows(2).map(|w| Segment::new(w[0], w[1]))
    }

    /// Returns the [Segment] spanned by the whole [Bisection].
    pub fn span(&self) -> Option<Segment> {
        Some(Segment::new(*self.cuts.first()?, *self.cuts.last()?))
    }
}

/// The [OneStepProof] struct is the payload of a one step proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneStepProof {
    /// The hash of the machine before the step.
    pub before_state: StateHash,
    /// The hash of the machine after the step.
    pub after_state: StateHash,
    /// The pending value hash after the step.
    pub after_pending: H256,
    /// Machine specific evidence of the executed instruction.
    pub evidence: Bytes,
}

/// The kind of a [Move].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveKind {
    Bisect,
    ChooseSegment,
    OneStepProof,
    Adjudicated,
    Timeout,
}

/// The action carried by a [Move].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveAction {
    /// The asserter splits the disputed segment.
    Bisect(Bisection),
    /// The challenger picks the segment of the pending bisection it disputes.
    ChooseSegment(u64),
    /// A one step proof. The challenger names the one-step segment of the pending bisection it
    /// disputes, the asserter proves its current single step segment.
    OneStepProof {
        segment_index: Option<u64>,
        proof: OneStepProof,
    },
    /// The anchor's verdict on a one step proof.
    Adjudicated(Role),
    /// The waiting party claims a win after the active party's deadline passed.
    Timeout,
}

impl MoveAction {
    /// Returns the [MoveKind] of the action.
    pub fn kind(&self) -> MoveKind {
        match self {
            MoveAction::Bisect(_) => MoveKind::Bisect,
            MoveAction::ChooseSegment(_) => MoveKind::ChooseSegment,
            MoveAction::OneStepProof { .. } => MoveKind::OneStepProof,
            MoveAction::Adjudicated(_) => MoveKind::Adjudicated,
            MoveAction::Timeout => MoveKind::Timeout,
        }
    }
}

/// A [Move] is a single entry of a dispute's append-only event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub actor: Actor,
    pub action: MoveAction,
    pub block_number: u64,
    pub log_index: u64,
}

impl Move {
    /// Returns the position of the [Move] within the log. Moves are totally ordered by position.
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// A [Response] is the action a participant takes given the current state of the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Split the disputed segment.
    Bisect(Bisection),
    /// Dispute the segment at the given index of the pending bisection.
    ChooseSegment(u64),
    /// Submit a one step proof.
    OneStepProof {
        segment_index: Option<u64>,
        proof: OneStepProof,
    },
    /// Claim a win over an opponent that missed its deadline.
    Timeout,
    /// The game is over; nothing left to submit.
    Resolved(Role),
}

impl Response {
    /// Converts the [Response] into the [MoveAction] to submit, if there is one.
    pub fn into_action(self) -> Option<MoveAction> {
        match self {
            Response::Bisect(bisection) => Some(MoveAction::Bisect(bisection)),
            Response::ChooseSegment(index) => Some(MoveAction::ChooseSegment(index)),
            Response::OneStepProof {
                segment_index,
                proof,
            } => Some(MoveAction::OneStepProof {
                segment_index,
                proof,
            }),
            Response::Timeout => Some(MoveAction::Timeout),
            Response::Resolved(_) => None,
        }
    }
}
