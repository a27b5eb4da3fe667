//! The state module holds the [ChallengeState] of a dispute and the rules for folding the move
//! log into it.
//!
//! The move log is the only source of truth. A [ChallengeState] is always derived by folding the
//! log from [Dispute::initial_state], either all at once with [ChallengeState::replay] or
//! incrementally with [ChallengeState::catch_up]. Both produce the same state for the same log.

use super::{
    check_bisection, hash_bisection, Actor, Bisection, ChallengeError, Dispute, DisputeId,
    GameParams, Move, MoveAction, OneStepProof, Role, Segment,
};
use ethers::types::H256;
use serde::{Deserialize, Serialize};

/// The phase of a dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengePhase {
    /// The asserter must bisect the disputed segment, or prove it if it is a single step.
    AsserterTurn,
    /// The challenger must pick a segment of the pending bisection.
    ChallengerTurn { bisection: Bisection },
    /// A one step proof awaits the anchor's verdict.
    OneStepProofPending { submitter: Role, proof: OneStepProof },
    /// The asserter won the dispute.
    AsserterWon,
    /// The challenger won the dispute.
    ChallengerWon,
}

impl ChallengePhase {
    /// Returns the terminal phase won by `role`.
    pub fn won_by(role: Role) -> Self {
        match role {
            Role::Asserter => ChallengePhase::AsserterWon,
            Role::Challenger => ChallengePhase::ChallengerWon,
        }
    }

    /// Returns the winner, if the phase is terminal.
    pub fn winner(&self) -> Option<Role> {
        match self {
            ChallengePhase::AsserterWon => Some(Role::Asserter),
            ChallengePhase::ChallengerWon => Some(Role::Challenger),
            _ => None,
        }
    }

    /// Returns the party expected to move, if any.
    pub fn active(&self) -> Option<Role> {
        match self {
            ChallengePhase::AsserterTurn => Some(Role::Asserter),
            ChallengePhase::ChallengerTurn { .. } => Some(Role::Challenger),
            _ => None,
        }
    }

    /// Returns a short name for the phase, for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            ChallengePhase::AsserterTurn => "AsserterTurn",
            ChallengePhase::ChallengerTurn { .. } => "ChallengerTurn",
            ChallengePhase::OneStepProofPending { .. } => "OneStepProofPending",
            ChallengePhase::AsserterWon => "AsserterWon",
            ChallengePhase::ChallengerWon => "ChallengerWon",
        }
    }
}

/// The [ChallengeState] struct is the state of a dispute as derived from its move log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeState {
    /// The identity of the dispute.
    pub dispute_id: DisputeId,
    /// The parameters the dispute is played with.
    pub params: GameParams,
    /// The current phase.
    pub phase: ChallengePhase,
    /// The currently disputed segment.
    pub segment: Segment,
    /// The last block the active party may move in.
    pub deadline: u64,
    /// The number of bisections made so far.
    pub rounds: u64,
    /// The position of the last observed move.
    cursor: Option<(u64, u64)>,
}

impl ChallengeState {
    /// Creates the initial [ChallengeState] of `dispute`: the asserter's turn over the full range.
    pub fn new(dispute: &Dispute) -> Self {
        Self {
            dispute_id: dispute.id(),
            params: dispute.params,
            phase: ChallengePhase::AsserterTurn,
            segment: dispute.segment(),
            deadline: dispute.opened_at + dispute.params.challenge_period,
            rounds: 0,
            cursor: None,
        }
    }

    /// Folds an entire move log into a fresh [ChallengeState].
    pub fn replay<'a>(dispute: &Dispute, moves: impl IntoIterator<Item = &'a Move>) -> Self {
        let mut state = Self::new(dispute);
        state.catch_up(moves);
        state
    }

    /// Folds newly observed moves into the state. Moves at or before the last observed position
    /// are ignored and invalid moves are skipped.
    ///
    /// ### Returns
    /// - The number of moves that changed the state.
    pub fn catch_up<'a>(&mut self, moves: impl IntoIterator<Item = &'a Move>) -> usize {
        let mut applied = 0;
        for mv in moves {
            match self.apply(mv) {
                Ok(true) => {
                    applied += 1;
                    tracing::debug!(
                        target: "challenge-state",
                        "Applied {:?} by {} at block {}, now {}",
                        mv.action.kind(),
                        mv.actor,
                        mv.block_number,
                        self.phase.name()
                    );
                }
                Ok(false) => {}
                Err(e) => {
                    // An entry already in the log is consumed even when it is invalid.
                    self.cursor = Some(mv.position());
                    tracing::warn!(
                        target: "challenge-state",
                        "Skipping invalid {:?} by {} at block {}: {}",
                        mv.action.kind(),
                        mv.actor,
                        mv.block_number,
                        e
                    );
                }
            }
        }
        applied
    }

    /// Applies a single move.
    ///
    /// ### Returns
    /// - `Ok(true)`: The move was applied.
    /// - `Ok(false)`: The move was already observed.
    /// - `Err(ChallengeError)`: The move is illegal; the state, cursor included, is unchanged.
    pub fn apply(&mut self, mv: &Move) -> Result<bool, ChallengeError> {
        if self.cursor.map_or(false, |cursor| mv.position() <= cursor) {
            return Ok(false);
        }
        let mut next = self.transition(mv)?;
        next.cursor = Some(mv.position());
        *self = next;
        Ok(true)
    }

    fn transition(&self, mv: &Move) -> Result<Self, ChallengeError> {
        if let Some(winner) = self.winner() {
            return Err(ChallengeError::GameOver(winner));
        }

        let mut next = self.clone();
        match (&self.phase, mv.actor, &mv.action) {
            (
                ChallengePhase::AsserterTurn,
                Actor::Party(Role::Asserter),
                MoveAction::Bisect(bisection),
            ) => {
                self.check_on_time(mv.block_number)?;
                check_bisection(bisection, &self.segment, self.params.segment_count)?;
                next.phase = ChallengePhase::ChallengerTurn {
                    bisection: bisection.clone(),
                };
                next.deadline = mv.block_number + self.params.challenge_period;
                next.rounds += 1;
            }
            (
                ChallengePhase::ChallengerTurn { bisection },
                Actor::Party(Role::Challenger),
                MoveAction::ChooseSegment(index),
            ) => {
                self.check_on_time(mv.block_number)?;
                next.segment = pending_segment(bisection, *index)?;
                next.phase = ChallengePhase::AsserterTurn;
                next.deadline = mv.block_number + self.params.challenge_period;
            }
            (
                ChallengePhase::AsserterTurn,
                Actor::Party(Role::Asserter),
                MoveAction::OneStepProof {
                    segment_index: None,
                    proof,
                },
            ) => {
                self.check_on_time(mv.block_number)?;
                if !self.segment.is_single_step() {
                    return Err(ChallengeError::NotSingleStep(self.segment.len()));
                }
                next.phase = ChallengePhase::OneStepProofPending {
                    submitter: Role::Asserter,
                    proof: proof.clone(),
                };
            }
            (
                ChallengePhase::ChallengerTurn { bisection },
                Actor::Party(Role::Challenger),
                MoveAction::OneStepProof {
                    segment_index: Some(index),
                    proof,
                },
            ) => {
                self.check_on_time(mv.block_number)?;
                let segment = pending_segment(bisection, *index)?;
                if !segment.is_single_step() {
                    return Err(ChallengeError::NotSingleStep(segment.len()));
                }
                next.segment = segment;
                next.phase = ChallengePhase::OneStepProofPending {
                    submitter: Role::Challenger,
                    proof: proof.clone(),
                };
            }
            (
                ChallengePhase::OneStepProofPending { .. },
                Actor::Anchor,
                MoveAction::Adjudicated(winner),
            ) => {
                next.phase = ChallengePhase::won_by(*winner);
            }
            (
                ChallengePhase::AsserterTurn | ChallengePhase::ChallengerTurn { .. },
                Actor::Party(role),
                MoveAction::Timeout,
            ) if self.phase.active() != Some(role) => {
                if mv.block_number <= self.deadline {
                    return Err(ChallengeError::PrematureTimeout {
                        block: mv.block_number,
                        deadline: self.deadline,
                    });
                }
                next.phase = ChallengePhase::won_by(role);
            }
            _ => {
                return Err(ChallengeError::IllegalMove {
                    actor: mv.actor,
                    kind: mv.action.kind(),
                    phase: self.phase.name(),
                })
            }
        }

        Ok(next)
    }

    fn check_on_time(&self, block_number: u64) -> Result<(), ChallengeError> {
        if block_number > self.deadline {
            return Err(ChallengeError::LateMove {
                block: block_number,
                deadline: self.deadline,
            });
        }
        Ok(())
    }

    /// Returns the winner, if the dispute is resolved.
    pub fn winner(&self) -> Option<Role> {
        self.phase.winner()
    }

    /// Returns `true` if the dispute is resolved.
    pub fn is_terminal(&self) -> bool {
        self.winner().is_some()
    }

    /// Returns `true` if the active party can no longer get a move in on time: a move submitted
    /// at `current_block` lands in a later block, past the deadline.
    pub fn is_expired(&self, current_block: u64) -> bool {
        self.phase.active().is_some() && current_block >= self.deadline
    }

    /// Returns the position of the last observed move.
    pub fn cursor(&self) -> Option<(u64, u64)> {
        self.cursor
    }

    /// Returns the first block that may hold moves not yet observed.
    pub fn next_block(&self, opened_at: u64) -> u64 {
        self.cursor.map_or(opened_at, |(block, _)| block)
    }

    /// Returns the commitment the anchor holds for the current phase: the pending bisection while
    /// the challenger picks, otherwise the disputed segment.
    pub fn commitment(&self) -> H256 {
        match &self.phase {
            ChallengePhase::ChallengerTurn { bisection } => hash_bisection(bisection),
            _ => hash_bisection(&Bisection::from_cuts(vec![
                self.segment.start,
                self.segment.end,
            ])),
        }
    }
}

fn pending_segment(bisection: &Bisection, index: u64) -> Result<Segment, ChallengeError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| bisection.segment(i))
        .ok_or(ChallengeError::SegmentOutOfRange {
            index,
            count: bisection.segment_count() as u64,
        })
}
