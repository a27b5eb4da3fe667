//! The `eth` module contains the [EthSettlementClient], a [SettlementClient] backed by an
//! `ExecutionChallenge` contract.

use crate::{
    bindings::{
        BisectedFilter, ExecutionChallenge, ExecutionChallengeEvents, OneStepProofAdjudicatedFilter,
        OneStepProofSubmittedFilter, SegmentChosenFilter, TimedOutFilter,
    },
    Receipt, SettlementClient,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::{
    providers::Middleware,
    types::{Address, H256, U256},
};
use exec_challenger_solvers::execution::{
    Actor, Bisection, Cut, DisputeId, Move, MoveAction, OneStepProof, Role,
};
use std::sync::Arc;

/// The [EthSettlementClient] submits moves as transactions to an `ExecutionChallenge` contract and
/// reads the move log back from its events.
pub struct EthSettlementClient<M> {
    contract: ExecutionChallenge<M>,
    provider: Arc<M>,
}

impl<M: Middleware + 'static> EthSettlementClient<M> {
    /// Creates a new [EthSettlementClient] for the contract at `address`.
    pub fn new(address: Address, provider: Arc<M>) -> Self {
        Self {
            contract: ExecutionChallenge::new(address, Arc::clone(&provider)),
            provider,
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> SettlementClient for EthSettlementClient<M> {
    async fn submit_move(&self, dispute_id: DisputeId, action: MoveAction) -> Result<Receipt> {
        let id = dispute_id.to_fixed_bytes();
        let kind = action.kind();
        let call = match action {
            MoveAction::Bisect(bisection) => {
                let cuts = bisection.cuts();
                self.contract.bisect(
                    id,
                    cuts.iter().map(|c| c.step_count).collect(),
                    cuts.iter().map(|c| c.state_hash.to_fixed_bytes()).collect(),
                    cuts.iter()
                        .map(|c| c.pending_value_hash.to_fixed_bytes())
                        .collect(),
                )
            }
            MoveAction::ChooseSegment(index) => self.contract.choose_segment(id, U256::from(index)),
            MoveAction::OneStepProof {
                segment_index,
                proof,
            } => self.contract.one_step_proof(
                id,
                U256::from(segment_index.unwrap_or_default()),
                proof.before_state.to_fixed_bytes(),
                proof.after_state.to_fixed_bytes(),
                proof.after_pending.to_fixed_bytes(),
                proof.evidence,
            ),
            MoveAction::Timeout => self.contract.timeout(id),
            MoveAction::Adjudicated(_) => {
                return Err(anyhow!(
                    "Adjudication verdicts are emitted by the contract, not submitted"
                ))
            }
        };

        tracing::debug!(target: "eth-settlement", "Sending {:?} for dispute {:?}", kind, dispute_id);
        let pending = call
            .send()
            .await
            .map_err(|e| anyhow!("Error sending {:?} transaction: {}", kind, e))?;
        let tx_hash = pending.tx_hash();
        let receipt = pending
            .await?
            .ok_or(anyhow!("Transaction {:?} was dropped from the mempool", tx_hash))?;
        let block_number = receipt
            .block_number
            .ok_or(anyhow!("Receipt for {:?} is missing a block number", tx_hash))?
            .as_u64();

        Ok(Receipt {
            tx_hash,
            block_number,
        })
    }

    async fn read_events(&self, dispute_id: DisputeId, from_block: u64) -> Result<Vec<Move>> {
        let events = self
            .contract
            .events()
            .from_block(from_block)
            .topic1(dispute_id)
            .query_with_meta()
            .await
            .map_err(|e| anyhow!("Error querying dispute events: {}", e))?;

        let mut moves = events
            .into_iter()
            .map(|(event, meta)| {
                move_from_event(event, meta.block_number.as_u64(), meta.log_index.low_u64())
            })
            .collect::<Result<Vec<_>>>()?;
        moves.sort_by_key(Move::position);
        Ok(moves)
    }

    async fn current_block(&self) -> Result<u64> {
        Ok(self
            .provider
            .get_block_number()
            .await
            .map_err(|e| anyhow!("Error fetching the block number: {}", e))?
            .as_u64())
    }
}

/// Decodes an `ExecutionChallenge` event into the [Move] it records.
///
/// ### Takes
/// - `event`: The decoded event.
/// - `block_number`: The block the event was emitted in.
/// - `log_index`: The index of the log within the block.
///
/// ### Returns
/// - `Ok(Move)`: The recorded move.
/// - `Err(anyhow::Error)`: The event does not describe a well formed move.
pub fn move_from_event(
    event: ExecutionChallengeEvents,
    block_number: u64,
    log_index: u64,
) -> Result<Move> {
    let (actor, action) = match event {
        ExecutionChallengeEvents::BisectedFilter(BisectedFilter {
            step_counts,
            state_hashes,
            pending_hashes,
            ..
        }) => {
            if step_counts.len() != state_hashes.len() || step_counts.len() != pending_hashes.len()
            {
                return Err(anyhow!(
                    "Critical failure: `Bisected` event carries mismatched cut arrays"
                ));
            }
            let cuts = step_counts
                .into_iter()
                .zip(state_hashes)
                .zip(pending_hashes)
                .map(|((step, state), pending)| Cut::new(step, H256(state), H256(pending)))
                .collect();
            (
                Actor::Party(Role::Asserter),
                MoveAction::Bisect(Bisection::from_cuts(cuts)),
            )
        }
        ExecutionChallengeEvents::SegmentChosenFilter(SegmentChosenFilter {
            segment_index, ..
        }) => (
            Actor::Party(Role::Challenger),
            MoveAction::ChooseSegment(to_u64(segment_index)?),
        ),
        ExecutionChallengeEvents::OneStepProofSubmittedFilter(OneStepProofSubmittedFilter {
            from_asserter,
            segment_index,
            before_state,
            after_state,
            after_pending,
            evidence,
            ..
        }) => {
            let proof = OneStepProof {
                before_state: H256(before_state),
                after_state: H256(after_state),
                after_pending: H256(after_pending),
                evidence,
            };
            if from_asserter {
                (
                    Actor::Party(Role::Asserter),
                    MoveAction::OneStepProof {
                        segment_index: None,
                        proof,
                    },
                )
            } else {
                (
                    Actor::Party(Role::Challenger),
                    MoveAction::OneStepProof {
                        segment_index: Some(to_u64(segment_index)?),
                        proof,
                    },
                )
            }
        }
        ExecutionChallengeEvents::OneStepProofAdjudicatedFilter(OneStepProofAdjudicatedFilter {
            asserter_won,
            ..
        }) => (Actor::Anchor, MoveAction::Adjudicated(winner(asserter_won))),
        ExecutionChallengeEvents::TimedOutFilter(TimedOutFilter { asserter_won, .. }) => {
            (Actor::Party(winner(asserter_won)), MoveAction::Timeout)
        }
    };

    Ok(Move {
        actor,
        action,
        block_number,
        log_index,
    })
}

fn winner(asserter_won: bool) -> Role {
    if asserter_won {
        Role::Asserter
    } else {
        Role::Challenger
    }
}

fn to_u64(value: U256) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(anyhow!("Segment index {} does not fit in 64 bits", value));
    }
    Ok(value.as_u64())
}
