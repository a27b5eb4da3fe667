//! The `local` module contains the [LocalSettlement], an in-memory settlement layer used to
//! simulate disputes and to test the drivers end to end.

use crate::{Receipt, SettlementClient};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::{
    abi::{self, Token},
    types::{H256, U256},
    utils::keccak256,
};
use exec_challenger_solvers::execution::{
    Actor, ChallengePhase, ChallengeState, Dispute, DisputeId, Move, MoveAction,
    OneStepAdjudicator, Role,
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

/// A dispute registered with the [LocalSettlement].
struct Anchored {
    dispute: Dispute,
    /// The authoritative state, folded from every accepted move.
    state: ChallengeState,
    log: Vec<Move>,
    adjudicator: Arc<dyn OneStepAdjudicator>,
}

#[derive(Default)]
struct Ledger {
    block: u64,
    nonce: u64,
    disputes: HashMap<DisputeId, Anchored>,
}

/// The [LocalSettlement] is an in-memory anchor for execution challenges.
///
/// Every accepted submission is mined in a block of its own. Submissions are checked against the
/// anchor's own [ChallengeState] and rejected with the [ChallengeError] that made them illegal.
/// One step proofs are adjudicated in the block they land in, and the verdict is appended to the
/// log as an [Actor::Anchor] move.
///
/// [ChallengeError]: exec_challenger_solvers::execution::ChallengeError
#[derive(Clone, Default)]
pub struct LocalSettlement {
    ledger: Arc<Mutex<Ledger>>,
}

impl LocalSettlement {
    /// Creates a new, empty [LocalSettlement] at block 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `dispute` with the anchor. The dispute is opened at the current block, which
    /// overrides [Dispute::opened_at].
    ///
    /// ### Returns
    /// - `Ok(Dispute)`: The dispute as registered.
    /// - `Err(anyhow::Error)`: A dispute with the same id is already open.
    pub async fn open_dispute(
        &self,
        dispute: Dispute,
        adjudicator: impl OneStepAdjudicator + 'static,
    ) -> Result<Dispute> {
        let mut ledger = self.ledger.lock().await;
        let dispute = Dispute {
            opened_at: ledger.block,
            ..dispute
        };
        let id = dispute.id();
        if ledger.disputes.contains_key(&id) {
            return Err(anyhow!("Dispute {:?} is already open", id));
        }

        tracing::info!(
            target: "local-settlement",
            "Opened dispute {:?} over {} steps at block {}",
            id,
            dispute.assertion.num_steps,
            dispute.opened_at
        );
        ledger.disputes.insert(
            id,
            Anchored {
                dispute,
                state: dispute.initial_state(),
                log: Vec::new(),
                adjudicator: Arc::new(adjudicator),
            },
        );
        Ok(dispute)
    }

    /// Returns a [SettlementClient] submitting moves as `role`.
    pub fn client(&self, role: Role) -> LocalClient {
        LocalClient {
            settlement: self.clone(),
            role,
        }
    }

    /// Mines `blocks` empty blocks.
    pub async fn advance(&self, blocks: u64) -> u64 {
        let mut ledger = self.ledger.lock().await;
        ledger.block += blocks;
        ledger.block
    }

    /// Returns the current block height.
    pub async fn block_number(&self) -> u64 {
        self.ledger.lock().await.block
    }

    /// Returns the move log of a dispute.
    pub async fn log(&self, dispute_id: DisputeId) -> Option<Vec<Move>> {
        let ledger = self.ledger.lock().await;
        ledger.disputes.get(&dispute_id).map(|a| a.log.clone())
    }

    /// Returns the anchor's [ChallengeState] of a dispute.
    pub async fn state(&self, dispute_id: DisputeId) -> Option<ChallengeState> {
        let ledger = self.ledger.lock().await;
        ledger.disputes.get(&dispute_id).map(|a| a.state.clone())
    }

    /// Spawns a task mining an empty block every `block_time` until `cancel` fires.
    pub fn spawn_miner(&self, block_time: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let settlement = self.clone();
        tokio::spawn(async move {
            tracing::debug!(target: "local-settlement", "Mining a block every {:?}", block_time);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!(target: "local-settlement", "Miner received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(block_time) => {
                        let block = settlement.advance(1).await;
                        tracing::trace!(target: "local-settlement", "Mined block {}", block);
                    }
                }
            }
        })
    }

    async fn submit(
        &self,
        role: Role,
        dispute_id: DisputeId,
        action: MoveAction,
    ) -> Result<Receipt> {
        let mut ledger = self.ledger.lock().await;
        let block_number = ledger.block + 1;
        let nonce = ledger.nonce;
        let anchored = ledger
            .disputes
            .get_mut(&dispute_id)
            .ok_or(anyhow!("Unknown dispute {:?}", dispute_id))?;

        let submitted = Move {
            actor: Actor::Party(role),
            action,
            block_number,
            log_index: 0,
        };
        let mut next = match commit(&anchored.state, &submitted) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(
                    target: "local-settlement",
                    "Rejected {:?} by the {} in dispute {:?}: {}",
                    submitted.action.kind(),
                    role,
                    dispute_id,
                    e
                );
                return Err(e);
            }
        };
        let mut mined = vec![submitted];

        if let ChallengePhase::OneStepProofPending { proof, .. } = &next.phase {
            let segment = next.segment;
            let winner = anchored
                .adjudicator
                .adjudicate(&segment.start, &segment.end, proof);
            let verdict = Move {
                actor: Actor::Anchor,
                action: MoveAction::Adjudicated(winner),
                block_number,
                log_index: 1,
            };
            next = commit(&next, &verdict)?;
            mined.push(verdict);
            tracing::info!(
                target: "local-settlement",
                "Adjudicated step {} of dispute {:?} in favor of the {}",
                segment.start.step_count,
                dispute_id,
                winner
            );
        }

        tracing::info!(
            target: "local-settlement",
            "Mined {:?} by the {} in block {}",
            mined[0].action.kind(),
            role,
            block_number
        );
        anchored.state = next;
        anchored.log.extend(mined);
        ledger.block = block_number;
        ledger.nonce += 1;
        Ok(Receipt {
            tx_hash: H256::from(keccak256(abi::encode(&[
                Token::FixedBytes(dispute_id.as_bytes().to_vec()),
                Token::Uint(U256::from(block_number)),
                Token::Uint(U256::from(nonce)),
            ]))),
            block_number,
        })
    }

    async fn read(&self, dispute_id: DisputeId, from_block: u64) -> Result<Vec<Move>> {
        let ledger = self.ledger.lock().await;
        let anchored = ledger
            .disputes
            .get(&dispute_id)
            .ok_or(anyhow!("Unknown dispute {:?}", dispute_id))?;
        Ok(anchored
            .log
            .iter()
            .filter(|mv| mv.block_number >= from_block)
            .cloned()
            .collect())
    }
}

/// Folds `mv` into a copy of `state`. The anchor's own state is only replaced once every move
/// mined in the block has been accepted, so a rejection leaves it in step with the log.
fn commit(state: &ChallengeState, mv: &Move) -> Result<ChallengeState> {
    let mut next = state.clone();
    match next.apply(mv) {
        Ok(true) => Ok(next),
        Ok(false) => Err(anyhow!(
            "Move at {:?} does not follow the last mined position {:?}",
            mv.position(),
            state.cursor()
        )),
        Err(e) => Err(anyhow::Error::new(e)),
    }
}

/// A [SettlementClient] handle on a [LocalSettlement], submitting moves as one [Role].
#[derive(Clone)]
pub struct LocalClient {
    settlement: LocalSettlement,
    role: Role,
}

impl LocalClient {
    /// Returns the [Role] this client submits moves as.
    pub fn role(&self) -> Role {
        self.role
    }
}

#[async_trait]
impl SettlementClient for LocalClient {
    async fn submit_move(&self, dispute_id: DisputeId, action: MoveAction) -> Result<Receipt> {
        self.settlement.submit(self.role, dispute_id, action).await
    }

    async fn read_events(&self, dispute_id: DisputeId, from_block: u64) -> Result<Vec<Move>> {
        self.settlement.read(dispute_id, from_block).await
    }

    async fn current_block(&self) -> Result<u64> {
        Ok(self.settlement.block_number().await)
    }
}
