//! The `client` module contains the [SettlementClient] trait, the drivers' only view of the
//! settlement layer.

use anyhow::Result;
use async_trait::async_trait;
use ethers::types::H256;
use exec_challenger_solvers::execution::{DisputeId, Move, MoveAction};
use serde::{Deserialize, Serialize};

/// The [Receipt] of an accepted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// The hash of the transaction carrying the move.
    pub tx_hash: H256,
    /// The block the move was mined in.
    pub block_number: u64,
}

/// The [SettlementClient] trait is the interface between a driver and the settlement layer that
/// anchors a dispute's move log.
///
/// Errors are treated as transient by the drivers and retried with backoff, except for a
/// [ChallengeError](exec_challenger_solvers::execution::ChallengeError) wrapped in the
/// [anyhow::Error], which means the settlement layer rejected the move itself.
#[async_trait]
pub trait SettlementClient: Send + Sync {
    /// Submits `action` to the dispute identified by `dispute_id`.
    async fn submit_move(&self, dispute_id: DisputeId, action: MoveAction) -> Result<Receipt>;

    /// Reads every move of the dispute mined at or after `from_block`, in log order.
    async fn read_events(&self, dispute_id: DisputeId, from_block: u64) -> Result<Vec<Move>>;

    /// Returns the current block height.
    async fn current_block(&self) -> Result<u64>;
}
