#![doc = include_str!("../README.md")]

use anyhow::Result;
use async_trait::async_trait;
use exec_challenger_solvers::execution::Role;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

mod config;
pub use config::DriverConfig;

mod client;
pub use client::{Receipt, SettlementClient};

/// Contains the smart contract bindings used by the [EthSettlementClient].
mod bindings;
pub use bindings::ExecutionChallenge;

mod eth;
pub use eth::{move_from_event, EthSettlementClient};

mod local;
pub use local::{LocalClient, LocalSettlement};

mod drivers;
pub use drivers::{AsserterDriver, ChallengerDriver, DisputeDriver};

mod scheduler;
pub use scheduler::DisputeScheduler;

/// The [DisputeOutcome] enum describes how a [Driver] loop ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeOutcome {
    /// The dispute was resolved in favor of the given [Role].
    Resolved(Role),
    /// The loop was cancelled before the dispute was resolved.
    Cancelled,
}

/// The [Driver] trait defines the interface for all driver loops that are ran by the
/// `exec-challenger` binary.
#[async_trait]
pub trait Driver {
    /// Starts the [Driver] loop. The loop runs until the dispute is resolved, `cancel` fires, or a
    /// fatal error occurs.
    async fn start_loop(self, cancel: CancellationToken) -> Result<DisputeOutcome>;
}
