//! The `drivers` module contains the [DisputeDriver] state loop and the role specific
//! implementations of the [Driver] trait.

use crate::{DisputeOutcome, Driver, DriverConfig, SettlementClient};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use exec_challenger_solvers::execution::{
    Asserter, ChallengeError, ChallengeState, Challenger, Dispute, Machine, Response, Role, Solver,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What a single iteration of the loop did.
enum Step {
    /// The dispute is over.
    Resolved(Role),
    /// A move was accepted; the log should be read again right away.
    Submitted,
    /// Nothing to do until the next poll.
    Wait,
}

/// The [DisputeDriver] plays one [Solver] in one [Dispute] against a [SettlementClient].
///
/// Each iteration reads the move log from the last observed block, folds it into the driver's own
/// [ChallengeState], asks the solver for a response and submits it. The state lives only inside
/// the loop, so a cancelled driver is resumed by starting a new one on the same dispute.
pub struct DisputeDriver<C, S> {
    /// The dispute being played.
    pub dispute: Dispute,
    /// The configuration for the loop.
    pub config: Arc<DriverConfig>,
    client: C,
    solver: S,
}

impl<C: SettlementClient, S: Solver> DisputeDriver<C, S> {
    /// Creates a new [DisputeDriver].
    pub fn new(dispute: Dispute, client: C, solver: S, config: Arc<DriverConfig>) -> Self {
        Self {
            dispute,
            config,
            client,
            solver,
        }
    }

    /// Runs the loop until the dispute is resolved, `cancel` fires, or a fatal error occurs.
    ///
    /// ### Returns
    /// - `Ok(DisputeOutcome)`: The dispute was resolved, or the loop was cancelled.
    /// - `Err(anyhow::Error)`: The solver gave up; the error wraps a [ChallengeError].
    pub async fn run(self, cancel: CancellationToken) -> Result<DisputeOutcome> {
        let role = self.solver.role();
        let mut state = self.dispute.initial_state();
        let mut backoff = self.config.backoff_initial;
        tracing::info!(target: "dispute-driver", "Starting the {} loop for dispute {:?}", role, state.dispute_id);

        loop {
            if cancel.is_cancelled() {
                tracing::info!(target: "dispute-driver", "The {} loop for dispute {:?} was cancelled", role, state.dispute_id);
                return Ok(DisputeOutcome::Cancelled);
            }

            let pause = match self.step(&mut state).await {
                Ok(Step::Resolved(winner)) => {
                    tracing::info!(target: "dispute-driver", "Dispute {:?} resolved in favor of the {}", state.dispute_id, winner);
                    return Ok(DisputeOutcome::Resolved(winner));
                }
                Ok(Step::Submitted) => {
                    backoff = self.config.backoff_initial;
                    continue;
                }
                Ok(Step::Wait) => {
                    backoff = self.config.backoff_initial;
                    self.config.poll_interval
                }
                Err(e) => {
                    if let Some(fatal) = e.downcast_ref::<ChallengeError>() {
                        tracing::error!(target: "dispute-driver", "The {} cannot continue in dispute {:?}: {}", role, state.dispute_id, fatal);
                        return Err(e);
                    }
                    // Soft failure, log the error and retry.
                    tracing::warn!(target: "dispute-driver", "Error talking to the settlement layer, retrying in {:?}: {}", backoff, e);
                    let pause = backoff;
                    backoff = self.config.next_backoff(backoff);
                    pause
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(target: "dispute-driver", "The {} loop for dispute {:?} was cancelled", role, state.dispute_id);
                    return Ok(DisputeOutcome::Cancelled);
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    async fn step(&self, state: &mut ChallengeState) -> Result<Step> {
        let id = state.dispute_id;
        let moves = self
            .client
            .read_events(id, state.next_block(self.dispute.opened_at))
            .await?;
        if state.catch_up(&moves) > 0 {
            tracing::debug!(target: "dispute-driver", "Dispute {:?} is now in {} with deadline {}", id, state.phase.name(), state.deadline);
        }
        let current_block = self.client.current_block().await?;

        let response = match self.solver.respond(state, current_block) {
            Ok(response) => response,
            Err(e) if e.is_wait() => {
                tracing::trace!(target: "dispute-driver", "Waiting at block {}: {}", current_block, e);
                return Ok(Step::Wait);
            }
            Err(e) => return Err(e.into()),
        };
        let action = match response {
            Response::Resolved(winner) => return Ok(Step::Resolved(winner)),
            response => response
                .into_action()
                .ok_or(anyhow!("Response does not translate into a move"))?,
        };

        let kind = action.kind();
        match self.client.submit_move(id, action).await {
            Ok(receipt) => {
                tracing::info!(target: "dispute-driver", "Submitted {:?} for dispute {:?} in block {} (tx {:?})", kind, id, receipt.block_number, receipt.tx_hash);
                Ok(Step::Submitted)
            }
            // The settlement layer rejected the move, most likely because the opponent moved
            // first. The next fold picks up whatever happened.
            Err(e) => match e.downcast_ref::<ChallengeError>() {
                Some(rejection) => {
                    tracing::warn!(target: "dispute-driver", "{:?} rejected for dispute {:?}: {}", kind, id, rejection);
                    Ok(Step::Wait)
                }
                None => Err(e),
            },
        }
    }
}

/// Defines a new [Driver] implementation playing the given solver.
macro_rules! define_driver {
    ($name:ident, $solver:ident) => {
        #[doc = concat!("Variant of the [Driver] trait: [", stringify!($name), "], playing the [", stringify!($solver), "].")]
        pub struct $name<C, M>(DisputeDriver<C, $solver<M>>);

        impl<C: SettlementClient + 'static, M: Machine> $name<C, M> {
            #[doc = concat!("Creates a new instance of the [", stringify!($name), "] driver.")]
            pub fn new(
                dispute: Dispute,
                client: C,
                solver: $solver<M>,
                config: Arc<DriverConfig>,
            ) -> Self {
                Self(DisputeDriver::new(dispute, client, solver, config))
            }
        }

        #[async_trait]
        impl<C: SettlementClient + 'static, M: Machine> Driver for $name<C, M> {
            async fn start_loop(self, cancel: CancellationToken) -> Result<DisputeOutcome> {
                self.0.run(cancel).await
            }
        }
    };
}

define_driver!(AsserterDriver, Asserter);
define_driver!(ChallengerDriver, Challenger);
