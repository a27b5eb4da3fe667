//! Shared helpers for the driver integration tests.

#![allow(dead_code)]

use ethers::types::H256;
use exec_challenger_driver::{
    AsserterDriver, ChallengerDriver, DisputeOutcome, DriverConfig, LocalClient, LocalSettlement,
};
use exec_challenger_solvers::execution::{
    AlphabetMachine, Asserter, ChallengeStrategy, Challenger, Dispute, GameParams, Move,
    ReplayAdjudicator, Role, StandardStrategy, TimeBounds,
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// Blocks a party has to respond in the test games.
pub const TEST_CHALLENGE_PERIOD: u64 = 40;

/// Time between blocks mined by the test miner.
pub const TEST_BLOCK_TIME: Duration = Duration::from_millis(5);

/// Upper bound on how long any single scenario may run.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Test context for dispute scenarios: a local anchor with a running miner and one open dispute.
pub struct TestContext {
    pub settlement: LocalSettlement,
    pub dispute: Dispute,
    pub config: Arc<DriverConfig>,
    /// The machine the asserter executes with.
    pub asserter_machine: AlphabetMachine,
    /// The honest machine used by the challenger and the adjudicator.
    pub honest_machine: AlphabetMachine,
    miner_cancel: CancellationToken,
}

impl TestContext {
    /// Opens a dispute over `steps` steps, with the asserter's machine faulty at `fault_at`.
    pub async fn new(steps: u64, fault_at: Option<u64>) -> Self {
        let honest_machine = AlphabetMachine::default();
        let asserter_machine = match fault_at {
            Some(step) => honest_machine.clone().with_fault_at(step),
            None => honest_machine.clone(),
        };

        let params = GameParams {
            segment_count: 4,
            challenge_period: TEST_CHALLENGE_PERIOD,
            ..Default::default()
        };
        let config = DriverConfig::new(params)
            .with_poll_interval(Duration::from_millis(1))
            .with_backoff(Duration::from_millis(1), Duration::from_millis(20));
        config.validate().expect("valid test config");

        let time_bounds = TimeBounds {
            lower_block: 100,
            upper_block: 120,
            lower_timestamp: 80,
            upper_timestamp: 120,
        };
        let settlement = LocalSettlement::new();
        let dispute = Dispute::from_execution(
            &asserter_machine,
            steps,
            time_bounds,
            H256::zero(),
            params,
            0,
        )
        .expect("valid dispute");
        let dispute = settlement
            .open_dispute(dispute, ReplayAdjudicator::new(&dispute, honest_machine.clone()))
            .await
            .expect("dispute opens");

        let miner_cancel = CancellationToken::new();
        settlement.spawn_miner(TEST_BLOCK_TIME, miner_cancel.clone());

        Self {
            settlement,
            dispute,
            config: Arc::new(config),
            asserter_machine,
            honest_machine,
            miner_cancel,
        }
    }

    /// Builds an asserter executing with the asserter's machine.
    pub fn asserter_driver(&self) -> AsserterDriver<LocalClient, AlphabetMachine> {
        let solver = Asserter::try_new(&self.dispute, self.asserter_machine.clone())
            .expect("asserter machine matches the dispute");
        AsserterDriver::new(
            self.dispute,
            self.settlement.client(Role::Asserter),
            solver,
            Arc::clone(&self.config),
        )
    }

    /// Builds a challenger playing the standard strategy.
    pub fn challenger_driver(&self) -> ChallengerDriver<LocalClient, AlphabetMachine> {
        self.challenger_with(StandardStrategy)
    }

    /// Builds a challenger playing `strategy`.
    pub fn challenger_with(
        &self,
        strategy: impl ChallengeStrategy + 'static,
    ) -> ChallengerDriver<LocalClient, AlphabetMachine> {
        let solver = Challenger::try_new(&self.dispute, self.honest_machine.clone())
            .expect("challenger machine matches the dispute")
            .with_strategy(strategy);
        ChallengerDriver::new(
            self.dispute,
            self.settlement.client(Role::Challenger),
            solver,
            Arc::clone(&self.config),
        )
    }

    /// Returns the anchor's move log.
    pub async fn log(&self) -> Vec<Move> {
        self.settlement
            .log(self.dispute.id())
            .await
            .expect("dispute is open")
    }

    /// Returns the winner according to the anchor.
    pub async fn winner(&self) -> Option<Role> {
        self.settlement
            .state(self.dispute.id())
            .await
            .expect("dispute is open")
            .winner()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.miner_cancel.cancel();
    }
}

/// Asserts that a driver loop ended with the given winner.
pub fn assert_resolved(outcome: anyhow::Result<DisputeOutcome>, winner: Role) {
    match outcome {
        Ok(DisputeOutcome::Resolved(w)) => assert_eq!(w, winner),
        other => panic!("expected a win for the {winner}, got {other:?}"),
    }
}
