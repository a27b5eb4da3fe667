use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use exec_challenger_driver::{
    AsserterDriver, ChallengerDriver, DisputeOutcome, DisputeScheduler, DriverConfig,
    LocalSettlement,
};
use exec_challenger_solvers::execution::{
    AlphabetMachine, Asserter, Challenger, Dispute, FixedSegmentStrategy, GameParams,
    ReplayAdjudicator, Role, StateHash, TimeBounds, DEFAULT_CHALLENGE_PERIOD, DEFAULT_PROGRAM,
    DEFAULT_SEGMENT_COUNT,
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::Level;

/// Arguments for the `exec-challenger` binary.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Verbosity level (0-4)
    #[arg(long, short, help = "Verbosity level (0-4)", action = ArgAction::Count, env = "VERBOSITY", global = true)]
    v: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plays a full execution challenge between a local asserter and challenger.
    Simulate(SimulateArgs),
}

/// Arguments for the `simulate` subcommand.
#[derive(clap::Args, Debug)]
struct SimulateArgs {
    /// The number of steps the asserter claims.
    #[arg(long, default_value_t = 500, env = "EXEC_CHALLENGER_STEPS")]
    steps: u64,

    /// The number of segments per bisection.
    #[arg(long, default_value_t = DEFAULT_SEGMENT_COUNT, env = "EXEC_CHALLENGER_SEGMENTS")]
    segments: u64,

    /// The number of blocks a party has to respond.
    #[arg(long, default_value_t = DEFAULT_CHALLENGE_PERIOD, env = "EXEC_CHALLENGER_PERIOD")]
    challenge_period: u64,

    /// The alphabet program both machines run.
    #[arg(long, default_value = DEFAULT_PROGRAM)]
    program: String,

    /// Makes the asserter's machine produce a wrong state at this step.
    #[arg(long)]
    fault_at: Option<u64>,

    /// Leaves one party without a driver.
    #[arg(long, value_enum)]
    idle: Option<Party>,

    /// Makes the challenger always dispute the segment at this index.
    #[arg(long)]
    contrarian: Option<usize>,

    /// Milliseconds between blocks of the local settlement layer.
    #[arg(long, default_value_t = 50, env = "EXEC_CHALLENGER_BLOCK_TIME_MS")]
    block_time_ms: u64,

    /// Writes the final move log to this file as JSON.
    #[arg(long)]
    dump_log: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Party {
    Asserter,
    Challenger,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse the command arguments
    let Args { v, command } = Args::parse();

    // Initialize the tracing subscriber
    init_tracing_subscriber(v)?;

    match command {
        Command::Simulate(args) => simulate(args).await,
    }
}

/// Opens a dispute on a [LocalSettlement] and plays it out with the configured parties.
async fn simulate(args: SimulateArgs) -> Result<()> {
    let params = GameParams {
        segment_count: args.segments,
        challenge_period: args.challenge_period,
        ..Default::default()
    };
    let block_time = Duration::from_millis(args.block_time_ms.max(1));
    let config = DriverConfig::new(params)
        .with_poll_interval((block_time / 4).max(Duration::from_millis(1)))
        .with_backoff(block_time, block_time * 10);
    config.validate()?;
    let config = Arc::new(config);
    tracing::info!(target: "exec-challenger-cli", "Driver config created successfully.");

    let honest = AlphabetMachine::new(&args.program)?;
    let asserter_machine = match args.fault_at {
        Some(step) => honest.clone().with_fault_at(step),
        None => honest.clone(),
    };

    let settlement = LocalSettlement::new();
    let dispute = Dispute::from_execution(
        &asserter_machine,
        args.steps,
        TimeBounds::default(),
        StateHash::zero(),
        params,
        0,
    )?;
    let dispute = settlement
        .open_dispute(dispute, ReplayAdjudicator::new(&dispute, honest.clone()))
        .await?;
    let id = dispute.id();
    tracing::info!(target: "exec-challenger-cli", "Opened dispute {:?} over {} steps", id, dispute.assertion.num_steps);

    let miner_cancel = CancellationToken::new();
    let miner = settlement.spawn_miner(block_time, miner_cancel.clone());

    let mut scheduler = DisputeScheduler::new();
    let mut roles = Vec::new();
    if args.idle != Some(Party::Asserter) {
        let solver = Asserter::try_new(&dispute, asserter_machine)?;
        let driver = AsserterDriver::new(
            dispute,
            settlement.client(Role::Asserter),
            solver,
            Arc::clone(&config),
        );
        scheduler.start(id, Role::Asserter, driver)?;
        roles.push(Role::Asserter);
    }
    if args.idle != Some(Party::Challenger) {
        let mut solver = Challenger::try_new(&dispute, honest)?;
        if let Some(index) = args.contrarian {
            solver = solver.with_strategy(FixedSegmentStrategy { index });
        }
        let driver = ChallengerDriver::new(
            dispute,
            settlement.client(Role::Challenger),
            solver,
            Arc::clone(&config),
        );
        scheduler.start(id, Role::Challenger, driver)?;
        roles.push(Role::Challenger);
    }
    if roles.is_empty() {
        return Err(anyhow!("At least one party must play"));
    }

    for role in roles {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!(target: "exec-challenger-cli", "Received Ctrl+C, shutting down...");
                break;
            }
            outcome = scheduler.join(id, role) => match outcome {
                Ok(DisputeOutcome::Resolved(winner)) => {
                    tracing::info!(target: "exec-challenger-cli", "The {} saw the {} win", role, winner);
                }
                Ok(DisputeOutcome::Cancelled) => {
                    tracing::info!(target: "exec-challenger-cli", "The {} was cancelled", role);
                }
                Err(e) => {
                    tracing::warn!(target: "exec-challenger-cli", "The {} gave up: {}", role, e);
                }
            }
        }
    }
    scheduler.shutdown().await;
    miner_cancel.cancel();
    miner.await?;

    let log = settlement.log(id).await.unwrap_or_default();
    let state = settlement
        .state(id)
        .await
        .ok_or(anyhow!("Dispute {:?} disappeared from the settlement layer", id))?;
    if let Some(path) = args.dump_log {
        std::fs::write(&path, serde_json::to_string_pretty(&log)?)?;
        tracing::info!(target: "exec-challenger-cli", "Wrote {} moves to {}", log.len(), path.display());
    }

    println!(
        "{}",
        serde_json::json!({
            "dispute": id,
            "winner": state.winner(),
            "phase": state.phase.name(),
            "rounds": state.rounds,
            "moves": log.len(),
            "final_segment": [state.segment.start.step_count, state.segment.end.step_count],
        })
    );
    Ok(())
}

/// Initializes the tracing subscriber
///
/// # Arguments
/// * `verbosity_level` - The verbosity level (0-4)
///
/// # Returns
/// * `Result<()>` - Ok if successful, Err otherwise.
fn init_tracing_subscriber(verbosity_level: u8) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(match verbosity_level {
            0 => Level::ERROR,
            1 => Level::WARN,
            2 => Level::INFO,
            3 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).map_err(|e| anyhow!(e))
}
