//! The `config` module contains the [DriverConfig].

use anyhow::{anyhow, Result};
use exec_challenger_solvers::execution::GameParams;
use std::time::Duration;

/// The [DriverConfig] struct contains the configuration for the [Driver](crate::Driver)
/// implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// The game parameters disputes are opened with.
    pub params: GameParams,
    /// How long a driver sleeps between polls of the move log while waiting.
    pub poll_interval: Duration,
    /// The first backoff after a transient client error.
    pub backoff_initial: Duration,
    /// The cap on the exponential backoff.
    pub backoff_max: Duration,
}

impl DriverConfig {
    /// Creates a new [DriverConfig] with the given [GameParams] and default timings.
    pub fn new(params: GameParams) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the backoff bounds.
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.backoff_initial = initial;
        self.backoff_max = max;
        self
    }

    /// Validates the [DriverConfig].
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        if self.poll_interval.is_zero() {
            return Err(anyhow!("Poll interval must be non-zero"));
        }
        if self.backoff_initial.is_zero() || self.backoff_initial > self.backoff_max {
            return Err(anyhow!(
                "Backoff must satisfy 0 < initial ({:?}) <= max ({:?})",
                self.backoff_initial,
                self.backoff_max
            ));
        }
        Ok(())
    }

    /// Returns the backoff following `current`: double it, up to [DriverConfig::backoff_max].
    pub fn next_backoff(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.backoff_max)
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            params: GameParams::default(),
            poll_interval: Duration::from_millis(500),
            backoff_initial: Duration::from_millis(250),
            backoff_max: Duration::from_secs(10),
        }
    }
}
