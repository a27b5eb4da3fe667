//! The `scheduler` module contains the [DisputeScheduler], which owns one [Driver] task per
//! dispute and role.

use crate::{DisputeOutcome, Driver};
use anyhow::{anyhow, Result};
use exec_challenger_solvers::execution::{DisputeId, Role};
use std::collections::HashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running [Driver] task.
struct Task {
    cancel: CancellationToken,
    handle: JoinHandle<Result<DisputeOutcome>>,
}

/// The [DisputeScheduler] is the registry of running dispute tasks, keyed by dispute and [Role].
///
/// Every task gets a child of the scheduler's root [CancellationToken], so a task can be stopped
/// on its own or together with all others through [DisputeScheduler::shutdown].
#[derive(Default)]
pub struct DisputeScheduler {
    root: CancellationToken,
    tasks: HashMap<(DisputeId, Role), Task>,
}

impl DisputeScheduler {
    /// Creates a new, empty [DisputeScheduler].
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `driver` as the task playing `role` in the dispute `id`.
    ///
    /// ### Returns
    /// - `Ok(())`: The task was spawned.
    /// - `Err(anyhow::Error)`: A task for the same dispute and role is still registered, running
    ///   or finished but not yet joined.
    pub fn start<D>(&mut self, id: DisputeId, role: Role, driver: D) -> Result<()>
    where
        D: Driver + Send + 'static,
    {
        if self.is_running(id, role) {
            return Err(anyhow!(
                "The {} of dispute {:?} is already being played",
                role,
                id
            ));
        }
        if self.tasks.contains_key(&(id, role)) {
            return Err(anyhow!(
                "The {} of dispute {:?} has finished and must be joined first",
                role,
                id
            ));
        }

        let cancel = self.root.child_token();
        let handle = tokio::spawn(driver.start_loop(cancel.clone()));
        tracing::info!(target: "dispute-scheduler", "Started the {} of dispute {:?}", role, id);
        self.tasks.insert((id, role), Task { cancel, handle });
        Ok(())
    }

    /// Signals the task for `role` in dispute `id` to stop. The task stays registered until it is
    /// joined or reaped.
    ///
    /// ### Returns
    /// - `true` if such a task exists.
    pub fn stop(&self, id: DisputeId, role: Role) -> bool {
        match self.tasks.get(&(id, role)) {
            Some(task) => {
                tracing::info!(target: "dispute-scheduler", "Stopping the {} of dispute {:?}", role, id);
                task.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Waits for the task for `role` in dispute `id` to finish and removes it.
    pub async fn join(&mut self, id: DisputeId, role: Role) -> Result<DisputeOutcome> {
        let task = self
            .tasks
            .remove(&(id, role))
            .ok_or(anyhow!("No {} task for dispute {:?}", role, id))?;
        task.handle.await?
    }

    /// Returns `true` if a task for `role` in dispute `id` is registered and has not finished.
    pub fn is_running(&self, id: DisputeId, role: Role) -> bool {
        self.tasks
            .get(&(id, role))
            .map_or(false, |task| !task.handle.is_finished())
    }

    /// Returns the number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` if no tasks are registered.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Removes every finished task and returns their results.
    pub async fn reap(&mut self) -> Vec<((DisputeId, Role), Result<DisputeOutcome>)> {
        let finished = self
            .tasks
            .iter()
            .filter(|(_, task)| task.handle.is_finished())
            .map(|(key, _)| *key)
            .collect::<Vec<_>>();

        let mut results = Vec::with_capacity(finished.len());
        for (id, role) in finished {
            results.push(((id, role), self.join(id, role).await));
        }
        results
    }

    /// Cancels every task and waits for all of them to finish. The scheduler can start new tasks
    /// afterwards.
    pub async fn shutdown(&mut self) -> Vec<((DisputeId, Role), Result<DisputeOutcome>)> {
        tracing::info!(target: "dispute-scheduler", "Shutting down {} dispute tasks", self.tasks.len());
        std::mem::take(&mut self.root).cancel();

        let mut results = Vec::with_capacity(self.tasks.len());
        for ((id, role), task) in self.tasks.drain() {
            results.push(((id, role), task.handle.await.map_err(|e| anyhow!(e)).and_then(|r| r)));
        }
        results
    }
}
