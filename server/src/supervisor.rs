//! Runs the long-lived server tasks and converges on shutdown
//!
//! The first task to finish, for any reason, or an external shutdown signal
//! ends supervision. Finished tasks are reported, the rest are cancelled and
//! awaited for a bounded time. Nothing a task returns or panics with is
//! re-raised past the supervisor.

use futures::future::{join_all, select_all};
use log::{error, info, warn};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};

type TaskResult = Result<(), String>;

/// How one supervised task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed(String),
    Panicked(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub name: &'static str,
    pub outcome: TaskOutcome,
}

impl TaskReport {
    fn new(name: &'static str, joined: Result<TaskResult, JoinError>) -> Self {
        let outcome = match joined {
            Ok(Ok(())) => TaskOutcome::Completed,
            Ok(Err(e)) => TaskOutcome::Failed(e),
            Err(e) if e.is_cancelled() => TaskOutcome::Cancelled,
            Err(e) => TaskOutcome::Panicked(e.to_string()),
        };
        Self { name, outcome }
    }

    fn log(&self) {
        match &self.outcome {
            TaskOutcome::Completed => info!("Task {} finished successfully", self.name),
            TaskOutcome::Failed(e) => error!("Task {} failed: {}", self.name, e),
            TaskOutcome::Panicked(e) => error!("Task {} panicked: {}", self.name, e),
            TaskOutcome::Cancelled => info!("Task {} cancelled", self.name),
        }
    }
}

/// What happened to every task when supervision ended.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Tasks that had already ended when supervision stopped.
    pub finished: Vec<TaskReport>,
    /// Tasks that were still running and had to be cancelled.
    pub cancelled: Vec<TaskReport>,
    /// Cancellation was not confirmed within the shutdown bound.
    pub timed_out: bool,
}

impl ShutdownReport {
    /// Whether any task failed or panicked.
    pub fn has_failures(&self) -> bool {
        self.finished
            .iter()
            .chain(&self.cancelled)
            .any(|r| matches!(r.outcome, TaskOutcome::Failed(_) | TaskOutcome::Panicked(_)))
    }
}

pub struct Supervisor {
    tasks: Vec<(&'static str, JoinHandle<TaskResult>)>,
    shutdown_timeout: Duration,
}

impl Supervisor {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            tasks: Vec::new(),
            shutdown_timeout,
        }
    }

    /// Starts a named task. Its error, if any, is kept as text for the
    /// report.
    pub fn spawn<Fut, E>(&mut self, name: &'static str, task: Fut)
    where
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display,
    {
        info!("Starting task {}", name);
        let handle = tokio::spawn(async move { task.await.map_err(|e| e.to_string()) });
        self.tasks.push((name, handle));
    }

    /// Supervises until the first task ends.
    pub async fn run(self) -> ShutdownReport {
        self.run_until(std::future::pending()).await
    }

    /// Supervises until the first task ends or `signal` resolves.
    pub async fn run_until(self, signal: impl Future<Output = ()>) -> ShutdownReport {
        if self.tasks.is_empty() {
            warn!("No tasks to supervise");
            return ShutdownReport::default();
        }

        let (names, mut handles): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();

        let mut first = None;
        tokio::select! {
            (joined, index, _) = select_all(handles.iter_mut()) => {
                info!("Task {} ended, shutting down", names[index]);
                first = Some((index, joined));
            }
            _ = signal => info!("Shutdown requested"),
        }

        info!("Checking for task errors");
        let mut report = ShutdownReport::default();
        let mut running = Vec::new();
        for (index, (name, handle)) in names.into_iter().zip(handles).enumerate() {
            match first.take() {
                Some((first_index, joined)) if first_index == index => {
                    report.finished.push(TaskReport::new(name, joined));
                    continue;
                }
                other => first = other,
            }

            if handle.is_finished() {
                report.finished.push(TaskReport::new(name, handle.await));
            } else {
                running.push((name, handle));
            }
        }
        report.finished.iter().for_each(TaskReport::log);

        if running.is_empty() {
            info!("There are no pending tasks");
            return report;
        }

        for (name, handle) in &running {
            info!("Task {} pending - cancel", name);
            handle.abort();
        }

        info!("Waiting for pending tasks to shut down");
        let (names, handles): (Vec<_>, Vec<_>) = running.into_iter().unzip();
        match tokio::time::timeout(self.shutdown_timeout, join_all(handles)).await {
            Ok(joined) => {
                report.cancelled = names
                    .into_iter()
                    .zip(joined)
                    .map(|(name, joined)| TaskReport::new(name, joined))
                    .collect();
                report.cancelled.iter().for_each(TaskReport::log);
                info!("Pending tasks shut down successfully");
            }
            Err(_) => {
                error!(
                    "Pending tasks could not be shut down within {:?}",
                    self.shutdown_timeout
                );
                report.timed_out = true;
                report.cancelled = names
                    .into_iter()
                    .map(|name| TaskReport {
                        name,
                        outcome: TaskOutcome::Cancelled,
                    })
                    .collect();
            }
        }

        report
    }
}
