//! Polling of asynchronous tasks.
//!
//! The service does not report step progress, so progress is estimated from
//! the time elapsed since polling began against an assumed maximum task
//! duration, capped at 99. Observing success publishes 100 before outputs
//! are fetched; published progress never decreases within one poll.
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::runninghub::client::RunningHubClient;
use crate::runninghub::types::{Progress, TaskHandle, TaskOutput, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub max_attempts: u32,
    pub interval: Duration,
    pub max_task_duration: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        PollOptions {
            max_attempts: 120,
            interval: Duration::from_millis(2000),
            max_task_duration: Duration::from_millis(180_000),
        }
    }
}

impl PollOptions {
    pub fn from_config(config: &Config) -> Self {
        PollOptions {
            max_attempts: config.poll_max_attempts.max(1),
            interval: Duration::from_millis(config.poll_interval_ms),
            max_task_duration: Duration::from_millis(config.max_task_duration_ms),
        }
    }
}

/// Per-task polling state, owned by the caller for the life of one task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollState {
    /// Origin for elapsed-time progress. Cleared when the task ends.
    pub started_at: Option<Instant>,
    /// Output node count reported at submission, if any.
    pub total_nodes: Option<usize>,
}

impl PollState {
    pub fn for_handle(handle: &TaskHandle) -> Self {
        PollState { started_at: None, total_nodes: handle.total_nodes }
    }

    fn finish(&mut self) {
        self.started_at = None;
    }
}

enum Tick {
    Pending,
    Done(TaskOutput),
}

pub struct TaskPoller<'a> {
    client: &'a RunningHubClient,
    options: PollOptions,
    progress: &'a watch::Sender<Progress>,
}

impl<'a> TaskPoller<'a> {
    pub fn new(client: &'a RunningHubClient, options: PollOptions, progress: &'a watch::Sender<Progress>) -> Self {
        TaskPoller { client, options, progress }
    }

    /// Poll `handle` until it succeeds, fails or runs out of attempts.
    pub async fn poll(&self, handle: &TaskHandle, state: &mut PollState) -> AppResult<TaskOutput> {
        let started = *state.started_at.get_or_insert_with(Instant::now);
        let max_attempts = self.options.max_attempts;
        tracing::info!(
            task_id = %handle.task_id,
            total_nodes = ?state.total_nodes,
            "Polling task (up to {} attempts every {:?})",
            max_attempts,
            self.options.interval
        );

        for attempt in 0..max_attempts {
            tokio::time::sleep(self.options.interval).await;
            match self.tick(handle, started, attempt).await {
                Ok(Tick::Done(output)) => {
                    state.finish();
                    return Ok(output);
                }
                Ok(Tick::Pending) => continue,
                Err(e) if e.is_pending() => continue,
                Err(e @ AppError::TaskFailed(_)) => {
                    state.finish();
                    return Err(e);
                }
                Err(e) => {
                    if attempt + 1 == max_attempts {
                        state.finish();
                        return Err(e);
                    }
                    tracing::warn!("Polling error (attempt {}): {}", attempt + 1, e);
                }
            }
        }

        state.finish();
        Err(AppError::Timeout { attempts: max_attempts })
    }

    async fn tick(&self, handle: &TaskHandle, started: Instant, attempt: u32) -> AppResult<Tick> {
        let status = self.client.check_task_status(&handle.task_id).await?;

        let elapsed = started.elapsed();
        let progress = Progress::estimated(elapsed.as_millis(), self.options.max_task_duration.as_millis());
        self.publish(progress);
        if attempt % 10 == 0 || status.is_terminal() {
            tracing::info!(
                "Polling attempt {}: Task status = {}, Progress = {}% (elapsed {}s)",
                attempt + 1,
                status,
                progress.value,
                elapsed.as_secs()
            );
        }

        match status {
            TaskStatus::Success => {
                tracing::info!("Task completed! Fetching outputs...");
                self.publish(Progress::complete());
                let output = self.client.task_outputs(&handle.task_id).await?;
                Ok(Tick::Done(output))
            }
            TaskStatus::Failed => match self.client.task_outputs(&handle.task_id).await {
                Err(e) if e.is_pending() => Err(e),
                Err(AppError::TaskFailed(reason)) => Err(AppError::TaskFailed(reason)),
                Err(e) => Err(AppError::TaskFailed(e.to_string())),
                Ok(_) => Err(AppError::TaskFailed("Task failed".to_string())),
            },
            TaskStatus::Unknown => {
                tracing::warn!("Unknown status for task {}, continuing to poll...", handle.task_id);
                Ok(Tick::Pending)
            }
            TaskStatus::Queued | TaskStatus::Running => Ok(Tick::Pending),
        }
    }

    fn publish(&self, next: Progress) {
        self.progress.send_if_modified(|current| {
            if next.value > current.value {
                *current = next;
                true
            } else {
                false
            }
        });
    }
}
