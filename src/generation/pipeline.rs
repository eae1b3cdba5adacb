//! End-to-end generation: quota check, uploads, submission, then either the
//! direct result or a polled one.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::generation::gate::AccountGate;
use crate::generation::poller::{PollOptions, PollState, TaskPoller};
use crate::job::request::JobBuilder;
use crate::runninghub::client::RunningHubClient;
use crate::runninghub::types::{Asset, Progress, TaskHandle, TaskOutput};
use crate::utils::extract::{classify, extract_output_url, ExtractionResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generated {
    pub attempt: Uuid,
    pub image_url: String,
}

pub struct Generator {
    client: RunningHubClient,
    poll: PollOptions,
    task_limit: u32,
    progress: watch::Sender<Progress>,
    in_flight: AtomicBool,
}

impl Generator {
    pub fn new(client: RunningHubClient) -> Self {
        let poll = PollOptions::from_config(client.config());
        let task_limit = client.config().max_concurrent_tasks;
        let (progress, _) = watch::channel(Progress::zero());
        Generator { client, poll, task_limit, progress, in_flight: AtomicBool::new(false) }
    }

    pub fn with_poll_options(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    pub fn client(&self) -> &RunningHubClient {
        &self.client
    }

    /// Progress of the current or most recent generation.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> Progress {
        *self.progress.borrow()
    }

    /// Run one generation. Only one may be in flight per generator; errors
    /// are tagged with the attempt id.
    pub async fn generate(&self, model: Asset, clothing: Asset) -> AppResult<Generated> {
        let _guard = InFlight::acquire(&self.in_flight)?;
        let attempt = Uuid::new_v4();
        tracing::info!(%attempt, model = %model.file_name, clothing = %clothing.file_name, "Starting generation");
        self.progress.send_replace(Progress::zero());

        match self.run(&model, &clothing).await {
            Ok(image_url) => {
                self.progress.send_replace(Progress::complete());
                tracing::info!(%attempt, %image_url, "Generation finished");
                Ok(Generated { attempt, image_url })
            }
            Err(e) => {
                self.progress.send_replace(Progress::zero());
                let e = e.in_attempt(attempt);
                tracing::error!("{}", e);
                Err(e)
            }
        }
    }

    /// Run [`Generator::generate`] on its own task. Dropping the returned
    /// future leaves the generation, its polling and its busy flag in place
    /// until the task ends.
    pub async fn generate_detached(self: Arc<Self>, model: Asset, clothing: Asset) -> AppResult<Generated> {
        tokio::spawn(async move { self.generate(model, clothing).await }).await?
    }

    async fn run(&self, model: &Asset, clothing: &Asset) -> AppResult<String> {
        AccountGate::new(&self.client, self.task_limit).check().await?;

        let (model_ref, clothing_ref) = tokio::join!(
            self.client.upload_asset(model),
            self.client.upload_asset(clothing)
        );
        let job = JobBuilder::new(self.client.config()).build(&model_ref, &clothing_ref);
        let body = self.client.submit_job(&job).await?;

        match classify(&body) {
            ExtractionResult::Direct(url) => Ok(url),
            ExtractionResult::Async(handle) => self
                .await_task(&handle)
                .await
                .map_err(|e| AppError::TaskResult(Box::new(e))),
            ExtractionResult::Failed(failure) => Err(failure.into_error()),
            ExtractionResult::NotFound => {
                tracing::error!("Could not find image URL in response: {}", body);
                Err(AppError::Extraction("API response does not contain an image URL".to_string()))
            }
        }
    }

    async fn await_task(&self, handle: &TaskHandle) -> AppResult<String> {
        let mut state = PollState::for_handle(handle);
        if let Some(total) = state.total_nodes {
            tracing::info!("Total nodes to execute: {}", total);
        }
        let poller = TaskPoller::new(&self.client, self.poll, &self.progress);
        match poller.poll(handle, &mut state).await? {
            TaskOutput::Url(url) if url.starts_with("http") => Ok(url),
            TaskOutput::Url(other) => Err(AppError::Extraction(format!("Task output is not a URL: {}", other))),
            TaskOutput::Descriptor(descriptor) => extract_output_url(&descriptor).ok_or_else(|| {
                AppError::Extraction(format!("Task output does not contain an image URL: {}", descriptor))
            }),
        }
    }
}

/// Marks a generator busy for the lifetime of the guard.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> AppResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppError::Busy)?;
        Ok(InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
