//! Drives one generation task from pending to a terminal state.

use super::{ResultReconciler, RetryPolicy};
use crate::generation::{
    domain::{
        AssetPath, BatchId, GenerationDomainError, GenerationStatus, GenerationTask,
        GenerationTaskId, next_runnable_task, recoverable_task, stalled_cutoff,
    },
    ports::{
        AssetStore, GenerationQueue, GenerationQueueError, GenerationRequest,
        GenerationTaskRepository, GenerationTaskRepositoryError, ImageGenerator,
        ImageGeneratorError, ReferenceBytes, ResultRepository,
    },
};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Default budget for one generator call.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(240);

/// Default age after which an unfinished task is considered stalled.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(600);

/// Tunables for [`TaskProcessor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorSettings {
    /// Budget for one generator call.
    pub generation_timeout: Duration,
    /// Placeholder image reported to callers when a task fails.
    pub fallback_image_url: Option<String>,
    /// Retry policy for storage calls, task writes and chaining.
    pub retry: RetryPolicy,
    /// Age after which an unfinished task is re-queued by
    /// [`TaskProcessor::recover_stalled`].
    pub stale_after: Duration,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            fallback_image_url: None,
            retry: RetryPolicy::default(),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }
}

/// What happened to the processed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The image was generated and stored.
    Completed {
        /// Processed task.
        task_id: GenerationTaskId,
        /// Public URL of the stored image.
        image_url: String,
    },
    /// Generation failed; the task records `message`.
    Failed {
        /// Processed task.
        task_id: GenerationTaskId,
        /// Failure recorded on the task.
        message: String,
        /// Placeholder image for the immediate caller, when configured.
        fallback_url: Option<String>,
    },
    /// The task was already terminal when picked up.
    AlreadyTerminal {
        /// Processed task.
        task_id: GenerationTaskId,
        /// Stored terminal status.
        status: GenerationStatus,
    },
    /// Another invocation moved the task first; its stored state was kept.
    Superseded {
        /// Processed task.
        task_id: GenerationTaskId,
        /// Status written by the other invocation.
        status: GenerationStatus,
    },
}

/// Result of one [`TaskProcessor::process`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    /// Outcome for the processed task.
    pub outcome: TaskOutcome,
    /// Sibling queued to run next, if any.
    pub chained: Option<GenerationTaskId>,
}

/// Errors returned by [`TaskProcessor::process`].
///
/// Generation failures are not errors: they are recorded on the task.
#[derive(Debug, Error)]
pub enum ProcessTaskError {
    /// No task has the identifier.
    #[error("generation task not found: {0}")]
    TaskNotFound(GenerationTaskId),
    /// A domain transition was rejected.
    #[error(transparent)]
    Domain(#[from] GenerationDomainError),
    /// Task persistence failed.
    #[error(transparent)]
    Tasks(#[from] GenerationTaskRepositoryError),
    /// A task could not be queued.
    #[error(transparent)]
    Queue(#[from] GenerationQueueError),
}

/// Result type for task processing.
pub type ProcessTaskResult<T> = Result<T, ProcessTaskError>;

/// Runs generation tasks and chains batches forward.
pub struct TaskProcessor<T, R, A, G, Q, C>
where
    T: GenerationTaskRepository,
    R: ResultRepository,
    A: AssetStore,
    G: ImageGenerator,
    Q: GenerationQueue,
    C: Clock + Send + Sync,
{
    tasks: Arc<T>,
    assets: Arc<A>,
    generator: Arc<G>,
    queue: Arc<Q>,
    clock: Arc<C>,
    reconciler: ResultReconciler<T, R, C>,
    settings: ProcessorSettings,
}

impl<T, R, A, G, Q, C> TaskProcessor<T, R, A, G, Q, C>
where
    T: GenerationTaskRepository,
    R: ResultRepository,
    A: AssetStore,
    G: ImageGenerator,
    Q: GenerationQueue,
    C: Clock + Send + Sync,
{
    /// Creates a processor with default settings.
    #[must_use]
    pub fn new(
        tasks: Arc<T>,
        results: Arc<R>,
        assets: Arc<A>,
        generator: Arc<G>,
        queue: Arc<Q>,
        clock: Arc<C>,
    ) -> Self {
        let reconciler = ResultReconciler::new(Arc::clone(&tasks), results, Arc::clone(&clock));
        Self {
            tasks,
            assets,
            generator,
            queue,
            clock,
            reconciler,
            settings: ProcessorSettings::default(),
        }
    }

    /// Replaces the processor settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ProcessorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Processes one task and queues the next runnable sibling.
    ///
    /// Terminal tasks are left untouched. A task found in `processing` is
    /// resumed without being marked again. When another invocation claims or
    /// finishes the task first, the stored state wins and result records are
    /// reconciled from it.
    ///
    /// The outcome write is retried under the configured policy. When it
    /// still fails, the task is recorded as failed instead. A failure to
    /// queue the next sibling is logged and reported as `chained: None`;
    /// [`TaskProcessor::recover_stalled`] picks such batches up later.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessTaskError::TaskNotFound`] for unknown tasks and
    /// propagates persistence failures that leave the task unfinished.
    pub async fn process(&self, task_id: GenerationTaskId) -> ProcessTaskResult<ProcessReport> {
        let task = self
            .tasks
            .find_by_id(task_id)
            .await?
            .ok_or(ProcessTaskError::TaskNotFound(task_id))?;
        let batch_id = task.batch_id();

        let outcome = if task.status().is_terminal() {
            info!(task_id = %task_id, status = %task.status(), "task already terminal");
            TaskOutcome::AlreadyTerminal {
                task_id,
                status: task.status(),
            }
        } else {
            self.run(task).await?
        };

        let chained = match self.chain(batch_id).await {
            Ok(chained) => chained,
            Err(err) => {
                error!(batch_id = %batch_id, error = %err, "failed to queue next task");
                None
            }
        };
        Ok(ProcessReport { outcome, chained })
    }

    /// Re-queues batches that stopped making progress.
    ///
    /// Looks for unfinished tasks untouched for longer than
    /// [`ProcessorSettings::stale_after`] and queues, per affected batch,
    /// either its stalled `processing` task or its next pending task.
    /// Returns the queued task identifiers.
    ///
    /// # Errors
    ///
    /// Propagates repository and queue failures.
    pub async fn recover_stalled(&self) -> ProcessTaskResult<Vec<GenerationTaskId>> {
        let cutoff = stalled_cutoff(self.clock.utc(), self.settings.stale_after);
        let stalled = self.tasks.find_stalled(cutoff).await?;
        let mut batches: Vec<BatchId> = Vec::new();
        for task in &stalled {
            if !batches.contains(&task.batch_id()) {
                batches.push(task.batch_id());
            }
        }

        let mut queued = Vec::new();
        for batch_id in batches {
            let siblings = self.tasks.find_by_batch(batch_id).await?;
            let Some(task) = recoverable_task(&siblings, cutoff) else {
                continue;
            };
            self.queue.enqueue(task.id()).await?;
            warn!(
                batch_id = %batch_id,
                task_id = %task.id(),
                status = %task.status(),
                "re-queued stalled task"
            );
            queued.push(task.id());
        }
        Ok(queued)
    }

    async fn run(&self, mut task: GenerationTask) -> ProcessTaskResult<TaskOutcome> {
        if task.status() == GenerationStatus::Pending {
            task.start(&*self.clock)?;
            match self.tasks.update(&task).await {
                Ok(_) => {
                    self.reconciler.reconcile(&task).await;
                }
                Err(err) if is_conflict(&err) => return self.adopt_stored(task.id()).await,
                Err(err) => return Err(err.into()),
            }
        }
        let claimed = task.clone();
        info!(
            task_id = %task.id(),
            batch_id = %task.batch_id(),
            batch_index = %task.batch_index(),
            "generating image"
        );

        match self.generate(&task).await {
            Ok(image_url) => {
                task.complete(image_url.clone(), &*self.clock)?;
                let outcome = TaskOutcome::Completed {
                    task_id: task.id(),
                    image_url,
                };
                self.finish(task, claimed, outcome).await
            }
            Err(message) => {
                warn!(task_id = %task.id(), error = %message, "image generation failed");
                task.fail(message.clone(), &*self.clock)?;
                let outcome = TaskOutcome::Failed {
                    task_id: task.id(),
                    message,
                    fallback_url: self.settings.fallback_image_url.clone(),
                };
                self.finish(task, claimed, outcome).await
            }
        }
    }

    async fn finish(
        &self,
        task: GenerationTask,
        claimed: GenerationTask,
        outcome: TaskOutcome,
    ) -> ProcessTaskResult<TaskOutcome> {
        match self.record(&task).await {
            Ok(()) => {
                self.reconciler.upsert_for(&task).await;
                info!(task_id = %task.id(), status = %task.status(), "task finished");
                Ok(outcome)
            }
            Err(err) if is_conflict(&err) => self.adopt_stored(task.id()).await,
            Err(err) => {
                error!(
                    task_id = %task.id(),
                    status = %task.status(),
                    error = %err,
                    "failed to record task outcome"
                );
                self.record_failure(claimed, &err).await
            }
        }
    }

    async fn record_failure(
        &self,
        mut task: GenerationTask,
        cause: &GenerationTaskRepositoryError,
    ) -> ProcessTaskResult<TaskOutcome> {
        let message = format!("failed to record task outcome: {cause}");
        task.fail(message.clone(), &*self.clock)?;
        match self.record(&task).await {
            Ok(()) => {
                self.reconciler.upsert_for(&task).await;
                warn!(task_id = %task.id(), "task recorded as failed after write errors");
                Ok(TaskOutcome::Failed {
                    task_id: task.id(),
                    message,
                    fallback_url: self.settings.fallback_image_url.clone(),
                })
            }
            Err(err) if is_conflict(&err) => self.adopt_stored(task.id()).await,
            Err(err) => Err(err.into()),
        }
    }

    async fn record(&self, task: &GenerationTask) -> Result<(), GenerationTaskRepositoryError> {
        self.settings
            .retry
            .run_while(
                "update_task",
                GenerationTaskRepositoryError::is_transient,
                || self.tasks.update(task),
            )
            .await
            .map(|_| ())
    }

    async fn adopt_stored(&self, task_id: GenerationTaskId) -> ProcessTaskResult<TaskOutcome> {
        let stored = self
            .tasks
            .find_by_id(task_id)
            .await?
            .ok_or(ProcessTaskError::TaskNotFound(task_id))?;
        warn!(
            task_id = %task_id,
            status = %stored.status(),
            "task was moved by another invocation; keeping stored state"
        );
        if stored.status().is_terminal() {
            self.reconciler.upsert_for(&stored).await;
        }
        Ok(TaskOutcome::Superseded {
            task_id,
            status: stored.status(),
        })
    }

    async fn generate(&self, task: &GenerationTask) -> Result<String, String> {
        let references = self.fetch_references(task).await;
        let request = GenerationRequest::new(task.prompt().clone(), task.size(), task.quality())
            .with_references(references);

        let timeout = self.settings.generation_timeout;
        let images = match tokio::time::timeout(timeout, self.generator.generate(&request)).await {
            Ok(Ok(images)) => images,
            Ok(Err(err)) => return Err(err.to_string()),
            Err(_) => {
                let seconds = timeout.as_secs();
                return Err(ImageGeneratorError::Timeout { seconds }.to_string());
            }
        };
        let image = images
            .into_iter()
            .next()
            .ok_or_else(|| ImageGeneratorError::EmptyResponse.to_string())?;

        let path = AssetPath::for_generated(
            task.user_id(),
            task.batch_id(),
            task.batch_index(),
            image.extension(),
            &image.bytes,
        )
        .map_err(|err| err.to_string())?;
        self.settings
            .retry
            .run("upload_generated", || {
                self.assets
                    .upload(&path, image.bytes.clone(), &image.content_type)
            })
            .await
            .map_err(|err| format!("failed to store generated image: {err}"))
    }

    async fn fetch_references(&self, task: &GenerationTask) -> Vec<ReferenceBytes> {
        let mut references = Vec::with_capacity(task.reference_urls().len());
        for (position, url) in task.reference_urls().iter().enumerate() {
            let downloaded = self
                .settings
                .retry
                .run("download_reference", || self.assets.download(url))
                .await;
            match downloaded {
                Ok(bytes) => {
                    let content_type = content_type_for(url);
                    references.push(ReferenceBytes {
                        file_name: format!("reference-{position}.{}", extension_for(content_type)),
                        content_type: content_type.to_owned(),
                        bytes,
                    });
                }
                Err(err) => {
                    warn!(
                        task_id = %task.id(),
                        url = %url,
                        error = %err,
                        "skipping unreadable reference image"
                    );
                }
            }
        }
        references
    }

    async fn chain(&self, batch_id: BatchId) -> ProcessTaskResult<Option<GenerationTaskId>> {
        let siblings = self.tasks.find_by_batch(batch_id).await?;
        let Some(next) = next_runnable_task(&siblings) else {
            return Ok(None);
        };
        let next_id = next.id();
        self.settings
            .retry
            .run_while("enqueue_task", |_: &GenerationQueueError| true, || {
                self.queue.enqueue(next_id)
            })
            .await?;
        info!(batch_id = %batch_id, task_id = %next_id, "queued next task");
        Ok(Some(next_id))
    }
}

const fn is_conflict(err: &GenerationTaskRepositoryError) -> bool {
    matches!(
        err,
        GenerationTaskRepositoryError::TerminalState { .. }
            | GenerationTaskRepositoryError::InvalidTransition { .. }
    )
}

fn content_type_for(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "image/jpeg"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else {
        "image/png"
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}
