//! Batch status queries and client-side polling.

use crate::generation::{
    domain::{BatchId, BatchProgress},
    ports::{GenerationTaskRepository, GenerationTaskRepositoryError},
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

/// Default pause between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default time after which a poller gives up.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(600);

/// Errors returned by batch progress queries.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// No task belongs to the batch.
    #[error("batch not found: {0}")]
    BatchNotFound(BatchId),
    /// Task lookup failed.
    #[error(transparent)]
    Tasks(#[from] GenerationTaskRepositoryError),
}

/// Result type for batch progress queries.
pub type ProgressResult<T> = Result<T, ProgressError>;

/// Aggregates task statuses into batch progress.
#[derive(Clone)]
pub struct BatchProgressService<T>
where
    T: GenerationTaskRepository,
{
    tasks: Arc<T>,
}

impl<T> BatchProgressService<T>
where
    T: GenerationTaskRepository,
{
    /// Creates a progress service.
    #[must_use]
    pub const fn new(tasks: Arc<T>) -> Self {
        Self { tasks }
    }

    /// Returns the current progress of a batch.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::BatchNotFound`] when the batch has no tasks.
    pub async fn status(&self, batch_id: BatchId) -> ProgressResult<BatchProgress> {
        let tasks = self.tasks.find_by_batch(batch_id).await?;
        if tasks.is_empty() {
            return Err(ProgressError::BatchNotFound(batch_id));
        }
        Ok(BatchProgress::from_tasks(batch_id, &tasks))
    }
}

/// How a watch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Every task reached a terminal state.
    Finished(BatchProgress),
    /// The timeout elapsed first. Tasks keep running server-side.
    Abandoned(BatchProgress),
}

/// Polls batch progress until completion or timeout.
#[derive(Clone)]
pub struct BatchPoller<T>
where
    T: GenerationTaskRepository,
{
    service: BatchProgressService<T>,
    interval: Duration,
    timeout: Duration,
}

impl<T> BatchPoller<T>
where
    T: GenerationTaskRepository,
{
    /// Creates a poller with the default interval and timeout.
    #[must_use]
    pub const fn new(service: BatchProgressService<T>) -> Self {
        Self {
            service,
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Sets the pause between polls.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the time after which polling stops.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the pause between polls.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the time after which polling stops.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Polls the batch, handing every snapshot to `on_update`.
    ///
    /// # Errors
    ///
    /// Propagates query failures, including
    /// [`ProgressError::BatchNotFound`].
    pub async fn watch<F>(&self, batch_id: BatchId, mut on_update: F) -> ProgressResult<PollOutcome>
    where
        F: FnMut(&BatchProgress) + Send,
    {
        let deadline = Instant::now().checked_add(self.timeout);
        loop {
            let progress = self.service.status(batch_id).await?;
            on_update(&progress);
            if progress.is_finished() {
                info!(
                    batch_id = %batch_id,
                    completed = progress.completed,
                    failed = progress.failed,
                    "batch finished"
                );
                return Ok(PollOutcome::Finished(progress));
            }
            if deadline.is_some_and(|limit| Instant::now() >= limit) {
                info!(batch_id = %batch_id, percent = progress.percent(), "stopped polling batch");
                return Ok(PollOutcome::Abandoned(progress));
            }
            debug!(batch_id = %batch_id, percent = progress.percent(), "batch in progress");
            tokio::time::sleep(self.interval).await;
        }
    }
}
