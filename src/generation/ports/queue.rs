//! Work queue port feeding generation workers.

use crate::generation::domain::GenerationTaskId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for generation queue operations.
pub type GenerationQueueResult<T> = Result<T, GenerationQueueError>;

/// Queue of task identifiers awaiting processing.
///
/// Enqueueing a task that is already queued is a no-op, and each queued
/// entry is handed to exactly one [`GenerationQueue::dequeue`] caller.
#[async_trait]
pub trait GenerationQueue: Send + Sync {
    /// Queues `task_id` unless it is already waiting.
    async fn enqueue(&self, task_id: GenerationTaskId) -> GenerationQueueResult<()>;

    /// Removes and returns the oldest queued task, if any.
    async fn dequeue(&self) -> GenerationQueueResult<Option<GenerationTaskId>>;
}

/// Errors returned by generation queue implementations.
#[derive(Debug, Clone, Error)]
pub enum GenerationQueueError {
    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl GenerationQueueError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
