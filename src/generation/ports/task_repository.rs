//! Repository port for generation task persistence.

use crate::generation::domain::{
    BatchId, BatchIndex, GenerationStatus, GenerationTask, GenerationTaskId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for generation task repository operations.
pub type GenerationTaskRepositoryResult<T> = Result<T, GenerationTaskRepositoryError>;

/// Generation task persistence contract.
///
/// Implementations enforce the status state machine at the storage boundary:
/// a row stored in a terminal status is never rewritten, whatever the caller
/// believes its state to be.
#[async_trait]
pub trait GenerationTaskRepository: Send + Sync {
    /// Stores every task of a new batch in one all-or-nothing write.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationTaskRepositoryError::DuplicateTask`] or
    /// [`GenerationTaskRepositoryError::DuplicateBatchIndex`] without storing
    /// any task when an identifier or `(batch_id, batch_index)` pair exists.
    async fn store_batch(&self, tasks: &[GenerationTask]) -> GenerationTaskRepositoryResult<()>;

    /// Persists a task mutation and returns the state it replaced.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationTaskRepositoryError::NotFound`] for unknown tasks,
    /// [`GenerationTaskRepositoryError::TerminalState`] when the stored row is
    /// already terminal, and
    /// [`GenerationTaskRepositoryError::InvalidTransition`] when the stored
    /// status cannot move to the incoming one.
    async fn update(&self, task: &GenerationTask) -> GenerationTaskRepositoryResult<GenerationTask>;

    /// Finds a task by identifier.
    async fn find_by_id(
        &self,
        id: GenerationTaskId,
    ) -> GenerationTaskRepositoryResult<Option<GenerationTask>>;

    /// Returns the tasks of a batch ordered by batch index.
    async fn find_by_batch(
        &self,
        batch_id: BatchId,
    ) -> GenerationTaskRepositoryResult<Vec<GenerationTask>>;

    /// Finds the task at `batch_index` within a batch.
    async fn find_by_batch_index(
        &self,
        batch_id: BatchId,
        batch_index: BatchIndex,
    ) -> GenerationTaskRepositoryResult<Option<GenerationTask>>;

    /// Returns unfinished tasks last updated before `cutoff`, oldest first.
    async fn find_stalled(
        &self,
        cutoff: DateTime<Utc>,
    ) -> GenerationTaskRepositoryResult<Vec<GenerationTask>>;
}

/// Errors returned by generation task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum GenerationTaskRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate generation task identifier: {0}")]
    DuplicateTask(GenerationTaskId),

    /// A task already occupies the batch position.
    #[error("batch {batch_id} already has a task at index {batch_index}")]
    DuplicateBatchIndex {
        /// Batch identifier.
        batch_id: BatchId,
        /// Occupied position.
        batch_index: BatchIndex,
    },

    /// The task was not found.
    #[error("generation task not found: {0}")]
    NotFound(GenerationTaskId),

    /// The stored task is terminal and cannot be rewritten.
    #[error("generation task {task_id} is already {status}")]
    TerminalState {
        /// Task identifier.
        task_id: GenerationTaskId,
        /// Stored terminal status.
        status: GenerationStatus,
    },

    /// The stored status cannot move to the incoming status.
    #[error("generation task {task_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Task identifier.
        task_id: GenerationTaskId,
        /// Stored status.
        from: GenerationStatus,
        /// Incoming status.
        to: GenerationStatus,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl GenerationTaskRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Returns `true` when repeating the same write may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

/// Checks whether `incoming` may overwrite `stored`.
///
/// Shared by every adapter so the storage-level state machine is identical
/// across backends. Rewriting a status with itself is rejected, so the first
/// write that moves a task to `processing` is the only one that claims it.
///
/// # Errors
///
/// Returns [`GenerationTaskRepositoryError::TerminalState`] when `stored` is
/// terminal and [`GenerationTaskRepositoryError::InvalidTransition`] when the
/// status change is not permitted.
pub fn ensure_update_allowed(
    stored: &GenerationTask,
    incoming: &GenerationTask,
) -> GenerationTaskRepositoryResult<()> {
    let from = stored.status();
    let to = incoming.status();
    if from.is_terminal() {
        return Err(GenerationTaskRepositoryError::TerminalState {
            task_id: stored.id(),
            status: from,
        });
    }
    if !from.can_transition_to(to) {
        return Err(GenerationTaskRepositoryError::InvalidTransition {
            task_id: stored.id(),
            from,
            to,
        });
    }
    Ok(())
}
