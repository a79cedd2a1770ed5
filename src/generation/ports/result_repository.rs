//! Repository port for user-facing result records.

use crate::generation::domain::{GenerationTask, ResultId, ResultRecord};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for result repository operations.
pub type ResultRepositoryResult<T> = Result<T, ResultRepositoryError>;

/// Result record persistence contract.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Stores a new record.
    ///
    /// # Errors
    ///
    /// Returns [`ResultRepositoryError::DuplicateResult`] when the identifier
    /// already exists.
    async fn store(&self, record: &ResultRecord) -> ResultRepositoryResult<()>;

    /// Stores several records in one all-or-nothing write.
    ///
    /// # Errors
    ///
    /// Returns [`ResultRepositoryError::DuplicateResult`] without storing any
    /// record when one of the identifiers already exists.
    async fn store_many(&self, records: &[ResultRecord]) -> ResultRepositoryResult<()>;

    /// Persists changes to an existing record.
    ///
    /// # Errors
    ///
    /// Returns [`ResultRepositoryError::NotFound`] when the record does not
    /// exist.
    async fn update(&self, record: &ResultRecord) -> ResultRepositoryResult<()>;

    /// Finds a record by identifier.
    async fn find_by_id(&self, id: ResultId) -> ResultRepositoryResult<Option<ResultRecord>>;

    /// Returns every record linked to `task` through the canonical task
    /// reference or either legacy positional link.
    async fn find_linked_to(
        &self,
        task: &GenerationTask,
    ) -> ResultRepositoryResult<Vec<ResultRecord>>;

    /// Returns the records that carry a legacy link but no canonical one.
    async fn find_legacy_only(&self) -> ResultRepositoryResult<Vec<ResultRecord>>;
}

/// Errors returned by result repository implementations.
#[derive(Debug, Clone, Error)]
pub enum ResultRepositoryError {
    /// A record with the same identifier already exists.
    #[error("duplicate result identifier: {0}")]
    DuplicateResult(ResultId),

    /// The record was not found.
    #[error("result not found: {0}")]
    NotFound(ResultId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ResultRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
