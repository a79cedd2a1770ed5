//! Task repository decorator that mirrors task writes onto result records.

use crate::generation::{
    domain::{BatchId, BatchIndex, GenerationTask, GenerationTaskId},
    ports::{GenerationTaskRepository, GenerationTaskRepositoryResult, ResultRepository},
    services::ResultReconciler,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;

/// Wraps a task repository so every successful update synchronises the
/// linked result records.
///
/// This is the application-level counterpart of the `PostgreSQL`
/// `photoshoot_sync_trigger`. Reconciliation runs after the task write and
/// never turns a successful write into an error.
pub struct ReconcilingTaskRepository<T, R, C>
where
    T: GenerationTaskRepository,
    R: ResultRepository,
    C: Clock + Send + Sync,
{
    inner: Arc<T>,
    reconciler: ResultReconciler<T, R, C>,
}

impl<T, R, C> ReconcilingTaskRepository<T, R, C>
where
    T: GenerationTaskRepository,
    R: ResultRepository,
    C: Clock + Send + Sync,
{
    /// Wraps `inner`, mirroring its updates into `results`.
    #[must_use]
    pub fn new(inner: Arc<T>, results: Arc<R>, clock: Arc<C>) -> Self {
        let reconciler = ResultReconciler::new(Arc::clone(&inner), results, clock);
        Self { inner, reconciler }
    }
}

#[async_trait]
impl<T, R, C> GenerationTaskRepository for ReconcilingTaskRepository<T, R, C>
where
    T: GenerationTaskRepository,
    R: ResultRepository,
    C: Clock + Send + Sync,
{
    async fn store_batch(&self, tasks: &[GenerationTask]) -> GenerationTaskRepositoryResult<()> {
        self.inner.store_batch(tasks).await
    }

    async fn update(
        &self,
        task: &GenerationTask,
    ) -> GenerationTaskRepositoryResult<GenerationTask> {
        let previous = self.inner.update(task).await?;
        self.reconciler.on_task_changed(Some(&previous), task).await;
        Ok(previous)
    }

    async fn find_by_id(
        &self,
        id: GenerationTaskId,
    ) -> GenerationTaskRepositoryResult<Option<GenerationTask>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_batch(
        &self,
        batch_id: BatchId,
    ) -> GenerationTaskRepositoryResult<Vec<GenerationTask>> {
        self.inner.find_by_batch(batch_id).await
    }

    async fn find_by_batch_index(
        &self,
        batch_id: BatchId,
        batch_index: BatchIndex,
    ) -> GenerationTaskRepositoryResult<Option<GenerationTask>> {
        self.inner.find_by_batch_index(batch_id, batch_index).await
    }

    async fn find_stalled(
        &self,
        cutoff: DateTime<Utc>,
    ) -> GenerationTaskRepositoryResult<Vec<GenerationTask>> {
        self.inner.find_stalled(cutoff).await
    }
}
