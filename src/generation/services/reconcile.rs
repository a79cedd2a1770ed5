//! Keeps result records in step with their generation tasks.

use crate::generation::{
    domain::{GenerationTask, ResultId, ResultRecord},
    ports::{
        GenerationTaskRepository, GenerationTaskRepositoryError, ResultRepository,
        ResultRepositoryError, ResultRepositoryResult,
    },
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Counts produced by one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Linked records found.
    pub matched: usize,
    /// Records rewritten because they had drifted.
    pub updated: usize,
    /// Records created because none was linked.
    pub inserted: usize,
}

/// Outcome of an on-demand repair of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// The record was rewritten from its task.
    Updated,
    /// The record already matched its task.
    AlreadyConsistent,
    /// No task could be resolved through any link.
    NoLinkedTask,
}

/// Errors surfaced by explicit repair and backfill operations.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The result record does not exist.
    #[error("result not found: {0}")]
    ResultNotFound(ResultId),
    /// Task lookup failed.
    #[error(transparent)]
    Tasks(#[from] GenerationTaskRepositoryError),
    /// Result persistence failed.
    #[error(transparent)]
    Results(#[from] ResultRepositoryError),
}

/// Result type for repair and backfill operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Mirrors task state onto linked result records.
///
/// Change-driven synchronisation ([`ResultReconciler::on_task_changed`] and
/// [`ResultReconciler::reconcile`]) never fails: storage errors are logged
/// and swallowed so the task write that triggered them stands.
#[derive(Clone)]
pub struct ResultReconciler<T, R, C>
where
    T: GenerationTaskRepository,
    R: ResultRepository,
    C: Clock + Send + Sync,
{
    tasks: Arc<T>,
    results: Arc<R>,
    clock: Arc<C>,
}

impl<T, R, C> ResultReconciler<T, R, C>
where
    T: GenerationTaskRepository,
    R: ResultRepository,
    C: Clock + Send + Sync,
{
    /// Creates a reconciler.
    #[must_use]
    pub const fn new(tasks: Arc<T>, results: Arc<R>, clock: Arc<C>) -> Self {
        Self {
            tasks,
            results,
            clock,
        }
    }

    /// Reacts to a task write.
    ///
    /// Does nothing unless the status or result URL changed between
    /// `previous` and `current`.
    pub async fn on_task_changed(
        &self,
        previous: Option<&GenerationTask>,
        current: &GenerationTask,
    ) -> ReconcileReport {
        let unchanged = previous.is_some_and(|before| {
            before.status() == current.status()
                && before.result_image_url() == current.result_image_url()
        });
        if unchanged {
            return ReconcileReport::default();
        }
        self.reconcile(current).await
    }

    /// Applies the task's state to every linked record.
    pub async fn reconcile(&self, task: &GenerationTask) -> ReconcileReport {
        match self.try_reconcile(task).await {
            Ok(report) => report,
            Err(err) => {
                warn!(
                    task_id = %task.id(),
                    batch_id = %task.batch_id(),
                    error = %err,
                    "result reconciliation failed"
                );
                ReconcileReport::default()
            }
        }
    }

    /// Reconciles linked records, creating one when none exists.
    pub async fn upsert_for(&self, task: &GenerationTask) -> ReconcileReport {
        let mut report = match self.try_reconcile(task).await {
            Ok(report) => report,
            Err(err) => {
                warn!(task_id = %task.id(), error = %err, "result reconciliation failed");
                return ReconcileReport::default();
            }
        };
        if report.matched == 0 {
            let record = ResultRecord::for_task(task, &*self.clock);
            match self.results.store(&record).await {
                Ok(()) => report.inserted = 1,
                Err(err) => {
                    warn!(task_id = %task.id(), error = %err, "failed to create result record");
                }
            }
        }
        report
    }

    /// Re-derives one record from its task, whichever link it carries.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::ResultNotFound`] for unknown records and
    /// propagates repository failures.
    pub async fn repair(&self, result_id: ResultId) -> ReconcileResult<RepairOutcome> {
        let mut record = self
            .results
            .find_by_id(result_id)
            .await?
            .ok_or(ReconcileError::ResultNotFound(result_id))?;
        let Some(task) = self.resolve_task(&record).await? else {
            return Ok(RepairOutcome::NoLinkedTask);
        };
        if !record.mirror(&task, &*self.clock) {
            return Ok(RepairOutcome::AlreadyConsistent);
        }
        self.results.update(&record).await?;
        info!(result_id = %result_id, task_id = %task.id(), "result record repaired");
        Ok(RepairOutcome::Updated)
    }

    /// Gives every legacy-only record its canonical task link.
    ///
    /// Returns the number of records back-filled. Records whose task cannot
    /// be resolved are left untouched.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn backfill_legacy_links(&self) -> ReconcileResult<usize> {
        let mut backfilled = 0_usize;
        for mut record in self.results.find_legacy_only().await? {
            let Some(task) = self.resolve_task(&record).await? else {
                warn!(result_id = %record.id(), "legacy result has no matching task");
                continue;
            };
            if record.mirror(&task, &*self.clock) {
                self.results.update(&record).await?;
                backfilled = backfilled.saturating_add(1);
            }
        }
        info!(backfilled, "legacy result links back-filled");
        Ok(backfilled)
    }

    async fn try_reconcile(&self, task: &GenerationTask) -> ResultRepositoryResult<ReconcileReport> {
        let linked = self.results.find_linked_to(task).await?;
        let mut report = ReconcileReport {
            matched: linked.len(),
            ..ReconcileReport::default()
        };
        for mut record in linked {
            if record.mirror(task, &*self.clock) {
                self.results.update(&record).await?;
                report.updated = report.updated.saturating_add(1);
            }
        }
        Ok(report)
    }

    async fn resolve_task(
        &self,
        record: &ResultRecord,
    ) -> ReconcileResult<Option<GenerationTask>> {
        if let Some(task_id) = record.task_id() {
            return Ok(self.tasks.find_by_id(task_id).await?);
        }
        for link in record.legacy_links() {
            let task = self
                .tasks
                .find_by_batch_index(link.batch_id(), link.batch_index())
                .await?;
            if task.is_some() {
                return Ok(task);
            }
        }
        Ok(None)
    }
}
