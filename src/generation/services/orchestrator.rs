//! Batch submission: validation, credit deduction and task fan-out.

use super::{DEFAULT_STALE_AFTER, RetryPolicy};
use crate::credit::{
    domain::{CreditAmount, CreditDomainError, UserId},
    ports::{CreditLedger, CreditLedgerError},
};
use crate::generation::{
    domain::{
        AssetPath, BatchId, BatchSpec, DEFAULT_MAX_VARIANTS, GenerationDomainError,
        GenerationTask, GenerationTaskId, ImageQuality, ImageSize, Prompt, ReferenceImage,
        ResultRecord, VariantCount, recoverable_task, stalled_cutoff,
    },
    ports::{
        AssetStore, AssetStoreError, GenerationQueue, GenerationQueueError,
        GenerationTaskRepository, GenerationTaskRepositoryError, ResultRepository,
    },
};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Request payload for a batch submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitBatchRequest {
    user_id: UserId,
    prompt: String,
    references: Vec<ReferenceImage>,
    variants: u32,
    size: ImageSize,
    quality: ImageQuality,
}

impl SubmitBatchRequest {
    /// Creates a request with default size, quality and no references.
    #[must_use]
    pub fn new(user_id: UserId, prompt: impl Into<String>, variants: u32) -> Self {
        Self {
            user_id,
            prompt: prompt.into(),
            references: Vec::new(),
            variants,
            size: ImageSize::default(),
            quality: ImageQuality::default(),
        }
    }

    /// Adds a reference image.
    #[must_use]
    pub fn with_reference(mut self, reference: ReferenceImage) -> Self {
        self.references.push(reference);
        self
    }

    /// Replaces the reference images.
    #[must_use]
    pub fn with_references(mut self, references: impl IntoIterator<Item = ReferenceImage>) -> Self {
        self.references = references.into_iter().collect();
        self
    }

    /// Sets the output layout.
    #[must_use]
    pub const fn with_size(mut self, size: ImageSize) -> Self {
        self.size = size;
        self
    }

    /// Sets the output quality.
    #[must_use]
    pub const fn with_quality(mut self, quality: ImageQuality) -> Self {
        self.quality = quality;
        self
    }
}

/// Accepted batch returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSubmission {
    /// Token for polling the batch.
    pub batch_id: BatchId,
    /// Created tasks in batch-index order.
    pub task_ids: Vec<GenerationTaskId>,
    /// Credits left after the deduction.
    pub remaining_balance: u32,
}

/// Errors returned synchronously by [`BatchOrchestrator::submit`].
#[derive(Debug, Error)]
pub enum SubmitBatchError {
    /// Request validation failed.
    #[error(transparent)]
    Domain(#[from] GenerationDomainError),

    /// The user cannot pay for the batch.
    #[error("insufficient credits: {requested} required, {balance} available")]
    InsufficientCredits {
        /// Credits the batch costs.
        requested: u32,
        /// Credits the user holds.
        balance: u32,
    },

    /// A local reference image could not be stored.
    #[error("failed to upload reference image '{file_name}': {source}")]
    ReferenceUpload {
        /// Name of the file that failed.
        file_name: String,
        /// Storage failure.
        #[source]
        source: AssetStoreError,
    },

    /// The credit amount was rejected.
    #[error(transparent)]
    Credit(#[from] CreditDomainError),

    /// The ledger failed.
    #[error(transparent)]
    Ledger(CreditLedgerError),

    /// Task persistence failed.
    #[error(transparent)]
    Tasks(#[from] GenerationTaskRepositoryError),

    /// The first task could not be queued; the batch is stored and can be
    /// restarted with [`BatchOrchestrator::resume`].
    #[error(transparent)]
    Queue(#[from] GenerationQueueError),
}

/// Result type for batch orchestration.
pub type SubmitBatchResult<T> = Result<T, SubmitBatchError>;

/// Accepts batch requests and fans them out into generation tasks.
pub struct BatchOrchestrator<T, R, L, A, Q, C>
where
    T: GenerationTaskRepository,
    R: ResultRepository,
    L: CreditLedger,
    A: AssetStore,
    Q: GenerationQueue,
    C: Clock + Send + Sync,
{
    tasks: Arc<T>,
    results: Arc<R>,
    ledger: Arc<L>,
    assets: Arc<A>,
    queue: Arc<Q>,
    clock: Arc<C>,
    max_variants: u8,
    retry: RetryPolicy,
    stale_after: Duration,
}

impl<T, R, L, A, Q, C> Clone for BatchOrchestrator<T, R, L, A, Q, C>
where
    T: GenerationTaskRepository,
    R: ResultRepository,
    L: CreditLedger,
    A: AssetStore,
    Q: GenerationQueue,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            tasks: Arc::clone(&self.tasks),
            results: Arc::clone(&self.results),
            ledger: Arc::clone(&self.ledger),
            assets: Arc::clone(&self.assets),
            queue: Arc::clone(&self.queue),
            clock: Arc::clone(&self.clock),
            max_variants: self.max_variants,
            retry: self.retry,
            stale_after: self.stale_after,
        }
    }
}

impl<T, R, L, A, Q, C> BatchOrchestrator<T, R, L, A, Q, C>
where
    T: GenerationTaskRepository,
    R: ResultRepository,
    L: CreditLedger,
    A: AssetStore,
    Q: GenerationQueue,
    C: Clock + Send + Sync,
{
    /// Creates an orchestrator with the default variant cap and retry
    /// policy.
    #[must_use]
    pub fn new(
        tasks: Arc<T>,
        results: Arc<R>,
        ledger: Arc<L>,
        assets: Arc<A>,
        queue: Arc<Q>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            tasks,
            results,
            ledger,
            assets,
            queue,
            clock,
            max_variants: DEFAULT_MAX_VARIANTS,
            retry: RetryPolicy::default(),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    /// Sets the largest accepted variant count.
    #[must_use]
    pub const fn with_max_variants(mut self, max_variants: u8) -> Self {
        self.max_variants = max_variants;
        self
    }

    /// Sets the retry policy for reference uploads.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the age after which [`BatchOrchestrator::resume`] treats a
    /// `processing` task as stalled.
    #[must_use]
    pub const fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Validates, charges and persists a batch, then queues its first task.
    ///
    /// Credits are deducted once, up front, for every variant. Tasks that
    /// later fail are not refunded. When the tasks cannot be stored the
    /// deduction is refunded.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitBatchError::Domain`] for invalid input,
    /// [`SubmitBatchError::InsufficientCredits`] when the user cannot pay,
    /// [`SubmitBatchError::ReferenceUpload`] when a local reference cannot be
    /// stored, and persistence errors otherwise. No task exists and no credit
    /// is spent after any error except [`SubmitBatchError::Queue`].
    pub async fn submit(&self, request: SubmitBatchRequest) -> SubmitBatchResult<BatchSubmission> {
        let user_id = request.user_id;
        let prompt = Prompt::new(request.prompt)?;
        let variants = VariantCount::new(request.variants, self.max_variants)?;
        for reference in &request.references {
            reference.validate()?;
        }
        let cost = u32::from(variants.value());

        let check = self
            .ledger
            .check_credits(user_id)
            .await
            .map_err(SubmitBatchError::Ledger)?;
        if !check.covers(cost) {
            info!(user_id = %user_id, cost, balance = check.balance, "batch rejected for credits");
            return Err(SubmitBatchError::InsufficientCredits {
                requested: cost,
                balance: check.balance,
            });
        }

        let reference_urls = self.store_references(user_id, request.references).await?;
        let batch_id = BatchId::new();
        let amount = CreditAmount::new(cost)?;
        let charged = self
            .ledger
            .deduct(user_id, amount)
            .await
            .map_err(|err| match err {
                CreditLedgerError::InsufficientCredits { available, .. } => {
                    SubmitBatchError::InsufficientCredits {
                        requested: cost,
                        balance: available,
                    }
                }
                other @ CreditLedgerError::Persistence(_) => SubmitBatchError::Ledger(other),
            })?;

        let spec = BatchSpec {
            batch_id,
            user_id,
            prompt,
            reference_urls,
            size: request.size,
            quality: request.quality,
            variants,
        };
        let tasks = GenerationTask::pending_batch(&spec, &*self.clock);
        if let Err(err) = self.tasks.store_batch(&tasks).await {
            self.refund(user_id, amount).await;
            return Err(err.into());
        }

        let placeholders: Vec<ResultRecord> = tasks
            .iter()
            .map(|task| ResultRecord::for_task(task, &*self.clock))
            .collect();
        if let Err(err) = self.results.store_many(&placeholders).await {
            warn!(
                batch_id = %batch_id,
                error = %err,
                "failed to create placeholder results; they will be created on completion"
            );
        }

        if let Some(first) = tasks.first() {
            self.queue.enqueue(first.id()).await?;
        }

        info!(
            batch_id = %batch_id,
            user_id = %user_id,
            variants = cost,
            remaining_balance = charged.balance(),
            "batch submitted"
        );
        Ok(BatchSubmission {
            batch_id,
            task_ids: tasks.iter().map(GenerationTask::id).collect(),
            remaining_balance: charged.balance(),
        })
    }

    /// Re-queues the next runnable task of a batch.
    ///
    /// A `processing` task untouched for longer than the stale age is
    /// queued again so its run can be repeated. Returns the queued task, or
    /// `None` when the batch is unknown, finished or has a task running.
    ///
    /// # Errors
    ///
    /// Propagates repository and queue failures.
    pub async fn resume(&self, batch_id: BatchId) -> SubmitBatchResult<Option<GenerationTaskId>> {
        let siblings = self.tasks.find_by_batch(batch_id).await?;
        let cutoff = stalled_cutoff(self.clock.utc(), self.stale_after);
        let Some(next) = recoverable_task(&siblings, cutoff) else {
            return Ok(None);
        };
        self.queue.enqueue(next.id()).await?;
        info!(
            batch_id = %batch_id,
            task_id = %next.id(),
            status = %next.status(),
            "batch resumed"
        );
        Ok(Some(next.id()))
    }

    async fn store_references(
        &self,
        user_id: UserId,
        references: Vec<ReferenceImage>,
    ) -> SubmitBatchResult<Vec<String>> {
        let mut urls = Vec::with_capacity(references.len());
        for reference in references {
            match reference {
                ReferenceImage::Url(url) => urls.push(url),
                ReferenceImage::Upload {
                    file_name,
                    content_type,
                    bytes,
                } => {
                    let path = AssetPath::for_reference(user_id, &file_name, &bytes)?;
                    let uploaded = self
                        .retry
                        .run("upload_reference", || {
                            self.assets.upload(&path, bytes.clone(), &content_type)
                        })
                        .await;
                    match uploaded {
                        Ok(url) => urls.push(url),
                        Err(source) => {
                            return Err(SubmitBatchError::ReferenceUpload { file_name, source });
                        }
                    }
                }
            }
        }
        Ok(urls)
    }

    async fn refund(&self, user_id: UserId, amount: CreditAmount) {
        if let Err(err) = self.ledger.refund(user_id, amount).await {
            error!(
                user_id = %user_id,
                credits = amount.value(),
                error = %err,
                "failed to refund credits after batch persistence failure"
            );
        }
    }
}
