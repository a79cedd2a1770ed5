//! Generation task aggregate: one record per requested image variant.

use super::{
    BatchId, BatchIndex, GenerationDomainError, GenerationStatus, GenerationTaskId, ImageQuality,
    ImageSize, Prompt, VariantCount,
};
use crate::credit::domain::UserId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Shared attributes of every task in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSpec {
    /// Batch identifier shared by all tasks.
    pub batch_id: BatchId,
    /// Owning user.
    pub user_id: UserId,
    /// Prompt sent for every variant.
    pub prompt: Prompt,
    /// Public URLs of the reference images.
    pub reference_urls: Vec<String>,
    /// Requested layout.
    pub size: ImageSize,
    /// Requested quality.
    pub quality: ImageQuality,
    /// Number of tasks to create.
    pub variants: VariantCount,
}

/// Generation task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationTask {
    id: GenerationTaskId,
    batch_id: BatchId,
    batch_index: BatchIndex,
    total_in_batch: u32,
    user_id: UserId,
    prompt: Prompt,
    reference_urls: Vec<String>,
    size: ImageSize,
    quality: ImageQuality,
    status: GenerationStatus,
    result_image_url: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedGenerationTaskData {
    /// Persisted task identifier.
    pub id: GenerationTaskId,
    /// Persisted batch identifier.
    pub batch_id: BatchId,
    /// Persisted position within the batch.
    pub batch_index: BatchIndex,
    /// Persisted batch size.
    pub total_in_batch: u32,
    /// Persisted owner.
    pub user_id: UserId,
    /// Persisted prompt.
    pub prompt: Prompt,
    /// Persisted reference image URLs.
    pub reference_urls: Vec<String>,
    /// Persisted layout.
    pub size: ImageSize,
    /// Persisted quality.
    pub quality: ImageQuality,
    /// Persisted status.
    pub status: GenerationStatus,
    /// Persisted result URL, if any.
    pub result_image_url: Option<String>,
    /// Persisted error message, if any.
    pub error_message: Option<String>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl GenerationTask {
    /// Creates the pending tasks of a batch, one per index `0..variants`.
    #[must_use]
    pub fn pending_batch(spec: &BatchSpec, clock: &impl Clock) -> Vec<Self> {
        let timestamp = clock.utc();
        let total_in_batch = u32::from(spec.variants.value());
        spec.variants
            .indices()
            .map(|batch_index| Self {
                id: GenerationTaskId::new(),
                batch_id: spec.batch_id,
                batch_index,
                total_in_batch,
                user_id: spec.user_id,
                prompt: spec.prompt.clone(),
                reference_urls: spec.reference_urls.clone(),
                size: spec.size,
                quality: spec.quality,
                status: GenerationStatus::Pending,
                result_image_url: None,
                error_message: None,
                created_at: timestamp,
                updated_at: timestamp,
            })
            .collect()
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedGenerationTaskData) -> Self {
        Self {
            id: data.id,
            batch_id: data.batch_id,
            batch_index: data.batch_index,
            total_in_batch: data.total_in_batch,
            user_id: data.user_id,
            prompt: data.prompt,
            reference_urls: data.reference_urls,
            size: data.size,
            quality: data.quality,
            status: data.status,
            result_image_url: data.result_image_url,
            error_message: data.error_message,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> GenerationTaskId {
        self.id
    }

    /// Returns the batch identifier.
    #[must_use]
    pub const fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    /// Returns the position within the batch.
    #[must_use]
    pub const fn batch_index(&self) -> BatchIndex {
        self.batch_index
    }

    /// Returns the number of tasks in the batch.
    #[must_use]
    pub const fn total_in_batch(&self) -> u32 {
        self.total_in_batch
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the prompt.
    #[must_use]
    pub const fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    /// Returns the reference image URLs.
    #[must_use]
    pub fn reference_urls(&self) -> &[String] {
        &self.reference_urls
    }

    /// Returns the requested layout.
    #[must_use]
    pub const fn size(&self) -> ImageSize {
        self.size
    }

    /// Returns the requested quality.
    #[must_use]
    pub const fn quality(&self) -> ImageQuality {
        self.quality
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> GenerationStatus {
        self.status
    }

    /// Returns the generated image URL once completed.
    #[must_use]
    pub fn result_image_url(&self) -> Option<&str> {
        self.result_image_url.as_deref()
    }

    /// Returns the failure message once failed.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Marks the task as picked up by a worker.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationDomainError::InvalidStatusTransition`] unless the
    /// task is pending.
    pub fn start(&mut self, clock: &impl Clock) -> Result<(), GenerationDomainError> {
        self.transition_to(GenerationStatus::Processing, clock)
    }

    /// Marks the task completed with the public URL of its image.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationDomainError::EmptyResultUrl`] for a blank URL or
    /// [`GenerationDomainError::InvalidStatusTransition`] unless the task is
    /// processing.
    pub fn complete(
        &mut self,
        image_url: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), GenerationDomainError> {
        let url = image_url.into();
        if url.trim().is_empty() {
            return Err(GenerationDomainError::EmptyResultUrl);
        }
        self.transition_to(GenerationStatus::Completed, clock)?;
        self.result_image_url = Some(url);
        Ok(())
    }

    /// Marks the task failed with a human-readable message.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationDomainError::InvalidStatusTransition`] when the
    /// task is already terminal.
    pub fn fail(
        &mut self,
        message: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), GenerationDomainError> {
        self.transition_to(GenerationStatus::Failed, clock)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    fn transition_to(
        &mut self,
        target: GenerationStatus,
        clock: &impl Clock,
    ) -> Result<(), GenerationDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(GenerationDomainError::InvalidStatusTransition {
                task_id: self.id,
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.updated_at = clock.utc();
        Ok(())
    }
}

/// Picks the task a batch should run next.
///
/// Returns the lowest-index pending task, or `None` when the batch has no
/// pending work or one of its tasks is still processing. Tasks of a batch
/// therefore run one at a time, in index order.
#[must_use]
pub fn next_runnable_task(siblings: &[GenerationTask]) -> Option<&GenerationTask> {
    if siblings
        .iter()
        .any(|task| task.status() == GenerationStatus::Processing)
    {
        return None;
    }
    siblings
        .iter()
        .filter(|task| task.status() == GenerationStatus::Pending)
        .min_by_key(|task| task.batch_index())
}

/// Picks the task to re-queue when a batch may have stalled.
///
/// A batch stalls when an invocation dies between claiming a task and
/// recording its outcome, or when chaining the next task fails. Processing
/// tasks last touched before `stalled_before` are handed back for another
/// run; a batch whose processing task is younger is left alone. Without a
/// processing task this behaves like [`next_runnable_task`].
#[must_use]
pub fn recoverable_task(
    siblings: &[GenerationTask],
    stalled_before: DateTime<Utc>,
) -> Option<&GenerationTask> {
    let processing: Vec<&GenerationTask> = siblings
        .iter()
        .filter(|task| task.status() == GenerationStatus::Processing)
        .collect();
    if processing.is_empty() {
        return next_runnable_task(siblings);
    }
    if processing
        .iter()
        .any(|task| task.updated_at() >= stalled_before)
    {
        return None;
    }
    processing.into_iter().min_by_key(|task| task.batch_index())
}

/// Returns the instant before which an untouched, unfinished task counts as
/// stalled.
#[must_use]
pub fn stalled_cutoff(now: DateTime<Utc>, stale_after: std::time::Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(stale_after)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
