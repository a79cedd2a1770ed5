//! User-facing result records mirrored from generation tasks.

use super::{
    BatchId, BatchIndex, GenerationStatus, GenerationTask, GenerationTaskId, ResultId,
    VariationGroupId,
};
use crate::credit::domain::UserId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Link carried by result rows written before the canonical task reference
/// existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LegacyLink {
    /// Positional link through batch identifier and index.
    Batch {
        /// Batch the task belongs to.
        batch_id: BatchId,
        /// Position of the task within the batch.
        batch_index: BatchIndex,
    },
    /// Positional link through a variation group, which shares the batch UUID.
    VariationGroup {
        /// Variation group identifier.
        group_id: VariationGroupId,
        /// Position of the variation within the group.
        variation_index: BatchIndex,
    },
}

impl LegacyLink {
    /// Returns `true` when the link points at `task`.
    #[must_use]
    pub fn matches(&self, task: &GenerationTask) -> bool {
        match *self {
            Self::Batch {
                batch_id,
                batch_index,
            } => batch_id == task.batch_id() && batch_index == task.batch_index(),
            Self::VariationGroup {
                group_id,
                variation_index,
            } => {
                BatchId::from(group_id) == task.batch_id()
                    && variation_index == task.batch_index()
            }
        }
    }

    /// Returns the batch identifier the link resolves to.
    #[must_use]
    pub fn batch_id(&self) -> BatchId {
        match *self {
            Self::Batch { batch_id, .. } => batch_id,
            Self::VariationGroup { group_id, .. } => BatchId::from(group_id),
        }
    }

    /// Returns the position the link resolves to.
    #[must_use]
    pub const fn batch_index(&self) -> BatchIndex {
        match *self {
            Self::Batch { batch_index, .. } => batch_index,
            Self::VariationGroup {
                variation_index, ..
            } => variation_index,
        }
    }
}

/// User-facing generation result ("photoshoot").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    id: ResultId,
    user_id: UserId,
    task_id: Option<GenerationTaskId>,
    legacy_links: Vec<LegacyLink>,
    prompt: String,
    reference_urls: Vec<String>,
    status: GenerationStatus,
    result_image_url: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted result record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedResultData {
    /// Persisted record identifier.
    pub id: ResultId,
    /// Persisted owner.
    pub user_id: UserId,
    /// Canonical task link, when present.
    pub task_id: Option<GenerationTaskId>,
    /// Legacy positional links; a row may carry both schemes at once.
    pub legacy_links: Vec<LegacyLink>,
    /// Persisted prompt text.
    pub prompt: String,
    /// Persisted reference image URLs.
    pub reference_urls: Vec<String>,
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

impl ResultRecord {
    /// Creates a record canonically linked to `task` and carrying its
    /// current state.
    #[must_use]
    pub fn for_task(task: &GenerationTask, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: ResultId::new(),
            user_id: task.user_id(),
            task_id: Some(task.id()),
            legacy_links: Vec::new(),
            prompt: task.prompt().as_str().to_owned(),
            reference_urls: task.reference_urls().to_vec(),
            status: task.status(),
            result_image_url: task.result_image_url().map(str::to_owned),
            error_message: task.error_message().map(str::to_owned),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a record from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedResultData) -> Self {
        Self {
            id: data.id,
            user_id: data.user_id,
            task_id: data.task_id,
            legacy_links: data.legacy_links,
            prompt: data.prompt,
            reference_urls: data.reference_urls,
            status: data.status,
            result_image_url: data.result_image_url,
            error_message: data.error_message,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the record identifier.
    #[must_use]
    pub const fn id(&self) -> ResultId {
        self.id
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the canonical task link.
    #[must_use]
    pub const fn task_id(&self) -> Option<GenerationTaskId> {
        self.task_id
    }

    /// Returns the legacy links in the order they were persisted.
    #[must_use]
    pub fn legacy_links(&self) -> &[LegacyLink] {
        &self.legacy_links
    }

    /// Returns the prompt text.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Returns the reference image URLs.
    #[must_use]
    pub fn reference_urls(&self) -> &[String] {
        &self.reference_urls
    }

    /// Returns the mirrored status.
    #[must_use]
    pub const fn status(&self) -> GenerationStatus {
        self.status
    }

    /// Returns the mirrored result URL.
    #[must_use]
    pub fn result_image_url(&self) -> Option<&str> {
        self.result_image_url.as_deref()
    }

    /// Returns the mirrored error message.
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

    /// Returns `true` when the record has a legacy link but no canonical one.
    #[must_use]
    pub fn is_legacy_only(&self) -> bool {
        self.task_id.is_none() && !self.legacy_links.is_empty()
    }

    /// Returns `true` when any link scheme points at `task`.
    #[must_use]
    pub fn links_to(&self, task: &GenerationTask) -> bool {
        if let Some(task_id) = self.task_id {
            return task_id == task.id();
        }
        self.legacy_links.iter().any(|link| link.matches(task))
    }

    /// Copies task state onto the record.
    ///
    /// The status is always copied. The result URL and error message are
    /// copied only when the task carries a value that differs from the
    /// record, so a populated field is never cleared. A missing canonical
    /// link is filled in. Returns `true` when anything changed; `updated_at`
    /// moves only in that case.
    pub fn mirror(&mut self, task: &GenerationTask, clock: &impl Clock) -> bool {
        let mut changed = false;

        if self.status != task.status() {
            self.status = task.status();
            changed = true;
        }
        changed |= copy_if_present(&mut self.result_image_url, task.result_image_url());
        changed |= copy_if_present(&mut self.error_message, task.error_message());
        if self.task_id.is_none() {
            self.task_id = Some(task.id());
            changed = true;
        }

        if changed {
            self.updated_at = clock.utc();
        }
        changed
    }
}

fn copy_if_present(field: &mut Option<String>, incoming: Option<&str>) -> bool {
    match incoming {
        Some(value) if field.as_deref() != Some(value) => {
            *field = Some(value.to_owned());
            true
        }
        _ => false,
    }
}
