//! Aggregate progress of a batch.

use super::{BatchId, GenerationStatus, GenerationTask};
use serde::{Deserialize, Serialize};

/// Per-status task counts for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// Batch the counts belong to.
    pub batch_id: BatchId,
    /// Number of tasks in the batch.
    pub total: u32,
    /// Tasks that produced an image.
    pub completed: u32,
    /// Tasks that ended in failure.
    pub failed: u32,
    /// Tasks waiting to run.
    pub pending: u32,
    /// Tasks currently running.
    pub processing: u32,
}

impl BatchProgress {
    /// Counts the statuses of `tasks`, all of which belong to `batch_id`.
    #[must_use]
    pub fn from_tasks(batch_id: BatchId, tasks: &[GenerationTask]) -> Self {
        let mut progress = Self {
            batch_id,
            total: 0,
            completed: 0,
            failed: 0,
            pending: 0,
            processing: 0,
        };
        for task in tasks {
            progress.total = progress.total.saturating_add(1);
            let bucket = match task.status() {
                GenerationStatus::Pending => &mut progress.pending,
                GenerationStatus::Processing => &mut progress.processing,
                GenerationStatus::Completed => &mut progress.completed,
                GenerationStatus::Failed => &mut progress.failed,
            };
            *bucket = bucket.saturating_add(1);
        }
        progress
    }

    /// Returns the number of tasks in a terminal state.
    #[must_use]
    pub const fn finished(&self) -> u32 {
        self.completed.saturating_add(self.failed)
    }

    /// Returns the share of terminal tasks as a whole percentage.
    #[must_use]
    pub fn percent(&self) -> u32 {
        let scaled = u64::from(self.finished()).saturating_mul(100);
        let ratio = scaled.checked_div(u64::from(self.total)).unwrap_or(0);
        u32::try_from(ratio).unwrap_or(100)
    }

    /// Returns `true` once every task is terminal.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.total > 0 && self.finished() == self.total
    }
}
