//! In-memory FIFO generation queue.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::generation::{
    domain::GenerationTaskId,
    ports::{GenerationQueue, GenerationQueueError, GenerationQueueResult},
};

/// Thread-safe in-memory FIFO queue with enqueue de-duplication.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGenerationQueue {
    entries: Arc<Mutex<VecDeque<GenerationTaskId>>>,
}

impl InMemoryGenerationQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the queued task identifiers in dequeue order.
    ///
    /// # Errors
    ///
    /// Returns a persistence error when lock acquisition fails.
    pub fn pending(&self) -> GenerationQueueResult<Vec<GenerationTaskId>> {
        let entries = self.entries.lock().map_err(lock_error)?;
        Ok(entries.iter().copied().collect())
    }
}

fn lock_error(err: impl ToString) -> GenerationQueueError {
    GenerationQueueError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl GenerationQueue for InMemoryGenerationQueue {
    async fn enqueue(&self, task_id: GenerationTaskId) -> GenerationQueueResult<()> {
        let mut entries = self.entries.lock().map_err(lock_error)?;
        if !entries.contains(&task_id) {
            entries.push_back(task_id);
        }
        Ok(())
    }

    async fn dequeue(&self) -> GenerationQueueResult<Option<GenerationTaskId>> {
        let mut entries = self.entries.lock().map_err(lock_error)?;
        Ok(entries.pop_front())
    }
}
