//! In-memory generation task repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::generation::{
    domain::{BatchId, BatchIndex, GenerationTask, GenerationTaskId},
    ports::{
        GenerationTaskRepository, GenerationTaskRepositoryError, GenerationTaskRepositoryResult,
        ensure_update_allowed,
    },
};

/// Thread-safe in-memory generation task repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGenerationTaskRepository {
    state: Arc<RwLock<InMemoryTaskState>>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    tasks: HashMap<GenerationTaskId, GenerationTask>,
    batch_index: HashMap<(BatchId, BatchIndex), GenerationTaskId>,
}

impl InMemoryGenerationTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(err: impl ToString) -> GenerationTaskRepositoryError {
    GenerationTaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl GenerationTaskRepository for InMemoryGenerationTaskRepository {
    async fn store_batch(&self, tasks: &[GenerationTask]) -> GenerationTaskRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;

        let mut seen_ids = Vec::with_capacity(tasks.len());
        let mut seen_positions = Vec::with_capacity(tasks.len());
        for task in tasks {
            if state.tasks.contains_key(&task.id()) || seen_ids.contains(&task.id()) {
                return Err(GenerationTaskRepositoryError::DuplicateTask(task.id()));
            }
            let position = (task.batch_id(), task.batch_index());
            if state.batch_index.contains_key(&position) || seen_positions.contains(&position) {
                return Err(GenerationTaskRepositoryError::DuplicateBatchIndex {
                    batch_id: task.batch_id(),
                    batch_index: task.batch_index(),
                });
            }
            seen_ids.push(task.id());
            seen_positions.push(position);
        }

        for task in tasks {
            state
                .batch_index
                .insert((task.batch_id(), task.batch_index()), task.id());
            state.tasks.insert(task.id(), task.clone());
        }
        Ok(())
    }

    async fn update(
        &self,
        task: &GenerationTask,
    ) -> GenerationTaskRepositoryResult<GenerationTask> {
        let mut state = self.state.write().map_err(lock_error)?;
        let stored = state
            .tasks
            .get(&task.id())
            .ok_or(GenerationTaskRepositoryError::NotFound(task.id()))?
            .clone();
        ensure_update_allowed(&stored, task)?;
        state.tasks.insert(task.id(), task.clone());
        Ok(stored)
    }

    async fn find_by_id(
        &self,
        id: GenerationTaskId,
    ) -> GenerationTaskRepositoryResult<Option<GenerationTask>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn find_by_batch(
        &self,
        batch_id: BatchId,
    ) -> GenerationTaskRepositoryResult<Vec<GenerationTask>> {
        let state = self.state.read().map_err(lock_error)?;
        let mut tasks: Vec<GenerationTask> = state
            .tasks
            .values()
            .filter(|task| task.batch_id() == batch_id)
            .cloned()
            .collect();
        tasks.sort_by_key(GenerationTask::batch_index);
        Ok(tasks)
    }

    async fn find_by_batch_index(
        &self,
        batch_id: BatchId,
        batch_index: BatchIndex,
    ) -> GenerationTaskRepositoryResult<Option<GenerationTask>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .batch_index
            .get(&(batch_id, batch_index))
            .and_then(|task_id| state.tasks.get(task_id))
            .cloned())
    }

    async fn find_stalled(
        &self,
        cutoff: DateTime<Utc>,
    ) -> GenerationTaskRepositoryResult<Vec<GenerationTask>> {
        let state = self.state.read().map_err(lock_error)?;
        let mut tasks: Vec<GenerationTask> = state
            .tasks
            .values()
            .filter(|task| !task.status().is_terminal() && task.updated_at() < cutoff)
            .cloned()
            .collect();
        tasks.sort_by_key(GenerationTask::updated_at);
        Ok(tasks)
    }
}
