//! In-memory result record repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::generation::{
    domain::{GenerationTask, ResultId, ResultRecord},
    ports::{ResultRepository, ResultRepositoryError, ResultRepositoryResult},
};

/// Thread-safe in-memory result repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResultRepository {
    records: Arc<RwLock<HashMap<ResultId, ResultRecord>>>,
}

impl InMemoryResultRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored record ordered by creation time.
    ///
    /// # Errors
    ///
    /// Returns a persistence error when lock acquisition fails.
    pub fn snapshot(&self) -> ResultRepositoryResult<Vec<ResultRecord>> {
        let records = self.records.read().map_err(lock_error)?;
        let mut all: Vec<ResultRecord> = records.values().cloned().collect();
        all.sort_by_key(ResultRecord::created_at);
        Ok(all)
    }
}

fn lock_error(err: impl ToString) -> ResultRepositoryError {
    ResultRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl ResultRepository for InMemoryResultRepository {
    async fn store(&self, record: &ResultRecord) -> ResultRepositoryResult<()> {
        self.store_many(std::slice::from_ref(record)).await
    }

    async fn store_many(&self, records: &[ResultRecord]) -> ResultRepositoryResult<()> {
        let mut stored = self.records.write().map_err(lock_error)?;
        for (position, record) in records.iter().enumerate() {
            let repeated = records
                .iter()
                .take(position)
                .any(|earlier| earlier.id() == record.id());
            if repeated || stored.contains_key(&record.id()) {
                return Err(ResultRepositoryError::DuplicateResult(record.id()));
            }
        }
        for record in records {
            stored.insert(record.id(), record.clone());
        }
        Ok(())
    }

    async fn update(&self, record: &ResultRecord) -> ResultRepositoryResult<()> {
        let mut stored = self.records.write().map_err(lock_error)?;
        let slot = stored
            .get_mut(&record.id())
            .ok_or(ResultRepositoryError::NotFound(record.id()))?;
        *slot = record.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: ResultId) -> ResultRepositoryResult<Option<ResultRecord>> {
        let stored = self.records.read().map_err(lock_error)?;
        Ok(stored.get(&id).cloned())
    }

    async fn find_linked_to(
        &self,
        task: &GenerationTask,
    ) -> ResultRepositoryResult<Vec<ResultRecord>> {
        let stored = self.records.read().map_err(lock_error)?;
        let mut linked: Vec<ResultRecord> = stored
            .values()
            .filter(|record| record.links_to(task))
            .cloned()
            .collect();
        linked.sort_by_key(ResultRecord::created_at);
        Ok(linked)
    }

    async fn find_legacy_only(&self) -> ResultRepositoryResult<Vec<ResultRecord>> {
        let stored = self.records.read().map_err(lock_error)?;
        let mut legacy: Vec<ResultRecord> = stored
            .values()
            .filter(|record| record.is_legacy_only())
            .cloned()
            .collect();
        legacy.sort_by_key(ResultRecord::created_at);
        Ok(legacy)
    }
}
