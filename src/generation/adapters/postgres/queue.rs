//! `PostgreSQL` work queue shared by generation workers.

use super::{
    GenerationPgPool,
    models::{ClaimedQueueEntryRow, NewQueueEntryRow},
    schema::generation_queue,
};
use crate::generation::{
    domain::GenerationTaskId,
    ports::{GenerationQueue, GenerationQueueError, GenerationQueueResult},
};
use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;

/// `PostgreSQL`-backed generation queue.
///
/// Claims use `FOR UPDATE SKIP LOCKED`, so several workers can drain the
/// same table without handing one entry to two of them.
#[derive(Debug, Clone)]
pub struct PostgresGenerationQueue {
    pool: GenerationPgPool,
}

impl PostgresGenerationQueue {
    /// Creates a new queue from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: GenerationPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> GenerationQueueResult<T>
    where
        F: FnOnce(&mut PgConnection) -> GenerationQueueResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(GenerationQueueError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(GenerationQueueError::persistence)?
    }
}

#[async_trait]
impl GenerationQueue for PostgresGenerationQueue {
    async fn enqueue(&self, task_id: GenerationTaskId) -> GenerationQueueResult<()> {
        self.run_blocking(move |connection| {
            diesel::insert_into(generation_queue::table)
                .values(&NewQueueEntryRow {
                    task_id: task_id.into_inner(),
                    enqueued_at: Utc::now(),
                })
                .on_conflict(generation_queue::task_id)
                .do_nothing()
                .execute(connection)
                .map_err(GenerationQueueError::persistence)?;
            Ok(())
        })
        .await
    }

    async fn dequeue(&self) -> GenerationQueueResult<Option<GenerationTaskId>> {
        self.run_blocking(move |connection| {
            let claimed = diesel::sql_query(concat!(
                "DELETE FROM generation_queue WHERE id = (",
                "SELECT id FROM generation_queue ORDER BY id ",
                "FOR UPDATE SKIP LOCKED LIMIT 1) ",
                "RETURNING task_id",
            ))
            .get_result::<ClaimedQueueEntryRow>(connection)
            .optional()
            .map_err(GenerationQueueError::persistence)?;
            Ok(claimed.map(|row| GenerationTaskId::from_uuid(row.task_id)))
        })
        .await
    }
}
