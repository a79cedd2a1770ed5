//! `PostgreSQL` repository for generation tasks.

use super::{
    GenerationPgPool,
    models::{GenerationTaskRow, NewGenerationTaskRow},
    schema::generation_tasks,
};
use crate::credit::domain::UserId;
use crate::generation::{
    domain::{
        BatchId, BatchIndex, GenerationStatus, GenerationTask, GenerationTaskId, ImageQuality,
        ImageSize, PersistedGenerationTaskData, Prompt,
    },
    ports::{
        GenerationTaskRepository, GenerationTaskRepositoryError, GenerationTaskRepositoryResult,
        ensure_update_allowed,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL`-backed generation task repository.
///
/// Updates lock the row with `SELECT … FOR UPDATE` and apply the same
/// transition check as the in-memory adapter inside the transaction, so two
/// workers racing to finish one task cannot both win.
#[derive(Debug, Clone)]
pub struct PostgresGenerationTaskRepository {
    pool: GenerationPgPool,
}

impl PostgresGenerationTaskRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: GenerationPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> GenerationTaskRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> GenerationTaskRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool
                .get()
                .map_err(GenerationTaskRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(GenerationTaskRepositoryError::persistence)?
    }
}

impl From<DieselError> for GenerationTaskRepositoryError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

#[async_trait]
impl GenerationTaskRepository for PostgresGenerationTaskRepository {
    async fn store_batch(&self, tasks: &[GenerationTask]) -> GenerationTaskRepositoryResult<()> {
        let rows = tasks
            .iter()
            .map(to_new_row)
            .collect::<GenerationTaskRepositoryResult<Vec<_>>>()?;
        let Some(first) = tasks.first() else {
            return Ok(());
        };
        let first_id = first.id();
        let first_position = (first.batch_id(), first.batch_index());

        self.run_blocking(move |connection| {
            connection.transaction::<_, GenerationTaskRepositoryError, _>(|tx| {
                let ids: Vec<uuid::Uuid> = rows.iter().map(|row| row.id).collect();
                let existing = generation_tasks::table
                    .filter(generation_tasks::id.eq_any(ids))
                    .select(generation_tasks::id)
                    .first::<uuid::Uuid>(tx)
                    .optional()?;
                if let Some(id) = existing {
                    return Err(GenerationTaskRepositoryError::DuplicateTask(
                        GenerationTaskId::from_uuid(id),
                    ));
                }

                diesel::insert_into(generation_tasks::table)
                    .values(&rows)
                    .execute(tx)
                    .map_err(|err| match err {
                        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                            if info.constraint_name() == Some(BATCH_POSITION_CONSTRAINT) =>
                        {
                            GenerationTaskRepositoryError::DuplicateBatchIndex {
                                batch_id: first_position.0,
                                batch_index: first_position.1,
                            }
                        }
                        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                            GenerationTaskRepositoryError::DuplicateTask(first_id)
                        }
                        other => GenerationTaskRepositoryError::persistence(other),
                    })?;
                Ok(())
            })
        })
        .await
    }

    async fn update(
        &self,
        task: &GenerationTask,
    ) -> GenerationTaskRepositoryResult<GenerationTask> {
        let incoming = task.clone();
        self.run_blocking(move |connection| {
            connection.transaction::<_, GenerationTaskRepositoryError, _>(|tx| {
                let row = generation_tasks::table
                    .filter(generation_tasks::id.eq(incoming.id().into_inner()))
                    .select(GenerationTaskRow::as_select())
                    .for_update()
                    .first::<GenerationTaskRow>(tx)
                    .optional()?
                    .ok_or(GenerationTaskRepositoryError::NotFound(incoming.id()))?;
                let stored = row_to_task(row)?;
                ensure_update_allowed(&stored, &incoming)?;

                diesel::update(
                    generation_tasks::table
                        .filter(generation_tasks::id.eq(incoming.id().into_inner())),
                )
                .set((
                    generation_tasks::status.eq(incoming.status().as_str()),
                    generation_tasks::result_image_url.eq(incoming.result_image_url()),
                    generation_tasks::error_message.eq(incoming.error_message()),
                    generation_tasks::updated_at.eq(incoming.updated_at()),
                ))
                .execute(tx)?;
                Ok(stored)
            })
        })
        .await
    }

    async fn find_by_id(
        &self,
        id: GenerationTaskId,
    ) -> GenerationTaskRepositoryResult<Option<GenerationTask>> {
        self.run_blocking(move |connection| {
            let row = generation_tasks::table
                .filter(generation_tasks::id.eq(id.into_inner()))
                .select(GenerationTaskRow::as_select())
                .first::<GenerationTaskRow>(connection)
                .optional()?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn find_by_batch(
        &self,
        batch_id: BatchId,
    ) -> GenerationTaskRepositoryResult<Vec<GenerationTask>> {
        self.run_blocking(move |connection| {
            generation_tasks::table
                .filter(generation_tasks::batch_id.eq(batch_id.into_inner()))
                .order(generation_tasks::batch_index.asc())
                .select(GenerationTaskRow::as_select())
                .load::<GenerationTaskRow>(connection)?
                .into_iter()
                .map(row_to_task)
                .collect()
        })
        .await
    }

    async fn find_by_batch_index(
        &self,
        batch_id: BatchId,
        batch_index: BatchIndex,
    ) -> GenerationTaskRepositoryResult<Option<GenerationTask>> {
        let index = to_column_index(batch_index)?;
        self.run_blocking(move |connection| {
            let row = generation_tasks::table
                .filter(generation_tasks::batch_id.eq(batch_id.into_inner()))
                .filter(generation_tasks::batch_index.eq(index))
                .select(GenerationTaskRow::as_select())
                .first::<GenerationTaskRow>(connection)
                .optional()?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn find_stalled(
        &self,
        cutoff: DateTime<Utc>,
    ) -> GenerationTaskRepositoryResult<Vec<GenerationTask>> {
        self.run_blocking(move |connection| {
            generation_tasks::table
                .filter(generation_tasks::status.eq_any([
                    GenerationStatus::Pending.as_str(),
                    GenerationStatus::Processing.as_str(),
                ]))
                .filter(generation_tasks::updated_at.lt(cutoff))
                .order(generation_tasks::updated_at.asc())
                .select(GenerationTaskRow::as_select())
                .load::<GenerationTaskRow>(connection)?
                .into_iter()
                .map(row_to_task)
                .collect()
        })
        .await
    }
}

const BATCH_POSITION_CONSTRAINT: &str = "generation_tasks_batch_position_key";

fn to_column_index(index: BatchIndex) -> GenerationTaskRepositoryResult<i32> {
    i32::try_from(index.value()).map_err(GenerationTaskRepositoryError::persistence)
}

fn to_new_row(task: &GenerationTask) -> GenerationTaskRepositoryResult<NewGenerationTaskRow> {
    let reference_urls = serde_json::to_value(task.reference_urls())
        .map_err(GenerationTaskRepositoryError::persistence)?;
    Ok(NewGenerationTaskRow {
        id: task.id().into_inner(),
        batch_id: task.batch_id().into_inner(),
        batch_index: to_column_index(task.batch_index())?,
        total_in_batch: i32::try_from(task.total_in_batch())
            .map_err(GenerationTaskRepositoryError::persistence)?,
        user_id: task.user_id().into_inner(),
        prompt: task.prompt().as_str().to_owned(),
        reference_urls,
        size: task.size().as_str().to_owned(),
        quality: task.quality().as_str().to_owned(),
        status: task.status().as_str().to_owned(),
        result_image_url: task.result_image_url().map(str::to_owned),
        error_message: task.error_message().map(str::to_owned),
        created_at: task.created_at(),
        updated_at: task.updated_at(),
    })
}

fn row_to_task(row: GenerationTaskRow) -> GenerationTaskRepositoryResult<GenerationTask> {
    let batch_index = u32::try_from(row.batch_index)
        .map_err(GenerationTaskRepositoryError::persistence)
        .and_then(|value| {
            BatchIndex::new(value).map_err(GenerationTaskRepositoryError::persistence)
        })?;
    let total_in_batch =
        u32::try_from(row.total_in_batch).map_err(GenerationTaskRepositoryError::persistence)?;
    let reference_urls = serde_json::from_value::<Vec<String>>(row.reference_urls)
        .map_err(GenerationTaskRepositoryError::persistence)?;
    let prompt = Prompt::new(row.prompt).map_err(GenerationTaskRepositoryError::persistence)?;
    let size = ImageSize::try_from(row.size.as_str())
        .map_err(GenerationTaskRepositoryError::persistence)?;
    let quality = ImageQuality::try_from(row.quality.as_str())
        .map_err(GenerationTaskRepositoryError::persistence)?;
    let status = GenerationStatus::try_from(row.status.as_str())
        .map_err(GenerationTaskRepositoryError::persistence)?;

    Ok(GenerationTask::from_persisted(PersistedGenerationTaskData {
        id: GenerationTaskId::from_uuid(row.id),
        batch_id: BatchId::from_uuid(row.batch_id),
        batch_index,
        total_in_batch,
        user_id: UserId::from_uuid(row.user_id),
        prompt,
        reference_urls,
        size,
        quality,
        status,
        result_image_url: row.result_image_url,
        error_message: row.error_message,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}
