//! `PostgreSQL` repository for result records.

use super::{
    GenerationPgPool,
    models::{ResultRow, ResultRowData},
    schema::photoshoots,
};
use crate::credit::domain::UserId;
use crate::generation::{
    domain::{
        BatchId, BatchIndex, GenerationStatus, GenerationTask, GenerationTaskId, LegacyLink,
        PersistedResultData, ResultId, ResultRecord, VariationGroupId,
    },
    ports::{ResultRepository, ResultRepositoryError, ResultRepositoryResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::Error as DieselError;

/// `PostgreSQL`-backed result repository over the `photoshoots` table.
#[derive(Debug, Clone)]
pub struct PostgresResultRepository {
    pool: GenerationPgPool,
}

impl PostgresResultRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: GenerationPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> ResultRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> ResultRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(ResultRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(ResultRepositoryError::persistence)?
    }
}

impl From<DieselError> for ResultRepositoryError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

#[async_trait]
impl ResultRepository for PostgresResultRepository {
    async fn store(&self, record: &ResultRecord) -> ResultRepositoryResult<()> {
        self.store_many(std::slice::from_ref(record)).await
    }

    async fn store_many(&self, records: &[ResultRecord]) -> ResultRepositoryResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let rows = records
            .iter()
            .map(to_row_data)
            .collect::<ResultRepositoryResult<Vec<_>>>()?;
        self.run_blocking(move |connection| {
            connection.transaction::<_, ResultRepositoryError, _>(|tx| {
                let ids: Vec<uuid::Uuid> = rows.iter().map(|row| row.id).collect();
                let existing = photoshoots::table
                    .filter(photoshoots::id.eq_any(ids))
                    .select(photoshoots::id)
                    .first::<uuid::Uuid>(tx)
                    .optional()?;
                if let Some(id) = existing {
                    return Err(ResultRepositoryError::DuplicateResult(ResultId::from_uuid(
                        id,
                    )));
                }
                diesel::insert_into(photoshoots::table)
                    .values(&rows)
                    .execute(tx)?;
                Ok(())
            })
        })
        .await
    }

    async fn update(&self, record: &ResultRecord) -> ResultRepositoryResult<()> {
        let record_id = record.id();
        let row = to_row_data(record)?;
        self.run_blocking(move |connection| {
            let affected = diesel::update(photoshoots::table.find(row.id))
                .set(&row)
                .execute(connection)?;
            if affected == 0 {
                return Err(ResultRepositoryError::NotFound(record_id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: ResultId) -> ResultRepositoryResult<Option<ResultRecord>> {
        self.run_blocking(move |connection| {
            let row = photoshoots::table
                .find(id.into_inner())
                .select(ResultRow::as_select())
                .first::<ResultRow>(connection)
                .optional()?;
            row.map(row_to_record).transpose()
        })
        .await
    }

    async fn find_linked_to(
        &self,
        task: &GenerationTask,
    ) -> ResultRepositoryResult<Vec<ResultRecord>> {
        let task_id = task.id().into_inner();
        let batch_id = task.batch_id().into_inner();
        let batch_index =
            i32::try_from(task.batch_index().value()).map_err(ResultRepositoryError::persistence)?;
        self.run_blocking(move |connection| {
            diesel::sql_query(concat!(
                "SELECT id, user_id, task_id, batch_id, batch_index, variation_group_id, ",
                "variation_index, prompt, reference_urls, status, result_image_url, ",
                "error_message, created_at, updated_at FROM photoshoots ",
                "WHERE task_id = $1 ",
                "OR (task_id IS NULL AND (",
                "(batch_id = $2 AND batch_index = $3) ",
                "OR (variation_group_id = $2 AND variation_index = $3))) ",
                "ORDER BY created_at",
            ))
            .bind::<diesel::sql_types::Uuid, _>(task_id)
            .bind::<diesel::sql_types::Uuid, _>(batch_id)
            .bind::<diesel::sql_types::Int4, _>(batch_index)
            .load::<ResultRow>(connection)?
            .into_iter()
            .map(row_to_record)
            .collect()
        })
        .await
    }

    async fn find_legacy_only(&self) -> ResultRepositoryResult<Vec<ResultRecord>> {
        self.run_blocking(move |connection| {
            photoshoots::table
                .filter(photoshoots::task_id.is_null())
                .filter(
                    photoshoots::batch_id
                        .is_not_null()
                        .or(photoshoots::variation_group_id.is_not_null()),
                )
                .order(photoshoots::created_at.asc())
                .select(ResultRow::as_select())
                .load::<ResultRow>(connection)?
                .into_iter()
                .map(row_to_record)
                .collect()
        })
        .await
    }
}

fn to_row_data(record: &ResultRecord) -> ResultRepositoryResult<ResultRowData> {
    let reference_urls = serde_json::to_value(record.reference_urls())
        .map_err(ResultRepositoryError::persistence)?;
    let (mut batch_id, mut batch_index, mut group_id, mut variation_index) =
        (None, None, None, None);
    for link in record.legacy_links() {
        match *link {
            LegacyLink::Batch {
                batch_id: id,
                batch_index: index,
            } => {
                batch_id = Some(id.into_inner());
                batch_index = Some(to_column_index(index)?);
            }
            LegacyLink::VariationGroup {
                group_id: id,
                variation_index: index,
            } => {
                group_id = Some(id.into_inner());
                variation_index = Some(to_column_index(index)?);
            }
        }
    }
    Ok(ResultRowData {
        id: record.id().into_inner(),
        user_id: record.user_id().into_inner(),
        task_id: record.task_id().map(GenerationTaskId::into_inner),
        batch_id,
        batch_index,
        variation_group_id: group_id,
        variation_index,
        prompt: record.prompt().to_owned(),
        reference_urls,
        status: record.status().as_str().to_owned(),
        result_image_url: record.result_image_url().map(str::to_owned),
        error_message: record.error_message().map(str::to_owned),
        created_at: record.created_at(),
        updated_at: record.updated_at(),
    })
}

fn to_column_index(index: BatchIndex) -> ResultRepositoryResult<i32> {
    i32::try_from(index.value()).map_err(ResultRepositoryError::persistence)
}

fn from_column_index(value: i32) -> ResultRepositoryResult<BatchIndex> {
    let raw = u32::try_from(value).map_err(ResultRepositoryError::persistence)?;
    BatchIndex::new(raw).map_err(ResultRepositoryError::persistence)
}

fn row_to_record(row: ResultRow) -> ResultRepositoryResult<ResultRecord> {
    let mut legacy_links = Vec::with_capacity(2);
    if let (Some(batch_id), Some(index)) = (row.batch_id, row.batch_index) {
        legacy_links.push(LegacyLink::Batch {
            batch_id: BatchId::from_uuid(batch_id),
            batch_index: from_column_index(index)?,
        });
    }
    if let (Some(group_id), Some(index)) = (row.variation_group_id, row.variation_index) {
        legacy_links.push(LegacyLink::VariationGroup {
            group_id: VariationGroupId::from_uuid(group_id),
            variation_index: from_column_index(index)?,
        });
    }
    let reference_urls = serde_json::from_value::<Vec<String>>(row.reference_urls)
        .map_err(ResultRepositoryError::persistence)?;
    let status = GenerationStatus::try_from(row.status.as_str())
        .map_err(ResultRepositoryError::persistence)?;

    Ok(ResultRecord::from_persisted(PersistedResultData {
        id: ResultId::from_uuid(row.id),
        user_id: UserId::from_uuid(row.user_id),
        task_id: row.task_id.map(GenerationTaskId::from_uuid),
        legacy_links,
        prompt: row.prompt,
        reference_urls,
        status,
        result_image_url: row.result_image_url,
        error_message: row.error_message,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}
