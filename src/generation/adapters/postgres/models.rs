//! Diesel row models for generation persistence.

use super::schema::{generation_queue, generation_tasks, photoshoots};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for generation tasks.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = generation_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GenerationTaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Batch identifier.
    pub batch_id: uuid::Uuid,
    /// Position within the batch.
    pub batch_index: i32,
    /// Batch size.
    pub total_in_batch: i32,
    /// Owning user.
    pub user_id: uuid::Uuid,
    /// Prompt text.
    pub prompt: String,
    /// Reference URLs JSON array.
    pub reference_urls: Value,
    /// Layout token.
    pub size: String,
    /// Quality token.
    pub quality: String,
    /// Status token.
    pub status: String,
    /// Generated image URL.
    pub result_image_url: Option<String>,
    /// Failure message.
    pub error_message: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for generation tasks.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = generation_tasks)]
pub struct NewGenerationTaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Batch identifier.
    pub batch_id: uuid::Uuid,
    /// Position within the batch.
    pub batch_index: i32,
    /// Batch size.
    pub total_in_batch: i32,
    /// Owning user.
    pub user_id: uuid::Uuid,
    /// Prompt text.
    pub prompt: String,
    /// Reference URLs JSON array.
    pub reference_urls: Value,
    /// Layout token.
    pub size: String,
    /// Quality token.
    pub quality: String,
    /// Status token.
    pub status: String,
    /// Generated image URL.
    pub result_image_url: Option<String>,
    /// Failure message.
    pub error_message: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for result records.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = photoshoots)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ResultRow {
    /// Record identifier.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: uuid::Uuid,
    /// Owning user.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub user_id: uuid::Uuid,
    /// Canonical task link.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Uuid>)]
    pub task_id: Option<uuid::Uuid>,
    /// Legacy batch link.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Uuid>)]
    pub batch_id: Option<uuid::Uuid>,
    /// Legacy batch position.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Int4>)]
    pub batch_index: Option<i32>,
    /// Legacy variation group link.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Uuid>)]
    pub variation_group_id: Option<uuid::Uuid>,
    /// Legacy variation position.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Int4>)]
    pub variation_index: Option<i32>,
    /// Prompt text.
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub prompt: String,
    /// Reference URLs JSON array.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub reference_urls: Value,
    /// Status token.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub status: String,
    /// Mirrored result URL.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub result_image_url: Option<String>,
    /// Mirrored failure message.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub error_message: Option<String>,
    /// Creation timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub updated_at: DateTime<Utc>,
}

/// Insert and update model for result records.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = photoshoots)]
#[diesel(treat_none_as_null = true)]
pub struct ResultRowData {
    /// Record identifier.
    pub id: uuid::Uuid,
    /// Owning user.
    pub user_id: uuid::Uuid,
    /// Canonical task link.
    pub task_id: Option<uuid::Uuid>,
    /// Legacy batch link.
    pub batch_id: Option<uuid::Uuid>,
    /// Legacy batch position.
    pub batch_index: Option<i32>,
    /// Legacy variation group link.
    pub variation_group_id: Option<uuid::Uuid>,
    /// Legacy variation position.
    pub variation_index: Option<i32>,
    /// Prompt text.
    pub prompt: String,
    /// Reference URLs JSON array.
    pub reference_urls: Value,
    /// Status token.
    pub status: String,
    /// Mirrored result URL.
    pub result_image_url: Option<String>,
    /// Mirrored failure message.
    pub error_message: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for queue entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = generation_queue)]
pub struct NewQueueEntryRow {
    /// Queued task.
    pub task_id: uuid::Uuid,
    /// Enqueue timestamp.
    pub enqueued_at: DateTime<Utc>,
}

/// Task identifier returned when a queue entry is claimed.
#[derive(Debug, Clone, QueryableByName)]
pub struct ClaimedQueueEntryRow {
    /// Claimed task.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub task_id: uuid::Uuid,
}
