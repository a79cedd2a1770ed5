//! Diesel schema for generation persistence.

diesel::table! {
    /// One row per requested image variant.
    generation_tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Batch the task belongs to.
        batch_id -> Uuid,
        /// Zero-based position within the batch.
        batch_index -> Int4,
        /// Number of tasks in the batch.
        total_in_batch -> Int4,
        /// Owning user.
        user_id -> Uuid,
        /// Prompt text.
        prompt -> Text,
        /// Reference image URLs as a JSON array.
        reference_urls -> Jsonb,
        /// Requested layout.
        #[max_length = 20]
        size -> Varchar,
        /// Requested quality.
        #[max_length = 20]
        quality -> Varchar,
        /// Lifecycle status.
        #[max_length = 20]
        status -> Varchar,
        /// Public URL of the generated image.
        result_image_url -> Nullable<Text>,
        /// Failure message.
        error_message -> Nullable<Text>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// User-facing result records.
    photoshoots (id) {
        /// Record identifier.
        id -> Uuid,
        /// Owning user.
        user_id -> Uuid,
        /// Canonical task link.
        task_id -> Nullable<Uuid>,
        /// Legacy batch link.
        batch_id -> Nullable<Uuid>,
        /// Legacy batch position.
        batch_index -> Nullable<Int4>,
        /// Legacy variation group link.
        variation_group_id -> Nullable<Uuid>,
        /// Legacy variation position.
        variation_index -> Nullable<Int4>,
        /// Prompt text.
        prompt -> Text,
        /// Reference image URLs as a JSON array.
        reference_urls -> Jsonb,
        /// Mirrored status.
        #[max_length = 20]
        status -> Varchar,
        /// Mirrored result URL.
        result_image_url -> Nullable<Text>,
        /// Mirrored failure message.
        error_message -> Nullable<Text>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Task identifiers waiting for a worker.
    generation_queue (id) {
        /// Insertion order.
        id -> Int8,
        /// Queued task.
        task_id -> Uuid,
        /// Enqueue timestamp.
        enqueued_at -> Timestamptz,
    }
}
