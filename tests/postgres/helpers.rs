//! Shared helpers for `PostgreSQL` integration tests.
//!
//! Each test gets its own database created on the server named by
//! `PHOTOSHOOT_TEST_DATABASE_URL` and dropped again when the guard goes out
//! of scope.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use mockable::DefaultClock;
use photoshoot::credit::domain::UserId;
use photoshoot::generation::{
    adapters::postgres::GenerationPgPool,
    domain::{
        BatchId, BatchSpec, GenerationTask, ImageQuality, ImageSize, Prompt, VariantCount,
    },
};
use uuid::Uuid;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Environment variable holding an administrative connection URL.
pub const TEST_DATABASE_URL_ENV: &str = "PHOTOSHOOT_TEST_DATABASE_URL";

/// SQL creating the generation tables.
pub const CREATE_TABLES_SQL: &str =
    include_str!("../../migrations/2026-10-01-000000_create_generation_tables/up.sql");

/// SQL installing the photoshoot sync trigger.
pub const SYNC_TRIGGER_SQL: &str =
    include_str!("../../migrations/2026-10-01-000001_add_photoshoot_sync_trigger/up.sql");

/// Prompt used across `PostgreSQL` tests.
pub const PROMPT: &str = "red sneaker on white background";

/// Migrated database that is dropped with the guard.
pub struct TemporaryDatabase {
    admin_url: String,
    name: String,
    url: String,
}

impl TemporaryDatabase {
    /// Creates and migrates a uniquely named database.
    ///
    /// # Errors
    ///
    /// Returns an error when the server URL is missing or any statement fails.
    pub async fn create() -> Result<Self, BoxError> {
        let admin_url = std::env::var(TEST_DATABASE_URL_ENV)
            .map_err(|_| format!("{TEST_DATABASE_URL_ENV} is not set"))?;
        let name = format!("photoshoot_test_{}", Uuid::new_v4().simple());
        let url = database_url(&admin_url, &name)?;
        let database = Self {
            admin_url,
            name,
            url,
        };
        let admin_url = database.admin_url.clone();
        let name = database.name.clone();
        let url = database.url.clone();
        tokio::task::spawn_blocking(move || {
            execute_admin_sql(
                &admin_url,
                &format!("CREATE DATABASE {}", quote_identifier(&name)),
            )?;
            apply_migrations(&url)
        })
        .await??;
        Ok(database)
    }

    /// Returns the connection URL of the temporary database.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Builds a connection pool over the temporary database.
    ///
    /// # Errors
    ///
    /// Returns an error when the pool cannot be built.
    pub fn pool(&self, max_size: u32) -> Result<GenerationPgPool, BoxError> {
        let manager = ConnectionManager::<PgConnection>::new(self.url.clone());
        Ok(Pool::builder().max_size(max_size).build(manager)?)
    }
}

impl Drop for TemporaryDatabase {
    fn drop(&mut self) {
        let sql = format!(
            "DROP DATABASE IF EXISTS {} WITH (FORCE)",
            quote_identifier(&self.name)
        );
        drop(execute_admin_sql(&self.admin_url, &sql));
    }
}

/// Builds a pending batch owned by `user_id`.
///
/// # Errors
///
/// Returns an error when the prompt or variant count is rejected.
pub fn pending_batch(user_id: UserId, variants: u32) -> Result<Vec<GenerationTask>, BoxError> {
    let spec = BatchSpec {
        batch_id: BatchId::new(),
        user_id,
        prompt: Prompt::new(PROMPT)?,
        reference_urls: Vec::new(),
        size: ImageSize::Square,
        quality: ImageQuality::Auto,
        variants: VariantCount::new(variants, 5)?,
    };
    Ok(GenerationTask::pending_batch(&spec, &DefaultClock))
}

fn apply_migrations(url: &str) -> Result<(), BoxError> {
    let mut conn = PgConnection::establish(url)?;
    conn.batch_execute(CREATE_TABLES_SQL)?;
    conn.batch_execute(SYNC_TRIGGER_SQL)?;
    Ok(())
}

fn execute_admin_sql(admin_url: &str, sql: &str) -> Result<(), BoxError> {
    let mut conn = PgConnection::establish(admin_url)?;
    diesel::sql_query(sql).execute(&mut conn)?;
    Ok(())
}

fn database_url(admin_url: &str, database: &str) -> Result<String, BoxError> {
    let (base, query) = admin_url
        .split_once('?')
        .map_or((admin_url, None), |(base, query)| (base, Some(query)));
    let (server, _) = base
        .rsplit_once('/')
        .ok_or_else(|| format!("{TEST_DATABASE_URL_ENV} must name a database"))?;
    Ok(query.map_or_else(
        || format!("{server}/{database}"),
        |query| format!("{server}/{database}?{query}"),
    ))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
