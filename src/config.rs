//! Environment-driven configuration for the generation worker and the
//! services built by [`crate::deployment`].
//!
//! | Variable                  | Required | Default                     |
//! |---------------------------|----------|-----------------------------|
//! | `DATABASE_URL`            | yes      | --                          |
//! | `OPENAI_API_KEY`          | yes      | --                          |
//! | `OPENAI_API_BASE`         | no       | `https://api.openai.com/v1` |
//! | `OPENAI_IMAGE_MODEL`      | no       | `gpt-image-1`               |
//! | `STORAGE_URL`             | yes      | --                          |
//! | `STORAGE_BUCKET`          | no       | `photoshoots`               |
//! | `STORAGE_SERVICE_KEY`     | yes      | --                          |
//! | `MAX_VARIANTS`            | no       | `5`                         |
//! | `STARTING_CREDITS`        | no       | `10`                        |
//! | `GENERATION_TIMEOUT_SECS` | no       | `240`                       |
//! | `STALE_AFTER_SECS`        | no       | `600`                       |
//! | `FALLBACK_IMAGE_URL`      | no       | --                          |
//! | `POLL_INTERVAL_SECS`      | no       | `3`                         |
//! | `POLL_TIMEOUT_SECS`       | no       | `600`                       |
//! | `WORKER_IDLE_MS`          | no       | `1000`                      |
//! | `DB_POOL_SIZE`            | no       | `8`                         |

use crate::credit::domain::DEFAULT_STARTING_CREDITS;
use crate::generation::{
    adapters::{
        openai::{DEFAULT_OPENAI_API_BASE, DEFAULT_OPENAI_IMAGE_MODEL, OpenAiSettings},
        storage::{DEFAULT_STORAGE_BUCKET, StorageSettings},
    },
    domain::DEFAULT_MAX_VARIANTS,
    services::{
        DEFAULT_GENERATION_TIMEOUT, DEFAULT_IDLE_POLL_INTERVAL, DEFAULT_POLL_INTERVAL,
        DEFAULT_POLL_TIMEOUT, DEFAULT_STALE_AFTER, ProcessorSettings,
    },
};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors raised while reading configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable holds an unparseable value.
    #[error("invalid value '{value}' for environment variable {name}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Rejected value.
        value: String,
    },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Complete worker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Connection pool size.
    pub db_pool_size: u32,
    /// OpenAI connection settings.
    pub openai: OpenAiSettings,
    /// Object storage settings.
    pub storage: StorageSettings,
    /// Largest accepted variant count.
    pub max_variants: u8,
    /// Balance given to new credit accounts.
    pub starting_credits: u32,
    /// Budget for one generator call.
    pub generation_timeout: Duration,
    /// Age after which an unfinished task is re-queued.
    pub stale_after: Duration,
    /// Placeholder image reported when a task fails.
    pub fallback_image_url: Option<String>,
    /// Pause between client progress polls.
    pub poll_interval: Duration,
    /// Time after which client polling stops.
    pub poll_timeout: Duration,
    /// Pause between polls of an empty work queue.
    pub worker_idle: Duration,
}

impl GenerationConfig {
    /// Loads `.env` when present, then reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_env() -> ConfigResult<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded environment file"),
            Err(err) => debug!(error = %err, "no environment file loaded"),
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Lookup(lookup);

        let openai = OpenAiSettings::new(vars.required("OPENAI_API_KEY")?)
            .with_api_base(vars.or_default("OPENAI_API_BASE", DEFAULT_OPENAI_API_BASE))
            .with_model(vars.or_default("OPENAI_IMAGE_MODEL", DEFAULT_OPENAI_IMAGE_MODEL));
        let storage = StorageSettings::new(
            vars.required("STORAGE_URL")?,
            vars.required("STORAGE_SERVICE_KEY")?,
        )
        .with_bucket(vars.or_default("STORAGE_BUCKET", DEFAULT_STORAGE_BUCKET));

        Ok(Self {
            database_url: vars.required("DATABASE_URL")?,
            db_pool_size: vars.parsed("DB_POOL_SIZE", 8)?,
            openai,
            storage,
            max_variants: vars.parsed("MAX_VARIANTS", DEFAULT_MAX_VARIANTS)?,
            starting_credits: vars.parsed("STARTING_CREDITS", DEFAULT_STARTING_CREDITS)?,
            generation_timeout: Duration::from_secs(
                vars.parsed("GENERATION_TIMEOUT_SECS", DEFAULT_GENERATION_TIMEOUT.as_secs())?,
            ),
            stale_after: Duration::from_secs(
                vars.parsed("STALE_AFTER_SECS", DEFAULT_STALE_AFTER.as_secs())?,
            ),
            fallback_image_url: vars.optional("FALLBACK_IMAGE_URL"),
            poll_interval: Duration::from_secs(
                vars.parsed("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL.as_secs())?,
            ),
            poll_timeout: Duration::from_secs(
                vars.parsed("POLL_TIMEOUT_SECS", DEFAULT_POLL_TIMEOUT.as_secs())?,
            ),
            worker_idle: Duration::from_millis(vars.parsed(
                "WORKER_IDLE_MS",
                u64::try_from(DEFAULT_IDLE_POLL_INTERVAL.as_millis()).unwrap_or(1000),
            )?),
        })
    }
}

impl GenerationConfig {
    /// Returns the task processor settings described by this
    /// configuration, with the default retry policy.
    #[must_use]
    pub fn processor_settings(&self) -> ProcessorSettings {
        ProcessorSettings {
            generation_timeout: self.generation_timeout,
            fallback_image_url: self.fallback_image_url.clone(),
            stale_after: self.stale_after,
            ..ProcessorSettings::default()
        }
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, name: &'static str) -> ConfigResult<String> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn or_default(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_owned())
    }

    fn parsed<T: FromStr>(&self, name: &'static str, default: T) -> ConfigResult<T> {
        self.optional(name).map_or(Ok(default), |value| {
            value
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value })
        })
    }
}
