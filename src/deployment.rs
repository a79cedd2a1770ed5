//! Production wiring: `PostgreSQL` persistence, the OpenAI generator and
//! object storage, assembled from a [`GenerationConfig`].

use crate::config::GenerationConfig;
use crate::credit::adapters::postgres::PostgresCreditLedger;
use crate::generation::{
    adapters::{
        openai::OpenAiImageGenerator,
        postgres::{
            GenerationPgPool, PostgresGenerationQueue, PostgresGenerationTaskRepository,
            PostgresResultRepository,
        },
        storage::HttpAssetStore,
    },
    ports::{AssetStoreError, ImageGeneratorError},
    services::{
        BatchOrchestrator, BatchPoller, BatchProgressService, GenerationWorker, ResultReconciler,
        TaskProcessor,
    },
};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PoolError};
use mockable::DefaultClock;
use std::sync::Arc;
use thiserror::Error;

/// Batch orchestrator over the production adapters.
pub type PostgresOrchestrator = BatchOrchestrator<
    PostgresGenerationTaskRepository,
    PostgresResultRepository,
    PostgresCreditLedger,
    HttpAssetStore,
    PostgresGenerationQueue,
    DefaultClock,
>;

/// Task processor over the production adapters.
pub type PostgresProcessor = TaskProcessor<
    PostgresGenerationTaskRepository,
    PostgresResultRepository,
    HttpAssetStore,
    OpenAiImageGenerator,
    PostgresGenerationQueue,
    DefaultClock,
>;

/// Queue worker over the production adapters.
pub type PostgresWorker = GenerationWorker<
    PostgresGenerationTaskRepository,
    PostgresResultRepository,
    HttpAssetStore,
    OpenAiImageGenerator,
    PostgresGenerationQueue,
    DefaultClock,
>;

/// Errors raised while assembling a deployment.
#[derive(Debug, Error)]
pub enum DeploymentError {
    /// The connection pool could not be built.
    #[error("failed to build database pool: {0}")]
    Pool(#[from] PoolError),
    /// The image generator client could not be built.
    #[error("failed to build image generator: {0}")]
    Generator(#[from] ImageGeneratorError),
    /// The storage client could not be built.
    #[error("failed to build asset store: {0}")]
    Storage(#[from] AssetStoreError),
}

/// Result type for deployment assembly.
pub type DeploymentResult<T> = Result<T, DeploymentError>;

/// Shared adapters plus the configuration every service is built from.
#[derive(Clone)]
pub struct PostgresDeployment {
    config: GenerationConfig,
    tasks: Arc<PostgresGenerationTaskRepository>,
    results: Arc<PostgresResultRepository>,
    ledger: Arc<PostgresCreditLedger>,
    queue: Arc<PostgresGenerationQueue>,
    assets: Arc<HttpAssetStore>,
    generator: Arc<OpenAiImageGenerator>,
    clock: Arc<DefaultClock>,
}

impl PostgresDeployment {
    /// Opens a connection pool sized by the configuration and builds the
    /// adapters over it.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError`] when the pool or an HTTP client cannot be
    /// built.
    pub fn connect(config: GenerationConfig) -> DeploymentResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
        let pool = Pool::builder()
            .max_size(config.db_pool_size)
            .build(manager)?;
        Self::with_pool(config, pool)
    }

    /// Builds the adapters over an existing pool.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError`] when an HTTP client cannot be built.
    pub fn with_pool(config: GenerationConfig, pool: GenerationPgPool) -> DeploymentResult<Self> {
        let generator = OpenAiImageGenerator::new(
            config
                .openai
                .clone()
                .with_request_timeout(config.generation_timeout),
        )?;
        let assets = HttpAssetStore::new(config.storage.clone())?;
        Ok(Self {
            tasks: Arc::new(PostgresGenerationTaskRepository::new(pool.clone())),
            results: Arc::new(PostgresResultRepository::new(pool.clone())),
            ledger: Arc::new(PostgresCreditLedger::new(
                pool.clone(),
                config.starting_credits,
            )),
            queue: Arc::new(PostgresGenerationQueue::new(pool)),
            assets: Arc::new(assets),
            generator: Arc::new(generator),
            clock: Arc::new(DefaultClock),
            config,
        })
    }

    /// Returns the configuration the deployment was built from.
    #[must_use]
    pub const fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Returns the credit ledger, which opens accounts with the configured
    /// starting balance.
    #[must_use]
    pub fn ledger(&self) -> Arc<PostgresCreditLedger> {
        Arc::clone(&self.ledger)
    }

    /// Builds an orchestrator enforcing the configured variant cap and
    /// stale age.
    #[must_use]
    pub fn orchestrator(&self) -> PostgresOrchestrator {
        BatchOrchestrator::new(
            Arc::clone(&self.tasks),
            Arc::clone(&self.results),
            Arc::clone(&self.ledger),
            Arc::clone(&self.assets),
            Arc::clone(&self.queue),
            Arc::clone(&self.clock),
        )
        .with_max_variants(self.config.max_variants)
        .with_stale_after(self.config.stale_after)
    }

    /// Builds a processor with the configured timeout, fallback image and
    /// stale age.
    #[must_use]
    pub fn processor(&self) -> PostgresProcessor {
        TaskProcessor::new(
            Arc::clone(&self.tasks),
            Arc::clone(&self.results),
            Arc::clone(&self.assets),
            Arc::clone(&self.generator),
            Arc::clone(&self.queue),
            Arc::clone(&self.clock),
        )
        .with_settings(self.config.processor_settings())
    }

    /// Builds a queue worker polling at the configured idle interval.
    #[must_use]
    pub fn worker(&self) -> PostgresWorker {
        GenerationWorker::new(self.processor(), Arc::clone(&self.queue))
            .with_idle_poll_interval(self.config.worker_idle)
    }

    /// Builds the result reconciler.
    #[must_use]
    pub fn reconciler(
        &self,
    ) -> ResultReconciler<PostgresGenerationTaskRepository, PostgresResultRepository, DefaultClock>
    {
        ResultReconciler::new(
            Arc::clone(&self.tasks),
            Arc::clone(&self.results),
            Arc::clone(&self.clock),
        )
    }

    /// Builds a progress poller using the configured interval and timeout.
    #[must_use]
    pub fn poller(&self) -> BatchPoller<PostgresGenerationTaskRepository> {
        BatchPoller::new(BatchProgressService::new(Arc::clone(&self.tasks)))
            .with_interval(self.config.poll_interval)
            .with_timeout(self.config.poll_timeout)
    }
}
