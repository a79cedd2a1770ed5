//! Shared wiring for in-memory photoshoot pipeline tests.

use std::sync::Arc;
use std::time::Duration;

use mockable::DefaultClock;
use photoshoot::credit::adapters::memory::InMemoryCreditLedger;
use photoshoot::generation::{
    adapters::{
        memory::{
            InMemoryAssetStore, InMemoryGenerationQueue, InMemoryGenerationTaskRepository,
            InMemoryImageGenerator, InMemoryResultRepository,
        },
        reconciling::ReconcilingTaskRepository,
    },
    services::{
        BatchOrchestrator, BatchProgressService, GenerationWorker, ProcessorSettings,
        RetryPolicy, TaskProcessor,
    },
};
use rstest::fixture;

/// Task repository that mirrors every write onto result records.
pub type SyncedTasks =
    ReconcilingTaskRepository<InMemoryGenerationTaskRepository, InMemoryResultRepository, DefaultClock>;

/// Orchestrator wired to in-memory adapters.
pub type TestOrchestrator = BatchOrchestrator<
    SyncedTasks,
    InMemoryResultRepository,
    InMemoryCreditLedger,
    InMemoryAssetStore,
    InMemoryGenerationQueue,
    DefaultClock,
>;

/// Worker wired to in-memory adapters.
pub type TestWorker = GenerationWorker<
    SyncedTasks,
    InMemoryResultRepository,
    InMemoryAssetStore,
    InMemoryImageGenerator,
    InMemoryGenerationQueue,
    DefaultClock,
>;

/// Prompt used across pipeline tests.
pub const PROMPT: &str = "red sneaker on white background";

/// Every adapter of one in-memory deployment.
#[derive(Clone)]
pub struct Pipeline {
    pub raw_tasks: Arc<InMemoryGenerationTaskRepository>,
    pub tasks: Arc<SyncedTasks>,
    pub results: Arc<InMemoryResultRepository>,
    pub ledger: Arc<InMemoryCreditLedger>,
    pub assets: Arc<InMemoryAssetStore>,
    pub generator: Arc<InMemoryImageGenerator>,
    pub queue: Arc<InMemoryGenerationQueue>,
    pub clock: Arc<DefaultClock>,
}

impl Pipeline {
    /// Creates a deployment whose users start with the default balance.
    #[must_use]
    pub fn new() -> Self {
        let raw_tasks = Arc::new(InMemoryGenerationTaskRepository::new());
        let results = Arc::new(InMemoryResultRepository::new());
        let clock = Arc::new(DefaultClock);
        let tasks = Arc::new(ReconcilingTaskRepository::new(
            Arc::clone(&raw_tasks),
            Arc::clone(&results),
            Arc::clone(&clock),
        ));
        Self {
            raw_tasks,
            tasks,
            results,
            ledger: Arc::new(InMemoryCreditLedger::default()),
            assets: Arc::new(InMemoryAssetStore::default()),
            generator: Arc::new(InMemoryImageGenerator::new()),
            queue: Arc::new(InMemoryGenerationQueue::new()),
            clock,
        }
    }

    /// Builds an orchestrator over the deployment.
    #[must_use]
    pub fn orchestrator(&self) -> TestOrchestrator {
        BatchOrchestrator::new(
            Arc::clone(&self.tasks),
            Arc::clone(&self.results),
            Arc::clone(&self.ledger),
            Arc::clone(&self.assets),
            Arc::clone(&self.queue),
            Arc::clone(&self.clock),
        )
        .with_retry_policy(RetryPolicy::no_retry())
    }

    /// Builds a worker with the given generation timeout.
    #[must_use]
    pub fn worker(&self, generation_timeout: Duration) -> TestWorker {
        let processor = TaskProcessor::new(
            Arc::clone(&self.tasks),
            Arc::clone(&self.results),
            Arc::clone(&self.assets),
            Arc::clone(&self.generator),
            Arc::clone(&self.queue),
            Arc::clone(&self.clock),
        )
        .with_settings(ProcessorSettings {
            generation_timeout,
            fallback_image_url: None,
            retry: RetryPolicy::no_retry(),
            ..ProcessorSettings::default()
        });
        GenerationWorker::new(processor, Arc::clone(&self.queue))
            .with_idle_poll_interval(Duration::from_millis(5))
    }

    /// Builds a progress service over the deployment.
    #[must_use]
    pub fn progress(&self) -> BatchProgressService<SyncedTasks> {
        BatchProgressService::new(Arc::clone(&self.tasks))
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Provides a fresh deployment for each test.
#[fixture]
pub fn pipeline() -> Pipeline {
    Pipeline::new()
}
