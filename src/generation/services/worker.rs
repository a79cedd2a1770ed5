//! Queue-driven loop around [`TaskProcessor`].

use super::{ProcessReport, TaskProcessor};
use crate::generation::ports::{
    AssetStore, GenerationQueue, GenerationTaskRepository, ImageGenerator, ResultRepository,
};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Default pause between polls of an empty queue.
pub const DEFAULT_IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default pause between sweeps for stalled batches.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Pulls task identifiers from the queue and processes them one at a time.
pub struct GenerationWorker<T, R, A, G, Q, C>
where
    T: GenerationTaskRepository,
    R: ResultRepository,
    A: AssetStore,
    G: ImageGenerator,
    Q: GenerationQueue,
    C: Clock + Send + Sync,
{
    processor: TaskProcessor<T, R, A, G, Q, C>,
    queue: Arc<Q>,
    idle_poll_interval: Duration,
    sweep_interval: Duration,
}

impl<T, R, A, G, Q, C> GenerationWorker<T, R, A, G, Q, C>
where
    T: GenerationTaskRepository,
    R: ResultRepository,
    A: AssetStore,
    G: ImageGenerator,
    Q: GenerationQueue,
    C: Clock + Send + Sync,
{
    /// Creates a worker reading from `queue`.
    #[must_use]
    pub const fn new(processor: TaskProcessor<T, R, A, G, Q, C>, queue: Arc<Q>) -> Self {
        Self {
            processor,
            queue,
            idle_poll_interval: DEFAULT_IDLE_POLL_INTERVAL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Sets the pause between polls of an empty queue.
    #[must_use]
    pub const fn with_idle_poll_interval(mut self, interval: Duration) -> Self {
        self.idle_poll_interval = interval;
        self
    }

    /// Sets the minimum pause between sweeps for stalled batches.
    #[must_use]
    pub const fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Re-queues stalled batches, logging instead of failing.
    ///
    /// Returns the number of tasks queued.
    pub async fn sweep(&self) -> usize {
        match self.processor.recover_stalled().await {
            Ok(queued) => {
                if !queued.is_empty() {
                    info!(count = queued.len(), "stalled batches re-queued");
                }
                queued.len()
            }
            Err(err) => {
                error!(error = %err, "stalled batch sweep failed");
                0
            }
        }
    }

    /// Processes queued tasks until the queue is empty, including tasks
    /// chained while draining.
    pub async fn run_until_idle(&self) -> Vec<ProcessReport> {
        let mut reports = Vec::new();
        loop {
            match self.queue.dequeue().await {
                Ok(Some(task_id)) => match self.processor.process(task_id).await {
                    Ok(report) => reports.push(report),
                    Err(err) => error!(task_id = %task_id, error = %err, "task processing failed"),
                },
                Ok(None) => break,
                Err(err) => {
                    error!(error = %err, "failed to read generation queue");
                    break;
                }
            }
        }
        reports
    }

    /// Processes queued tasks until `shutdown` is cancelled.
    ///
    /// Stalled batches are swept on start-up and then, while the queue is
    /// empty, at most once per sweep interval. Failures are logged and never
    /// stop the loop. A task in flight when shutdown is requested runs to
    /// completion first.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("generation worker started");
        self.sweep().await;
        let mut last_sweep = Instant::now();
        while !shutdown.is_cancelled() {
            match self.queue.dequeue().await {
                Ok(Some(task_id)) => {
                    if let Err(err) = self.processor.process(task_id).await {
                        error!(task_id = %task_id, error = %err, "task processing failed");
                    }
                    continue;
                }
                Ok(None) => {
                    debug!("generation queue empty");
                    if last_sweep.elapsed() >= self.sweep_interval {
                        last_sweep = Instant::now();
                        if self.sweep().await > 0 {
                            continue;
                        }
                    }
                }
                Err(err) => error!(error = %err, "failed to read generation queue"),
            }
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.idle_poll_interval) => {}
            }
        }
        info!("generation worker stopped");
    }
}
