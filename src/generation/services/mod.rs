//! Application services for batch submission, processing and tracking.

mod orchestrator;
mod processor;
mod progress;
mod reconcile;
mod retry;
mod worker;

pub use orchestrator::{
    BatchOrchestrator, BatchSubmission, SubmitBatchError, SubmitBatchRequest, SubmitBatchResult,
};
pub use processor::{
    DEFAULT_GENERATION_TIMEOUT, DEFAULT_STALE_AFTER, ProcessReport, ProcessTaskError,
    ProcessTaskResult, ProcessorSettings, TaskOutcome, TaskProcessor,
};
pub use progress::{
    BatchPoller, BatchProgressService, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT, PollOutcome,
    ProgressError, ProgressResult,
};
pub use reconcile::{
    ReconcileError, ReconcileReport, ReconcileResult, RepairOutcome, ResultReconciler,
};
pub use retry::RetryPolicy;
pub use worker::{DEFAULT_IDLE_POLL_INTERVAL, DEFAULT_SWEEP_INTERVAL, GenerationWorker};
