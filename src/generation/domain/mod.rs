//! Domain model for batch image generation.

mod asset;
mod error;
mod ids;
mod progress;
mod request;
mod result;
mod status;
mod task;

pub use asset::AssetPath;
pub use error::{GenerationDomainError, ParseGenerationStatusError};
pub use ids::{BatchId, BatchIndex, GenerationTaskId, ResultId, VariationGroupId};
pub use progress::BatchProgress;
pub use request::{
    DEFAULT_MAX_VARIANTS, ImageQuality, ImageSize, Prompt, ReferenceImage, VariantCount,
};
pub use result::{LegacyLink, PersistedResultData, ResultRecord};
pub use status::GenerationStatus;
pub use task::{
    BatchSpec, GenerationTask, PersistedGenerationTaskData, next_runnable_task, recoverable_task,
    stalled_cutoff,
};
