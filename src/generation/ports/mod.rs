//! Port contracts for batch image generation.

pub mod asset_store;
pub mod image_generator;
pub mod queue;
pub mod result_repository;
pub mod task_repository;

#[cfg(test)]
pub use asset_store::MockAssetStore;
pub use asset_store::{AssetStore, AssetStoreError, AssetStoreResult};
pub use image_generator::{
    GeneratedImage, GenerationRequest, ImageGenerator, ImageGeneratorError, ImageGeneratorResult,
    ReferenceBytes,
};
pub use queue::{GenerationQueue, GenerationQueueError, GenerationQueueResult};
pub use result_repository::{ResultRepository, ResultRepositoryError, ResultRepositoryResult};
pub use task_repository::{
    GenerationTaskRepository, GenerationTaskRepositoryError, GenerationTaskRepositoryResult,
    ensure_update_allowed,
};
