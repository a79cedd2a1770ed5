//! In-memory adapters for tests and local runs.

mod assets;
mod generator;
mod queue;
mod results;
mod tasks;

pub use assets::{IN_MEMORY_ASSET_BASE_URL, InMemoryAssetStore};
pub use generator::{InMemoryImageGenerator, ScriptedGeneration};
pub use queue::InMemoryGenerationQueue;
pub use results::InMemoryResultRepository;
pub use tasks::InMemoryGenerationTaskRepository;
