//! Error types for generation domain validation and parsing.

use super::{GenerationStatus, GenerationTaskId};
use thiserror::Error;

/// Errors returned while constructing or mutating generation domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationDomainError {
    /// The prompt is empty after trimming.
    #[error("prompt must not be empty")]
    EmptyPrompt,

    /// The requested number of variants is outside the accepted range.
    #[error("variant count {requested} is out of range, expected 1..={max}")]
    VariantCountOutOfRange {
        /// Requested variant count.
        requested: u32,
        /// Upper bound accepted by the orchestrator.
        max: u8,
    },

    /// The batch index cannot be persisted.
    #[error("invalid batch index {0}")]
    InvalidBatchIndex(u32),

    /// A reference image URL is not an absolute `http(s)` URL.
    #[error("reference image URL '{0}' must start with 'http://' or 'https://'")]
    InvalidReferenceUrl(String),

    /// An uploaded reference image carries no bytes.
    #[error("reference image '{0}' is empty")]
    EmptyReferenceImage(String),

    /// The image size token is unknown.
    #[error("unknown image size: {0}")]
    UnknownImageSize(String),

    /// The image quality token is unknown.
    #[error("unknown image quality: {0}")]
    UnknownImageQuality(String),

    /// The asset path is empty or escapes its bucket.
    #[error("invalid asset path '{0}'")]
    InvalidAssetPath(String),

    /// A completed task must carry the URL of its generated image.
    #[error("result image URL must not be empty")]
    EmptyResultUrl,

    /// The requested status transition is not permitted.
    #[error("invalid status transition for task {task_id}: {from} -> {to}")]
    InvalidStatusTransition {
        /// Task identifier.
        task_id: GenerationTaskId,
        /// Current status.
        from: GenerationStatus,
        /// Requested status.
        to: GenerationStatus,
    },
}

/// Error returned while parsing generation statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown generation status: {0}")]
pub struct ParseGenerationStatusError(pub String);
