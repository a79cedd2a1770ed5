//! Port for the external image generation model.

use crate::generation::domain::{ImageQuality, ImageSize, Prompt};
use async_trait::async_trait;
use thiserror::Error;

/// Result type for image generator operations.
pub type ImageGeneratorResult<T> = Result<T, ImageGeneratorError>;

/// Reference image bytes forwarded to the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceBytes {
    /// File name reported to the generator.
    pub file_name: String,
    /// MIME type of the bytes.
    pub content_type: String,
    /// Raw image bytes.
    pub bytes: Vec<u8>,
}

/// One call to the image generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Prompt text.
    pub prompt: Prompt,
    /// Reference images; empty for pure text-to-image generation.
    pub references: Vec<ReferenceBytes>,
    /// Requested layout.
    pub size: ImageSize,
    /// Requested quality.
    pub quality: ImageQuality,
    /// Number of images to return.
    pub variants: u8,
}

impl GenerationRequest {
    /// Creates a single-image request without references.
    #[must_use]
    pub const fn new(prompt: Prompt, size: ImageSize, quality: ImageQuality) -> Self {
        Self {
            prompt,
            references: Vec::new(),
            size,
            quality,
            variants: 1,
        }
    }

    /// Attaches reference images.
    #[must_use]
    pub fn with_references(mut self, references: Vec<ReferenceBytes>) -> Self {
        self.references = references;
        self
    }

    /// Sets the number of images to return.
    #[must_use]
    pub const fn with_variants(mut self, variants: u8) -> Self {
        self.variants = variants;
        self
    }
}

/// Image returned by the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    /// MIME type of the bytes.
    pub content_type: String,
}

impl GeneratedImage {
    /// Creates a PNG image.
    #[must_use]
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: "image/png".to_owned(),
        }
    }

    /// Returns the file extension matching the content type.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

/// Image generation contract.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generates images for `request`.
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> ImageGeneratorResult<Vec<GeneratedImage>>;
}

/// Errors returned by image generator implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImageGeneratorError {
    /// The generator did not answer in time.
    #[error("image generation timed out after {seconds}s")]
    Timeout {
        /// Elapsed budget in seconds.
        seconds: u64,
    },

    /// The generator answered with an error status.
    #[error("image API returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message reported by the API.
        message: String,
    },

    /// The generator's response could not be decoded.
    #[error("malformed image API response: {0}")]
    MalformedResponse(String),

    /// The generator answered without any image.
    #[error("image API returned no images")]
    EmptyResponse,

    /// The request never reached the generator.
    #[error("image API transport error: {0}")]
    Transport(String),
}
