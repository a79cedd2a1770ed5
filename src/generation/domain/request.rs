//! Validated inputs for a batch generation request.

use super::{BatchIndex, GenerationDomainError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default upper bound on variants per submission.
pub const DEFAULT_MAX_VARIANTS: u8 = 5;

/// Non-empty text prompt sent to the image generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Prompt(String);

impl Prompt {
    /// Creates a validated prompt, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationDomainError::EmptyPrompt`] when the prompt is empty
    /// after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, GenerationDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(GenerationDomainError::EmptyPrompt);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the prompt text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Number of variants requested in one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantCount(u8);

impl VariantCount {
    /// Creates a variant count bounded by `max`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationDomainError::VariantCountOutOfRange`] when
    /// `requested` is zero or greater than `max`.
    pub fn new(requested: u32, max: u8) -> Result<Self, GenerationDomainError> {
        let out_of_range = GenerationDomainError::VariantCountOutOfRange { requested, max };
        let value = u8::try_from(requested).map_err(|_| out_of_range.clone())?;
        if value == 0 || value > max {
            return Err(out_of_range);
        }
        Ok(Self(value))
    }

    /// Returns the number of variants.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Returns the batch indices `0..count` in order.
    pub fn indices(self) -> impl Iterator<Item = BatchIndex> {
        (0..u32::from(self.0)).filter_map(|value| BatchIndex::new(value).ok())
    }
}

/// Output layout requested for generated images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSize {
    /// 1:1 output.
    #[default]
    Square,
    /// Wide output.
    Landscape,
    /// Tall output.
    Portrait,
    /// Let the generator decide.
    Auto,
}

impl ImageSize {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Square => "square",
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::Auto => "auto",
        }
    }
}

impl TryFrom<&str> for ImageSize {
    type Error = GenerationDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "square" => Ok(Self::Square),
            "landscape" => Ok(Self::Landscape),
            "portrait" => Ok(Self::Portrait),
            "auto" => Ok(Self::Auto),
            _ => Err(GenerationDomainError::UnknownImageSize(value.to_owned())),
        }
    }
}

/// Rendering quality requested from the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageQuality {
    /// Fastest, cheapest output.
    Low,
    /// Balanced output.
    Medium,
    /// Highest fidelity output.
    High,
    /// Let the generator decide.
    #[default]
    Auto,
}

impl ImageQuality {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Auto => "auto",
        }
    }
}

impl TryFrom<&str> for ImageQuality {
    type Error = GenerationDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "auto" => Ok(Self::Auto),
            _ => Err(GenerationDomainError::UnknownImageQuality(value.to_owned())),
        }
    }
}

/// Reference image supplied with a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceImage {
    /// Local file bytes that must be uploaded before tasks are created.
    Upload {
        /// Original file name, used to derive the stored path.
        file_name: String,
        /// MIME type of the bytes.
        content_type: String,
        /// Raw image bytes.
        bytes: Vec<u8>,
    },
    /// Already-hosted image passed through unchanged.
    Url(String),
}

impl ReferenceImage {
    /// Creates a reference to an already-hosted image.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationDomainError::InvalidReferenceUrl`] unless the URL
    /// starts with `http://` or `https://`.
    pub fn url(value: impl Into<String>) -> Result<Self, GenerationDomainError> {
        let raw = value.into();
        if !is_hosted(&raw) {
            return Err(GenerationDomainError::InvalidReferenceUrl(raw));
        }
        Ok(Self::Url(raw.trim().to_owned()))
    }

    /// Creates a reference from local file bytes.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationDomainError::EmptyReferenceImage`] when `bytes` is
    /// empty.
    pub fn upload(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, GenerationDomainError> {
        let name = file_name.into();
        if bytes.is_empty() {
            return Err(GenerationDomainError::EmptyReferenceImage(name));
        }
        Ok(Self::Upload {
            file_name: name,
            content_type: content_type.into(),
            bytes,
        })
    }

    /// Re-checks a reference that may have been built without its
    /// constructor.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationDomainError::InvalidReferenceUrl`] for a URL that
    /// is not `http://` or `https://`, and
    /// [`GenerationDomainError::EmptyReferenceImage`] for an upload without
    /// bytes.
    pub fn validate(&self) -> Result<(), GenerationDomainError> {
        match self {
            Self::Url(url) if !is_hosted(url) => {
                Err(GenerationDomainError::InvalidReferenceUrl(url.clone()))
            }
            Self::Upload {
                file_name, bytes, ..
            } if bytes.is_empty() => {
                Err(GenerationDomainError::EmptyReferenceImage(file_name.clone()))
            }
            Self::Url(_) | Self::Upload { .. } => Ok(()),
        }
    }
}

fn is_hosted(url: &str) -> bool {
    let trimmed = url.trim();
    let lower = trimmed.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"));
    rest.is_some_and(|host| !host.is_empty())
}
