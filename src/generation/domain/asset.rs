//! Storage paths for reference and generated images.

use super::{BatchId, BatchIndex, GenerationDomainError};
use crate::credit::domain::UserId;
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of hex characters of the content digest kept in generated paths.
const DIGEST_PREFIX_LEN: usize = 16;

/// Bucket-relative object path inside the asset store.
///
/// Paths are relative, non-empty and never contain `..` segments. Paths built
/// by [`AssetPath::for_reference`] and [`AssetPath::for_generated`] embed a
/// content digest, so re-uploading identical bytes targets the same object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetPath(String);

impl AssetPath {
    /// Creates a validated asset path.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationDomainError::InvalidAssetPath`] when the path is
    /// empty, absolute, or contains empty or `..` segments.
    pub fn new(value: impl Into<String>) -> Result<Self, GenerationDomainError> {
        let raw = value.into();
        let is_valid = !raw.is_empty()
            && !raw.starts_with('/')
            && raw
                .split('/')
                .all(|segment| !segment.is_empty() && segment != ".." && segment != ".");
        if !is_valid {
            return Err(GenerationDomainError::InvalidAssetPath(raw));
        }
        Ok(Self(raw))
    }

    /// Builds the path for an uploaded reference image.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationDomainError::InvalidAssetPath`] if the sanitised
    /// file name is unusable.
    pub fn for_reference(
        user_id: UserId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<Self, GenerationDomainError> {
        let digest = digest_prefix(bytes);
        let name = sanitize_file_name(file_name);
        Self::new(format!("references/{user_id}/{digest}-{name}"))
    }

    /// Builds the path for a generated image.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationDomainError::InvalidAssetPath`] if the extension is
    /// unusable.
    pub fn for_generated(
        user_id: UserId,
        batch_id: BatchId,
        batch_index: BatchIndex,
        extension: &str,
        bytes: &[u8],
    ) -> Result<Self, GenerationDomainError> {
        let digest = digest_prefix(bytes);
        let ext = sanitize_file_name(extension);
        Self::new(format!(
            "generated/{user_id}/{batch_id}/{batch_index}-{digest}.{ext}"
        ))
    }

    /// Returns the path as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for AssetPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn digest_prefix(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = String::with_capacity(DIGEST_PREFIX_LEN);
    for byte in digest.iter().take(DIGEST_PREFIX_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

fn sanitize_file_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "image".to_owned()
    } else {
        trimmed.to_owned()
    }
}
