//! Object storage port for reference and generated images.

use crate::generation::domain::AssetPath;
use async_trait::async_trait;
use thiserror::Error;

/// Result type for asset store operations.
pub type AssetStoreResult<T> = Result<T, AssetStoreError>;

/// Object storage contract.
///
/// Uploads are upserts: writing the same path twice replaces the object and
/// returns the same public URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Uploads `bytes` under `path` and returns the object's public URL.
    async fn upload(
        &self,
        path: &AssetPath,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> AssetStoreResult<String>;

    /// Downloads the object behind a public URL.
    async fn download(&self, url: &str) -> AssetStoreResult<Vec<u8>>;
}

/// Errors returned by asset store implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssetStoreError {
    /// The store could not serve the request right now; retrying may succeed.
    #[error("transient storage failure: {0}")]
    Transient(String),

    /// The store rejected the request.
    #[error("storage request rejected: {0}")]
    Permanent(String),

    /// No object exists at the URL.
    #[error("object not found: {0}")]
    NotFound(String),
}

impl AssetStoreError {
    /// Returns `true` when the failure is worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
