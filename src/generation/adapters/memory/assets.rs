//! In-memory asset store.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::generation::{
    domain::AssetPath,
    ports::{AssetStore, AssetStoreError, AssetStoreResult},
};

/// Default base URL of objects served by the in-memory store.
pub const IN_MEMORY_ASSET_BASE_URL: &str = "https://assets.test/public";

/// Thread-safe in-memory object store.
///
/// Objects are addressable by the public URL returned from
/// [`AssetStore::upload`]. Failures can be scripted for upcoming uploads.
#[derive(Debug, Clone)]
pub struct InMemoryAssetStore {
    base_url: String,
    state: Arc<Mutex<AssetState>>,
}

#[derive(Debug, Default)]
struct AssetState {
    objects: HashMap<String, Vec<u8>>,
    upload_failures: VecDeque<AssetStoreError>,
    upload_attempts: usize,
}

impl Default for InMemoryAssetStore {
    fn default() -> Self {
        Self::new(IN_MEMORY_ASSET_BASE_URL)
    }
}

impl InMemoryAssetStore {
    /// Creates an empty store serving objects below `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            state: Arc::new(Mutex::new(AssetState::default())),
        }
    }

    /// Makes `url` downloadable, standing in for an externally hosted image.
    ///
    /// # Errors
    ///
    /// Returns a transient error when lock acquisition fails.
    pub fn seed_remote(&self, url: impl Into<String>, bytes: Vec<u8>) -> AssetStoreResult<()> {
        self.lock()?.objects.insert(url.into(), bytes);
        Ok(())
    }

    /// Makes the next upload attempt fail with `error`.
    ///
    /// Calls accumulate: each scripted failure is consumed by one attempt.
    ///
    /// # Errors
    ///
    /// Returns a transient error when lock acquisition fails.
    pub fn fail_next_upload(&self, error: AssetStoreError) -> AssetStoreResult<()> {
        self.lock()?.upload_failures.push_back(error);
        Ok(())
    }

    /// Returns the number of upload attempts, failed ones included.
    ///
    /// # Errors
    ///
    /// Returns a transient error when lock acquisition fails.
    pub fn upload_attempts(&self) -> AssetStoreResult<usize> {
        Ok(self.lock()?.upload_attempts)
    }

    /// Returns the public URL an object at `path` is served from.
    #[must_use]
    pub fn public_url(&self, path: &AssetPath) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Returns the stored bytes behind `url`.
    ///
    /// # Errors
    ///
    /// Returns a transient error when lock acquisition fails.
    pub fn object(&self, url: &str) -> AssetStoreResult<Option<Vec<u8>>> {
        Ok(self.lock()?.objects.get(url).cloned())
    }

    fn lock(&self) -> AssetStoreResult<MutexGuard<'_, AssetState>> {
        self.state
            .lock()
            .map_err(|err| AssetStoreError::Transient(err.to_string()))
    }
}

#[async_trait]
impl AssetStore for InMemoryAssetStore {
    async fn upload(
        &self,
        path: &AssetPath,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> AssetStoreResult<String> {
        let mut state = self.lock()?;
        state.upload_attempts = state.upload_attempts.saturating_add(1);
        if let Some(error) = state.upload_failures.pop_front() {
            return Err(error);
        }
        let url = self.public_url(path);
        state.objects.insert(url.clone(), bytes);
        Ok(url)
    }

    async fn download(&self, url: &str) -> AssetStoreResult<Vec<u8>> {
        self.lock()?
            .objects
            .get(url)
            .cloned()
            .ok_or_else(|| AssetStoreError::NotFound(url.to_owned()))
    }
}
