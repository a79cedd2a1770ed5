//! Object storage adapter for a Supabase-compatible storage REST API.

use crate::generation::{
    domain::AssetPath,
    ports::{AssetStore, AssetStoreError, AssetStoreResult},
};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

/// Default bucket holding reference and generated images.
pub const DEFAULT_STORAGE_BUCKET: &str = "photoshoots";

/// Connection settings for [`HttpAssetStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    /// Project base URL without trailing slash.
    pub base_url: String,
    /// Bucket name.
    pub bucket: String,
    /// Service role key used for uploads.
    pub service_key: String,
    /// Transport-level timeout for one HTTP request.
    pub request_timeout: Duration,
}

impl StorageSettings {
    /// Creates settings for the default bucket.
    #[must_use]
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            bucket: DEFAULT_STORAGE_BUCKET.to_owned(),
            service_key: service_key.into(),
            request_timeout: Duration::from_secs(60),
        }
    }

    /// Overrides the bucket.
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Returns the upload endpoint for `path`.
    #[must_use]
    pub fn object_url(&self, path: &AssetPath) -> String {
        format!("{}/storage/v1/object/{}/{path}", self.base_url, self.bucket)
    }

    /// Returns the public URL an object at `path` is served from.
    #[must_use]
    pub fn public_url(&self, path: &AssetPath) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{path}",
            self.base_url, self.bucket
        )
    }
}

/// Asset store speaking the storage REST API over `reqwest`.
///
/// Uploads are sent with `x-upsert: true`. `429` and `5xx` answers and
/// transport failures are reported as transient so callers can retry them.
#[derive(Debug, Clone)]
pub struct HttpAssetStore {
    http: reqwest::Client,
    settings: StorageSettings,
}

impl HttpAssetStore {
    /// Creates a store.
    ///
    /// # Errors
    ///
    /// Returns [`AssetStoreError::Permanent`] when the HTTP client cannot be
    /// built.
    pub fn new(settings: StorageSettings) -> AssetStoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| AssetStoreError::Permanent(err.to_string()))?;
        Ok(Self { http, settings })
    }

    async fn error_from_response(response: reqwest::Response, target: &str) -> AssetStoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        classify_status(status, format!("{target}: {status} {body}"))
    }
}

#[async_trait]
impl AssetStore for HttpAssetStore {
    async fn upload(
        &self,
        path: &AssetPath,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> AssetStoreResult<String> {
        let endpoint = self.settings.object_url(path);
        debug!(path = %path, size = bytes.len(), "uploading object");
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.settings.service_key)
            .header("apikey", &self.settings.service_key)
            .header("x-upsert", "true")
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|err| AssetStoreError::Transient(err.to_string()))?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(response, path.as_str()).await);
        }
        Ok(self.settings.public_url(path))
    }

    async fn download(&self, url: &str) -> AssetStoreResult<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| AssetStoreError::Transient(err.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AssetStoreError::NotFound(url.to_owned()));
        }
        if !response.status().is_success() {
            return Err(Self::error_from_response(response, url).await);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| AssetStoreError::Transient(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn classify_status(status: StatusCode, detail: String) -> AssetStoreError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        AssetStoreError::Transient(detail)
    } else {
        AssetStoreError::Permanent(detail)
    }
}
