//! OpenAI Images API adapter for the image generator port.

use crate::generation::{
    domain::ImageSize,
    ports::{
        GeneratedImage, GenerationRequest, ImageGenerator, ImageGeneratorError,
        ImageGeneratorResult,
    },
};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Default OpenAI API base URL.
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Default image model.
pub const DEFAULT_OPENAI_IMAGE_MODEL: &str = "gpt-image-1";

/// Connection settings for [`OpenAiImageGenerator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiSettings {
    /// Bearer token.
    pub api_key: String,
    /// API base URL without trailing slash.
    pub api_base: String,
    /// Image model name.
    pub model: String,
    /// Transport-level timeout for one HTTP request.
    pub request_timeout: Duration,
}

impl OpenAiSettings {
    /// Creates settings for the public API with the default model.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_OPENAI_API_BASE.to_owned(),
            model: DEFAULT_OPENAI_IMAGE_MODEL.to_owned(),
            request_timeout: Duration::from_secs(300),
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    /// Overrides the image model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the HTTP request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Image generator backed by `/images/generations` and `/images/edits`.
///
/// Requests without references use the JSON generations endpoint; requests
/// with references upload them as `image[]` multipart parts to the edits
/// endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiImageGenerator {
    http: reqwest::Client,
    settings: OpenAiSettings,
}

impl OpenAiImageGenerator {
    /// Creates a generator.
    ///
    /// # Errors
    ///
    /// Returns [`ImageGeneratorError::Transport`] when the HTTP client cannot
    /// be built.
    pub fn new(settings: OpenAiSettings) -> ImageGeneratorResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ImageGeneratorError::Transport(err.to_string()))?;
        Ok(Self { http, settings })
    }

    async fn generate_from_text(
        &self,
        request: &GenerationRequest,
    ) -> ImageGeneratorResult<reqwest::Response> {
        let endpoint = format!("{}/images/generations", self.settings.api_base);
        let payload = json!({
            "model": self.settings.model,
            "prompt": request.prompt.as_str(),
            "n": request.variants.max(1),
            "size": openai_size(request.size),
            "quality": request.quality.as_str(),
        });
        debug!(endpoint = %endpoint, "requesting image generation");
        self.http
            .post(&endpoint)
            .bearer_auth(&self.settings.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)
    }

    async fn generate_from_references(
        &self,
        request: &GenerationRequest,
    ) -> ImageGeneratorResult<reqwest::Response> {
        let endpoint = format!("{}/images/edits", self.settings.api_base);
        let mut form = Form::new()
            .text("model", self.settings.model.clone())
            .text("prompt", request.prompt.as_str().to_owned())
            .text("n", request.variants.max(1).to_string())
            .text("size", openai_size(request.size))
            .text("quality", request.quality.as_str());
        for reference in &request.references {
            let part = Part::bytes(reference.bytes.clone())
                .file_name(reference.file_name.clone())
                .mime_str(&reference.content_type)
                .map_err(|err| ImageGeneratorError::Transport(err.to_string()))?;
            form = form.part("image[]", part);
        }
        debug!(
            endpoint = %endpoint,
            references = request.references.len(),
            "requesting image edit"
        );
        self.http
            .post(&endpoint)
            .bearer_auth(&self.settings.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> ImageGeneratorResult<Vec<GeneratedImage>> {
        let response = if request.references.is_empty() {
            self.generate_from_text(request).await?
        } else {
            self.generate_from_references(request).await?
        };
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(ImageGeneratorError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }
        decode_images(&body)
    }
}

/// Maps a layout onto the sizes accepted by the Images API.
#[must_use]
pub const fn openai_size(size: ImageSize) -> &'static str {
    match size {
        ImageSize::Square => "1024x1024",
        ImageSize::Landscape => "1536x1024",
        ImageSize::Portrait => "1024x1536",
        ImageSize::Auto => "auto",
    }
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn transport_error(err: reqwest::Error) -> ImageGeneratorError {
    ImageGeneratorError::Transport(err.to_string())
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.chars().take(500).collect())
}

fn decode_images(body: &str) -> ImageGeneratorResult<Vec<GeneratedImage>> {
    let parsed: ImagesResponse = serde_json::from_str(body)
        .map_err(|err| ImageGeneratorError::MalformedResponse(err.to_string()))?;
    let images = parsed
        .data
        .into_iter()
        .filter_map(|datum| datum.b64_json)
        .map(|encoded| {
            BASE64
                .decode(encoded.as_bytes())
                .map(GeneratedImage::png)
                .map_err(|err| ImageGeneratorError::MalformedResponse(err.to_string()))
        })
        .collect::<ImageGeneratorResult<Vec<_>>>()?;
    if images.is_empty() {
        return Err(ImageGeneratorError::EmptyResponse);
    }
    Ok(images)
}
