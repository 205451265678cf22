use async_trait::async_trait;
use backdrop_core::config::GeneratorConfig;
use backdrop_core::BackdropError;
use serde::{Deserialize, Serialize};

/// What to draw. Built from [`GeneratorConfig`] once per cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub model: String,
    pub aspect_ratio: String,
}

impl ImageRequest {
    pub fn from_config(cfg: &GeneratorConfig) -> Self {
        Self {
            prompt: cfg.prompt.clone(),
            model: cfg.model.clone(),
            aspect_ratio: cfg.aspect_ratio.clone(),
        }
    }
}

/// A single encoded (base64) image as returned by the provider. Decoding is
/// the caller's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub b64: String,
}

/// Common interface for text-to-image backends.
///
/// Implementations make exactly one upstream call per `generate` and never
/// retry; scheduling the next attempt is the caller's concern.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    async fn generate(
        &self,
        req: &ImageRequest,
        api_key: &str,
    ) -> Result<EncodedImage, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty payload: {0}")]
    EmptyPayload(String),
}

impl ProviderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Http(e) if e.is_timeout())
    }
}

impl From<ProviderError> for BackdropError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Http(err) => BackdropError::Network(err.to_string()),
            ProviderError::Api { status, message } => BackdropError::Api { status, message },
            ProviderError::Parse(msg) | ProviderError::EmptyPayload(msg) => {
                BackdropError::InvalidPayload(msg)
            }
        }
    }
}
