use std::time::Duration;

use async_trait::async_trait;
use backdrop_core::config::GeneratorConfig;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{EncodedImage, ImageProvider, ImageRequest, ProviderError};

const USER_AGENT: &str = concat!("backdrop/", env!("CARGO_PKG_VERSION"));

/// OpenAI-compatible `images/generations` endpoint (OpenAI itself, or the
/// Gemini compatibility layer used by default).
pub struct OpenAiImagesProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiImagesProvider {
    /// `timeout` bounds the whole request, body included.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &GeneratorConfig) -> Result<Self, ProviderError> {
        Self::new(cfg.base_url.clone(), Duration::from_secs(cfg.timeout_secs))
    }
}

#[async_trait]
impl ImageProvider for OpenAiImagesProvider {
    fn name(&self) -> &str {
        "openai-compat"
    }

    async fn generate(
        &self,
        req: &ImageRequest,
        api_key: &str,
    ) -> Result<EncodedImage, ProviderError> {
        let body = build_request_body(req);
        let url = format!("{}/images/generations", self.base_url);

        debug!(model = %req.model, size = %req.aspect_ratio, "sending image request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "image API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ImagesResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Http(e)
            } else {
                ProviderError::Parse(e.to_string())
            }
        })?;

        first_image(api_resp)
    }
}

/// Wrap the configured description in the framing sentence sent upstream.
pub fn render_prompt(description: &str) -> String {
    format!(
        "Create a beautiful, high-quality image based on this description: {}. \
         Make it artistic and visually appealing.",
        description
    )
}

fn build_request_body(req: &ImageRequest) -> serde_json::Value {
    serde_json::json!({
        "model": req.model,
        "prompt": render_prompt(&req.prompt),
        "response_format": "b64_json",
        "n": 1,
        "size": req.aspect_ratio,
    })
}

fn first_image(resp: ImagesResponse) -> Result<EncodedImage, ProviderError> {
    let Some(first) = resp.data.into_iter().next() else {
        return Err(ProviderError::EmptyPayload(
            "no image data received from API".to_string(),
        ));
    };
    match first.b64_json {
        Some(b64) if !b64.trim().is_empty() => Ok(EncodedImage { b64 }),
        _ => Err(ProviderError::EmptyPayload(
            "no base64 image data received from API".to_string(),
        )),
    }
}

// Images API response types (private, deserialization only)

#[derive(Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}
