use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use backdrop_core::{ArtifactSlot, BackdropError, Result};
use base64::Engine as _;
use serde::Serialize;
use tracing::{info, warn};

use crate::provider::{EncodedImage, ImageProvider, ImageRequest};

/// Result of a successful `generate`: where the image landed and how big it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Calls the provider once and atomically installs the decoded image.
///
/// On any error the slot is not touched, so the previous image keeps being
/// served until a later success replaces it.
pub struct Generator {
    provider: Arc<dyn ImageProvider>,
    slot: ArtifactSlot,
    timeout: Duration,
}

impl Generator {
    pub fn new(provider: Arc<dyn ImageProvider>, slot: ArtifactSlot, timeout: Duration) -> Self {
        Self {
            provider,
            slot,
            timeout,
        }
    }

    pub fn slot(&self) -> &ArtifactSlot {
        &self.slot
    }

    pub async fn generate(
        &self,
        req: &ImageRequest,
        api_key: Option<&str>,
    ) -> Result<GeneratedArtifact> {
        // Checked before anything touches the network.
        let api_key = api_key.map(str::trim).filter(|k| !k.is_empty()).ok_or_else(|| {
            BackdropError::Config(
                "no API key configured (set GOOGLE_API_KEY or generator.api_key)".to_string(),
            )
        })?;

        info!(
            provider = self.provider.name(),
            model = %req.model,
            prompt = %req.prompt,
            "generating image"
        );

        let secs = self.timeout.as_secs();
        let encoded = match tokio::time::timeout(self.timeout, self.provider.generate(req, api_key))
            .await
        {
            Ok(Ok(img)) => img,
            Ok(Err(e)) if e.is_timeout() => {
                warn!(provider = self.provider.name(), "image request timed out");
                return Err(BackdropError::Timeout { secs });
            }
            Ok(Err(e)) => {
                warn!(provider = self.provider.name(), error = %e, "image request failed");
                return Err(e.into());
            }
            Err(_) => {
                warn!(provider = self.provider.name(), "image request timed out");
                return Err(BackdropError::Timeout { secs });
            }
        };

        let bytes = decode_image(&encoded)?;
        let size_bytes = self.slot.replace(&bytes)?;

        info!(path = %self.slot.path().display(), size_bytes, "image saved");
        Ok(GeneratedArtifact {
            path: self.slot.path().to_path_buf(),
            size_bytes,
        })
    }
}

/// Decode a base64 payload, tolerating a `data:` URL prefix and line wrapping.
pub fn decode_image(encoded: &EncodedImage) -> Result<Vec<u8>> {
    let raw = encoded.b64.trim();
    let raw = match raw.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => raw,
    };
    let compact: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(BackdropError::InvalidPayload(
            "empty base64 image payload".to_string(),
        ));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| BackdropError::Decode(e.to_string()))?;
    if bytes.is_empty() {
        return Err(BackdropError::Decode("payload decoded to zero bytes".to_string()));
    }
    Ok(bytes)
}
