use std::path::PathBuf;

use thiserror::Error;

/// Every failure a generation cycle can report.
///
/// `Parse` is the only variant callers are expected to recover from (a corrupt
/// state record is treated as "never generated"); all others abort the cycle.
#[derive(Debug, Error)]
pub enum BackdropError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid API payload: {0}")]
    InvalidPayload(String),

    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("Image generation timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BackdropError {
    /// Short category code used in logs and JSON status output.
    pub fn code(&self) -> &'static str {
        match self {
            BackdropError::Config(_) => "CONFIG_ERROR",
            BackdropError::Parse { .. } => "PARSE_ERROR",
            BackdropError::Network(_) => "NETWORK_ERROR",
            BackdropError::Api { .. } | BackdropError::InvalidPayload(_) => "API_ERROR",
            BackdropError::Decode(_) => "DECODE_ERROR",
            BackdropError::Timeout { .. } => "TIMEOUT",
            BackdropError::Io { .. } => "IO_ERROR",
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BackdropError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BackdropError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_errors_share_the_api_code() {
        let api = BackdropError::Api {
            status: 500,
            message: "boom".into(),
        };
        let payload = BackdropError::InvalidPayload("no data".into());
        assert_eq!(api.code(), "API_ERROR");
        assert_eq!(payload.code(), "API_ERROR");
    }

    #[test]
    fn io_error_names_the_path() {
        let err = BackdropError::io(
            "/tmp/state.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/state.json"));
        assert!(msg.contains("denied"));
        assert_eq!(err.code(), "IO_ERROR");
    }
}
