//! Error types for the licensing gateway.

use alttext_config::ConfigError;
use alttext_core::GenerationError;
use thiserror::Error;

/// Failures raised while talking to the licensing service.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No license key is stored.
    #[error("no license key configured")]
    MissingLicenseKey,
    /// Caller supplied an unusable request.
    #[error("invalid licensing request")]
    InvalidRequest {
        /// Operation identifier.
        operation: &'static str,
        /// Machine-readable reason.
        reason: &'static str,
    },
    /// The request could not be sent or the response could not be read.
    #[error("licensing request failed")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying HTTP client error.
        source: reqwest::Error,
    },
    /// The service answered with a non-success status.
    #[error("licensing service rejected the request")]
    Remote {
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Message reported by the service, or a per-operation fallback.
        message: String,
    },
    /// The response body did not match the expected shape.
    #[error("licensing response was malformed")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying decode error.
        source: reqwest::Error,
    },
    /// An endpoint URL could not be built from the base URL.
    #[error("invalid licensing endpoint")]
    Endpoint {
        /// Path that failed to resolve.
        path: &'static str,
        /// Underlying URL error.
        source: url::ParseError,
    },
    /// Reading the stored settings failed.
    #[error("settings unavailable")]
    Settings {
        /// Underlying configuration error.
        source: ConfigError,
    },
}

impl GatewayError {
    /// Message suitable for operators and per-item failure records.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingLicenseKey => "No license key configured".to_string(),
            Self::InvalidRequest { reason, .. } => (*reason).to_string(),
            Self::Remote { message, .. } => message.clone(),
            Self::Transport { source, .. } | Self::Decode { source, .. } => source.to_string(),
            Self::Endpoint { path, .. } => format!("invalid licensing endpoint {path}"),
            Self::Settings { source } => source.detail(),
        }
    }
}

impl From<GatewayError> for GenerationError {
    fn from(err: GatewayError) -> Self {
        Self::from_message(err.user_message())
    }
}

/// Convenience alias for gateway results.
pub type GatewayResult<T> = Result<T, GatewayError>;
