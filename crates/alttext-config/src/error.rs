//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field (or environment variable) that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// License key failed format validation.
    #[error("invalid license key")]
    InvalidLicenseKey {
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the operation.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// Settings document could not be encoded or decoded.
    #[error("settings document is malformed")]
    Serde {
        /// Operation identifier.
        operation: &'static str,
        /// Source serde error.
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Human-readable detail suitable for operator-facing messages.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::InvalidField {
                field,
                value,
                reason,
            } => value.as_ref().map_or_else(
                || format!("{field}: {reason}"),
                |value| format!("{field}={value}: {reason}"),
            ),
            Self::InvalidLicenseKey { reason } => (*reason).to_string(),
            Self::Io {
                operation, path, ..
            } => format!("{operation} failed for {}", path.display()),
            Self::Serde { operation, .. } => format!("{operation} failed"),
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
