//! Error types for alt-text generation.
//!
//! Remote failures are classified exactly once, in
//! [`GenerationError::from_message`]. Everything downstream matches on the
//! tagged variant instead of inspecting message text.

use thiserror::Error;

use crate::model::BatchItemResult;

/// Substring the remote service uses to report an exhausted quota.
pub const QUOTA_EXCEEDED_MARKER: &str = "Usage limit exceeded";

/// Message used when the remote gives no reason for a failure.
pub const GENERATION_FAILED: &str = "Generation failed";

/// Failure reported by the remote generator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The usage quota for the current period is exhausted.
    #[error("{message}")]
    QuotaExceeded {
        /// Message returned by the remote.
        message: String,
    },
    /// Any other generation failure.
    #[error("{message}")]
    Failed {
        /// Message returned by the remote or describing the transport failure.
        message: String,
    },
}

impl GenerationError {
    /// Classify a remote failure message.
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains(QUOTA_EXCEEDED_MARKER) {
            Self::QuotaExceeded { message }
        } else {
            Self::Failed { message }
        }
    }

    /// Whether the failure means the quota is exhausted.
    #[must_use]
    pub const fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }

    /// Message carried by the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::QuotaExceeded { message } | Self::Failed { message } => message,
        }
    }
}

impl BatchItemResult {
    /// Convert a batch element into generated text or a classified failure.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] when the element reports failure or
    /// carries no text.
    pub fn into_text(self) -> Result<String, GenerationError> {
        match self.alt_text {
            Some(text) if self.success && !text.is_empty() => Ok(text),
            _ => Err(GenerationError::from_message(
                self.error.unwrap_or_else(|| GENERATION_FAILED.to_string()),
            )),
        }
    }
}

/// Per-item failure recorded in a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    /// The asset does not exist in the catalog.
    #[error("File not found")]
    NotFound,
    /// The asset's MIME type is not a supported image type.
    #[error("File is not an image")]
    NotAnImage,
    /// The image bytes could not be loaded or normalized.
    #[error("{message}")]
    Unreadable {
        /// Description of the read or decode failure.
        message: String,
    },
    /// The remote generator failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// Generated text could not be written back to the catalog.
    #[error("Failed to save alt text")]
    SaveFailed,
    /// The item was never attempted because an earlier item hit the quota.
    #[error("Not attempted: usage limit exceeded")]
    Skipped,
}

impl ItemError {
    /// Whether the failure means the quota is exhausted.
    #[must_use]
    pub const fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::Generation(GenerationError::QuotaExceeded { .. }))
    }
}
