//! Error types for media handling.

use std::io;
use std::path::PathBuf;

use alttext_core::AssetId;
use thiserror::Error;

/// Failures raised while loading, normalizing, or cataloguing media.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The asset's file is not on disk.
    #[error("Image file not found: {}", .path.display())]
    MissingFile {
        /// Resolved location that was checked.
        path: PathBuf,
    },
    /// The image bytes could not be decoded.
    #[error("failed to decode image")]
    Decode {
        /// Underlying decoder error.
        source: image::ImageError,
    },
    /// The normalized image could not be encoded.
    #[error("failed to encode image")]
    Encode {
        /// Underlying encoder error.
        source: image::ImageError,
    },
    /// The blocking re-encode task did not complete.
    #[error("image worker failed")]
    Worker {
        /// Underlying join error.
        source: tokio::task::JoinError,
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
    /// The catalog document could not be encoded or decoded.
    #[error("asset catalog is malformed")]
    Catalog {
        /// Operation identifier.
        operation: &'static str,
        /// Source serde error.
        source: serde_json::Error,
    },
    /// No asset exists with the identifier.
    #[error("asset not found")]
    UnknownAsset {
        /// Requested identifier.
        asset_id: AssetId,
    },
}

/// Convenience alias for media results.
pub type MediaResult<T> = Result<T, MediaError>;
