#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! Host-agnostic alt-text domain types and collaborator interfaces.

pub mod error;
pub mod model;
pub mod service;

pub use alttext_events::{AssetId, ItemStatus, RunSummary};
pub use error::{GENERATION_FAILED, GenerationError, ItemError, QUOTA_EXCEEDED_MARKER};
pub use model::{
    Asset, AssetFormat, AssetFormats, BatchItemResult, CHUNK_SIZE, Chunk, EncodedImage,
    FREE_TIER_LIMIT, RunOutcome, SUPPORTED_IMAGE_MIME_TYPES, SVG_MIME_TYPE, SelectionSet,
    UsageSnapshot, is_supported_image,
};
pub use service::{AssetCatalog, AssetStore, ImageNormalizer, NewAsset, QuotaGateway};

/// Outcome of processing one asset: the saved alt text or the failure.
pub type ItemOutcome = Result<String, ItemError>;
