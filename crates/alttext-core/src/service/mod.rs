//! Collaborator traits consumed by the bulk orchestrator.

use alttext_events::AssetId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::model::{Asset, AssetFormats, BatchItemResult, EncodedImage, UsageSnapshot};

/// Read and write access to the host's media catalog.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Look up an asset by identifier.
    async fn find_asset(&self, id: AssetId) -> anyhow::Result<Option<Asset>>;

    /// Load the raw bytes of the asset's original file.
    async fn read_image(&self, asset: &Asset) -> anyhow::Result<Vec<u8>>;

    /// Persist generated alt text on the asset.
    async fn write_alt_text(&self, id: AssetId, text: &str) -> anyhow::Result<()>;
}

/// Catalog operations beyond what a run needs: listing and registration.
#[async_trait]
pub trait AssetCatalog: AssetStore {
    /// All assets, ordered by identifier.
    async fn list_assets(&self) -> anyhow::Result<Vec<Asset>>;

    /// Register a new asset and return it with its assigned identifier.
    async fn register_asset(&self, asset: NewAsset) -> anyhow::Result<Asset>;
}

/// Payload for registering an asset with the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewAsset {
    /// Display name.
    pub name: String,
    /// MIME type.
    pub mime: String,
    /// Location of the original file.
    pub url: String,
    /// Preview renditions.
    #[serde(default)]
    pub formats: AssetFormats,
}

/// Converts raw image bytes into the payload sent to the remote generator.
#[async_trait]
pub trait ImageNormalizer: Send + Sync {
    /// Normalize `bytes` of the given MIME type.
    async fn normalize(&self, bytes: Vec<u8>, mime: &str) -> anyhow::Result<EncodedImage>;
}

/// Quota-limited remote generator.
#[async_trait]
pub trait QuotaGateway: Send + Sync {
    /// Generate alt text for a single image.
    async fn generate_one(&self, image: &EncodedImage) -> Result<String, GenerationError>;

    /// Generate alt text for several images in one call.
    ///
    /// Results are positional: element `i` belongs to `images[i]`.
    async fn generate_many(
        &self,
        images: &[EncodedImage],
    ) -> Result<Vec<BatchItemResult>, GenerationError>;

    /// Fetch the current usage counters.
    async fn usage_snapshot(&self) -> Result<UsageSnapshot, GenerationError>;
}
