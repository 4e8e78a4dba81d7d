//! Scripted collaborators for orchestrator tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use alttext_core::{
    Asset, AssetCatalog, AssetId, AssetStore, BatchItemResult, EncodedImage, GenerationError,
    ImageNormalizer, NewAsset, QUOTA_EXCEEDED_MARKER, QuotaGateway, UsageSnapshot,
};
use anyhow::anyhow;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;

use crate::fixtures::asset_bytes;

/// Scripted generator response for one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Generation succeeds with this text.
    Alt(String),
    /// Generation fails with this message.
    Fail(String),
    /// Generation fails because the quota is exhausted.
    Quota,
}

/// Remote call observed by a [`ScriptedGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    /// Single-image generation for the asset.
    One(AssetId),
    /// Batch generation for the assets, in request order.
    Many(Vec<AssetId>),
    /// Usage lookup.
    Usage,
}

#[derive(Default)]
struct GatewayScript {
    replies: HashMap<AssetId, Reply>,
    batch_failures: HashMap<AssetId, String>,
    delays: HashMap<AssetId, Duration>,
    usage: Option<Result<UsageSnapshot, GenerationError>>,
    calls: Vec<GatewayCall>,
}

/// Gateway whose responses are scripted per asset.
///
/// Images are mapped back to assets through the [`asset_bytes`] payload, so it
/// pairs with [`MemoryAssetStore`] and [`PassthroughNormalizer`]. Unscripted
/// assets succeed with [`ScriptedGateway::default_alt_text`].
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<GatewayScript>,
}

impl ScriptedGateway {
    /// Gateway where every asset succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Text generated for assets without a scripted reply.
    #[must_use]
    pub fn default_alt_text(id: AssetId) -> String {
        format!("Alt text for asset {id}")
    }

    /// Script the reply for `id`.
    #[must_use]
    pub fn with_reply(self, id: AssetId, reply: Reply) -> Self {
        self.lock().replies.insert(id, reply);
        self
    }

    /// Fail any batch call containing `id` with `message`.
    #[must_use]
    pub fn with_batch_failure(self, id: AssetId, message: impl Into<String>) -> Self {
        self.lock().batch_failures.insert(id, message.into());
        self
    }

    /// Delay any call containing `id` by `delay`.
    #[must_use]
    pub fn with_delay(self, id: AssetId, delay: Duration) -> Self {
        self.lock().delays.insert(id, delay);
        self
    }

    /// Script the usage lookup.
    #[must_use]
    pub fn with_usage(self, usage: Result<UsageSnapshot, GenerationError>) -> Self {
        self.lock().usage = Some(usage);
        self
    }

    /// Calls observed so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    /// Number of generation calls (single or batch) observed.
    #[must_use]
    pub fn generation_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| !matches!(call, GatewayCall::Usage))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GatewayScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reply_for(&self, id: AssetId) -> Reply {
        self.lock()
            .replies
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Reply::Alt(Self::default_alt_text(id)))
    }

    fn delay_for(&self, ids: &[AssetId]) -> Duration {
        let script = self.lock();
        ids.iter()
            .filter_map(|id| script.delays.get(id))
            .max()
            .copied()
            .unwrap_or_default()
    }

    async fn pause(&self, ids: &[AssetId]) {
        let delay = self.delay_for(ids);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn identify(image: &EncodedImage) -> Result<AssetId, GenerationError> {
    STANDARD
        .decode(&image.base64)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|payload| payload.strip_prefix("asset-")?.parse().ok())
        .ok_or_else(|| GenerationError::from_message("Unrecognized image payload"))
}

fn quota_message() -> String {
    format!("{QUOTA_EXCEEDED_MARKER}. Please upgrade your plan.")
}

#[async_trait]
impl QuotaGateway for ScriptedGateway {
    async fn generate_one(&self, image: &EncodedImage) -> Result<String, GenerationError> {
        let id = identify(image)?;
        self.lock().calls.push(GatewayCall::One(id));
        self.pause(&[id]).await;
        match self.reply_for(id) {
            Reply::Alt(text) => Ok(text),
            Reply::Fail(message) => Err(GenerationError::from_message(message)),
            Reply::Quota => Err(GenerationError::from_message(quota_message())),
        }
    }

    async fn generate_many(
        &self,
        images: &[EncodedImage],
    ) -> Result<Vec<BatchItemResult>, GenerationError> {
        let ids = images
            .iter()
            .map(identify)
            .collect::<Result<Vec<_>, _>>()?;
        self.lock().calls.push(GatewayCall::Many(ids.clone()));
        self.pause(&ids).await;

        let batch_failure = {
            let script = self.lock();
            ids.iter()
                .find_map(|id| script.batch_failures.get(id).cloned())
        };
        if let Some(message) = batch_failure {
            return Err(GenerationError::from_message(message));
        }

        Ok(ids
            .iter()
            .map(|id| match self.reply_for(*id) {
                Reply::Alt(text) => BatchItemResult {
                    success: true,
                    alt_text: Some(text),
                    error: None,
                },
                Reply::Fail(message) => BatchItemResult {
                    success: false,
                    alt_text: None,
                    error: Some(message),
                },
                Reply::Quota => BatchItemResult {
                    success: false,
                    alt_text: None,
                    error: Some(quota_message()),
                },
            })
            .collect())
    }

    async fn usage_snapshot(&self) -> Result<UsageSnapshot, GenerationError> {
        let mut script = self.lock();
        script.calls.push(GatewayCall::Usage);
        script
            .usage
            .clone()
            .unwrap_or_else(|| Ok(UsageSnapshot::free_tier(Utc::now())))
    }
}

#[derive(Default)]
struct StoreState {
    assets: BTreeMap<AssetId, Asset>,
    bytes: HashMap<AssetId, Vec<u8>>,
    unreadable: HashSet<AssetId>,
    failing_writes: HashSet<AssetId>,
    writes: Vec<(AssetId, String)>,
}

/// In-memory asset catalog.
#[derive(Default)]
pub struct MemoryAssetStore {
    state: Mutex<StoreState>,
}

impl MemoryAssetStore {
    /// Catalog holding `assets`, each serving [`asset_bytes`].
    #[must_use]
    pub fn with_assets(assets: impl IntoIterator<Item = Asset>) -> Self {
        let store = Self::default();
        {
            let mut state = store.lock();
            for asset in assets {
                state.bytes.insert(asset.id, asset_bytes(asset.id));
                state.assets.insert(asset.id, asset);
            }
        }
        store
    }

    /// Make reads of `id` fail.
    #[must_use]
    pub fn with_unreadable(self, id: AssetId) -> Self {
        self.lock().unreadable.insert(id);
        self
    }

    /// Make alt-text writes for `id` fail.
    #[must_use]
    pub fn with_failing_write(self, id: AssetId) -> Self {
        self.lock().failing_writes.insert(id);
        self
    }

    /// Current alt text of `id`.
    #[must_use]
    pub fn alt_text(&self, id: AssetId) -> Option<String> {
        self.lock()
            .assets
            .get(&id)
            .and_then(|asset| asset.alternative_text.clone())
    }

    /// Alt-text writes observed so far, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<(AssetId, String)> {
        self.lock().writes.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn find_asset(&self, id: AssetId) -> anyhow::Result<Option<Asset>> {
        Ok(self.lock().assets.get(&id).cloned())
    }

    async fn read_image(&self, asset: &Asset) -> anyhow::Result<Vec<u8>> {
        let state = self.lock();
        if state.unreadable.contains(&asset.id) {
            return Err(anyhow!("Image file not found: {}", asset.url));
        }
        state
            .bytes
            .get(&asset.id)
            .cloned()
            .ok_or_else(|| anyhow!("Image file not found: {}", asset.url))
    }

    async fn write_alt_text(&self, id: AssetId, text: &str) -> anyhow::Result<()> {
        let mut state = self.lock();
        if state.failing_writes.contains(&id) {
            return Err(anyhow!("storage unavailable"));
        }
        let asset = state
            .assets
            .get_mut(&id)
            .ok_or_else(|| anyhow!("asset {id} not found"))?;
        asset.alternative_text = Some(text.to_string());
        state.writes.push((id, text.to_string()));
        Ok(())
    }
}

#[async_trait]
impl AssetCatalog for MemoryAssetStore {
    async fn list_assets(&self) -> anyhow::Result<Vec<Asset>> {
        Ok(self.lock().assets.values().cloned().collect())
    }

    async fn register_asset(&self, asset: NewAsset) -> anyhow::Result<Asset> {
        let mut state = self.lock();
        let id = state.assets.keys().next_back().copied().unwrap_or(0) + 1;
        let registered = Asset {
            id,
            name: asset.name,
            mime: asset.mime,
            url: asset.url,
            formats: asset.formats,
            alternative_text: None,
        };
        state.bytes.insert(id, asset_bytes(id));
        state.assets.insert(id, registered.clone());
        Ok(registered)
    }
}

/// Normalizer that base64-encodes bytes without touching them.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughNormalizer;

#[async_trait]
impl ImageNormalizer for PassthroughNormalizer {
    async fn normalize(&self, bytes: Vec<u8>, mime: &str) -> anyhow::Result<EncodedImage> {
        Ok(EncodedImage {
            mime: mime.to_string(),
            base64: STANDARD.encode(bytes),
        })
    }
}
