//! Single-asset generation pipeline.

use std::sync::Arc;

use alttext_core::{
    AssetId, AssetStore, EncodedImage, ImageNormalizer, ItemError, ItemOutcome, QuotaGateway,
    SVG_MIME_TYPE,
};
use tracing::{debug, warn};

/// Resolves, normalizes, and generates alt text for one asset.
///
/// The processor never touches run state; recording outcomes is the
/// dispatcher's job so the same pipeline serves both dispatch modes.
#[derive(Clone)]
pub struct ItemProcessor {
    store: Arc<dyn AssetStore>,
    normalizer: Arc<dyn ImageNormalizer>,
    gateway: Arc<dyn QuotaGateway>,
}

impl ItemProcessor {
    /// Build a processor over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn AssetStore>,
        normalizer: Arc<dyn ImageNormalizer>,
        gateway: Arc<dyn QuotaGateway>,
    ) -> Self {
        Self {
            store,
            normalizer,
            gateway,
        }
    }

    /// Remote generator used by the processor.
    #[must_use]
    pub fn gateway(&self) -> &Arc<dyn QuotaGateway> {
        &self.gateway
    }

    /// Resolve `id` and produce the payload sent to the generator.
    ///
    /// # Errors
    ///
    /// Returns [`ItemError::NotFound`] for unknown assets,
    /// [`ItemError::NotAnImage`] for unsupported MIME types, and
    /// [`ItemError::Unreadable`] when the file cannot be loaded or decoded.
    pub async fn prepare(&self, id: AssetId) -> Result<EncodedImage, ItemError> {
        let asset = self
            .store
            .find_asset(id)
            .await
            .map_err(|err| {
                warn!(asset_id = id, error = %err, "asset lookup failed");
                ItemError::Unreadable {
                    message: err.to_string(),
                }
            })?
            .ok_or(ItemError::NotFound)?;
        if !asset.is_image() {
            return Err(ItemError::NotAnImage);
        }

        let bytes = self.store.read_image(&asset).await.map_err(|err| {
            warn!(asset_id = id, error = %err, "failed to read image file");
            ItemError::Unreadable {
                message: err.to_string(),
            }
        })?;
        let mime = if asset.is_svg() {
            SVG_MIME_TYPE
        } else {
            asset.mime.as_str()
        };
        self.normalizer
            .normalize(bytes, mime)
            .await
            .map_err(|err| {
                warn!(asset_id = id, error = %err, "failed to normalize image");
                ItemError::Unreadable {
                    message: format!("Failed to process image: {err}"),
                }
            })
    }

    /// Generate alt text for `id` without saving it.
    ///
    /// # Errors
    ///
    /// Returns any [`ItemProcessor::prepare`] failure, or the classified
    /// generator failure.
    pub async fn generate(&self, id: AssetId) -> Result<String, ItemError> {
        let image = self.prepare(id).await?;
        let text = self.gateway.generate_one(&image).await?;
        debug!(asset_id = id, "alt text generated");
        Ok(text)
    }

    /// Save generated `text` on the asset.
    ///
    /// # Errors
    ///
    /// Returns [`ItemError::SaveFailed`] when the catalog rejects the write.
    pub async fn persist(&self, id: AssetId, text: String) -> ItemOutcome {
        match self.store.write_alt_text(id, &text).await {
            Ok(()) => Ok(text),
            Err(err) => {
                warn!(asset_id = id, error = %err, "failed to save alt text");
                Err(ItemError::SaveFailed)
            }
        }
    }

    /// Generate and save alt text for `id`.
    ///
    /// # Errors
    ///
    /// Returns the first failure of generation or persistence.
    pub async fn process(&self, id: AssetId) -> ItemOutcome {
        let text = self.generate(id).await?;
        self.persist(id, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alttext_core::GenerationError;
    use alttext_test_support::{
        GatewayCall, MemoryAssetStore, PassthroughNormalizer, Reply, ScriptedGateway,
        document_asset, image_asset, svg_asset,
    };

    fn processor(store: MemoryAssetStore, gateway: Arc<ScriptedGateway>) -> ItemProcessor {
        ItemProcessor::new(Arc::new(store), Arc::new(PassthroughNormalizer), gateway)
    }

    #[tokio::test]
    async fn successful_items_are_saved() {
        let store = Arc::new(MemoryAssetStore::with_assets([image_asset(1)]));
        let gateway = Arc::new(ScriptedGateway::new());
        let processor = ItemProcessor::new(
            Arc::clone(&store) as Arc<dyn AssetStore>,
            Arc::new(PassthroughNormalizer),
            Arc::clone(&gateway) as Arc<dyn QuotaGateway>,
        );

        let text = processor.process(1).await.expect("generated");
        assert_eq!(text, ScriptedGateway::default_alt_text(1));
        assert_eq!(store.alt_text(1), Some(text));
        assert_eq!(gateway.calls(), vec![GatewayCall::One(1)]);
    }

    #[tokio::test]
    async fn lookup_failures_never_reach_the_gateway() {
        let gateway = Arc::new(ScriptedGateway::new());
        let processor = processor(
            MemoryAssetStore::with_assets([document_asset(9), image_asset(3)]).with_unreadable(3),
            Arc::clone(&gateway),
        );

        assert_eq!(processor.process(404).await, Err(ItemError::NotFound));
        assert_eq!(processor.process(9).await, Err(ItemError::NotAnImage));
        let unreadable = processor.process(3).await.expect_err("unreadable");
        assert!(unreadable.to_string().starts_with("Image file not found"));
        assert_eq!(gateway.generation_calls(), 0);
    }

    #[tokio::test]
    async fn svg_assets_keep_their_mime_type() {
        let processor = processor(
            MemoryAssetStore::with_assets([svg_asset(4)]),
            Arc::new(ScriptedGateway::new()),
        );
        let image = processor.prepare(4).await.expect("prepared");
        assert_eq!(image.mime, SVG_MIME_TYPE);
    }

    #[tokio::test]
    async fn quota_failures_are_classified() {
        let processor = processor(
            MemoryAssetStore::with_assets([image_asset(2)]),
            Arc::new(ScriptedGateway::new().with_reply(2, Reply::Quota)),
        );
        let err = processor.process(2).await.expect_err("quota");
        assert!(err.is_quota_exceeded());
        assert!(matches!(
            err,
            ItemError::Generation(GenerationError::QuotaExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn save_failures_are_reported() {
        let processor = processor(
            MemoryAssetStore::with_assets([image_asset(5)]).with_failing_write(5),
            Arc::new(ScriptedGateway::new()),
        );
        assert_eq!(processor.process(5).await, Err(ItemError::SaveFailed));
    }
}
