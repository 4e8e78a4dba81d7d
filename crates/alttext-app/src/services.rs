//! Service graph shared by the server binary and the operator CLI.

use std::sync::Arc;

use alttext_api::ApiState;
use alttext_bulk::{BulkController, Dispatcher, ItemProcessor};
use alttext_config::{AppConfig, ConfigResult, FileSettingsStore, SettingsPatch, SettingsStore};
use alttext_core::{AssetCatalog, AssetStore, ImageNormalizer, QuotaGateway};
use alttext_events::EventBus;
use alttext_gateway::LicensingClient;
use alttext_media::{FsAssetStore, JpegNormalizer};
use alttext_telemetry::Metrics;
use tracing::{debug, info};
use uuid::Uuid;

use crate::autotag::AutoTagger;
use crate::error::{AppError, AppResult};

/// Fully wired collaborators for one process.
#[derive(Clone)]
pub struct AppServices {
    /// Process configuration the services were built from.
    pub config: AppConfig,
    /// Persisted plugin settings.
    pub settings: Arc<dyn SettingsStore>,
    /// Asset catalog.
    pub catalog: Arc<dyn AssetCatalog>,
    /// Licensing and billing client.
    pub licensing: LicensingClient,
    /// Bulk run controller.
    pub controller: BulkController,
    /// Event bus shared by every component.
    pub events: EventBus,
    /// Prometheus registry.
    pub metrics: Metrics,
}

impl AppServices {
    /// Open the file-backed stores under the configured data directory and
    /// wire the production collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error when the settings or asset catalog cannot be read,
    /// or the licensing client or metrics registry cannot be built.
    pub async fn open(config: AppConfig) -> AppResult<Self> {
        let settings: Arc<dyn SettingsStore> =
            Arc::new(FileSettingsStore::new(config.settings_path()));
        let instance_id = ensure_instance_id(settings.as_ref())
            .await
            .map_err(|err| AppError::config("settings.instance_id", err))?;
        debug!(%instance_id, "instance identity loaded");

        let catalog = Arc::new(
            FsAssetStore::open(config.catalog_path(), config.public_dir())
                .await
                .map_err(|err| AppError::media("catalog.open", err))?,
        );
        let licensing = LicensingClient::new(
            config.base_url.clone(),
            config.http_timeout,
            Arc::clone(&settings),
        )
        .map_err(|err| AppError::gateway("licensing.new", err))?;
        let gateway: Arc<dyn QuotaGateway> = Arc::new(licensing.clone());

        Self::assemble(
            config,
            settings,
            catalog,
            Arc::new(JpegNormalizer::default()),
            licensing,
            gateway,
        )
    }

    /// Wire the orchestration stack over explicit collaborators.
    ///
    /// `gateway` performs generation; `licensing` serves subscription and
    /// billing lookups. Production passes the same client for both.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Telemetry`] if the metrics registry cannot be built.
    pub fn assemble<C>(
        config: AppConfig,
        settings: Arc<dyn SettingsStore>,
        catalog: Arc<C>,
        normalizer: Arc<dyn ImageNormalizer>,
        licensing: LicensingClient,
        gateway: Arc<dyn QuotaGateway>,
    ) -> AppResult<Self>
    where
        C: AssetCatalog + 'static,
    {
        let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        let events = EventBus::new();

        let processor = ItemProcessor::new(
            Arc::clone(&catalog) as Arc<dyn AssetStore>,
            normalizer,
            gateway,
        );
        let controller = BulkController::new(
            Dispatcher::new(processor),
            Arc::clone(&settings),
            events.clone(),
            metrics.clone(),
            config.progress_reset_delay,
        );

        Ok(Self {
            config,
            settings,
            catalog: catalog as Arc<dyn AssetCatalog>,
            licensing,
            controller,
            events,
            metrics,
        })
    }

    /// Auto-tagging worker over these services.
    #[must_use]
    pub fn auto_tagger(&self) -> AutoTagger {
        AutoTagger::new(
            Arc::clone(&self.settings),
            self.licensing.clone(),
            Arc::clone(&self.catalog) as Arc<dyn AssetStore>,
            self.controller.dispatcher().processor().clone(),
            self.events.clone(),
            self.metrics.clone(),
        )
    }

    /// Request-handler state for the HTTP API.
    #[must_use]
    pub fn api_state(&self) -> ApiState {
        ApiState::new(
            Arc::clone(&self.settings),
            self.licensing.clone(),
            self.controller.clone(),
            Arc::clone(&self.catalog),
            self.events.clone(),
            self.metrics.clone(),
            self.config.max_bulk_items,
        )
    }
}

/// Return the persisted instance identifier, generating one on first boot.
///
/// # Errors
///
/// Returns the settings store failure when the settings cannot be read or
/// the new identifier cannot be saved.
pub async fn ensure_instance_id(settings: &dyn SettingsStore) -> ConfigResult<Uuid> {
    if let Some(id) = settings.load().await?.instance_id {
        return Ok(id);
    }
    let id = Uuid::new_v4();
    settings
        .update(SettingsPatch {
            instance_id: Some(id),
            ..SettingsPatch::default()
        })
        .await?;
    info!(instance_id = %id, "generated new instance id");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alttext_config::{LicenseKey, MemorySettingsStore, PluginSettings};
    use alttext_core::NewAsset;
    use alttext_test_support::{MemoryAssetStore, image_asset};
    use tempfile::TempDir;

    fn config_for(dir: &TempDir) -> AppConfig {
        let data_dir = dir.path().to_string_lossy().into_owned();
        AppConfig::from_lookup(move |key| {
            (key == "ALT_TEXT_DATA_DIR").then(|| data_dir.clone())
        })
        .expect("config")
    }

    #[tokio::test]
    async fn instance_id_is_generated_once() {
        let store = MemorySettingsStore::default();
        let first = ensure_instance_id(&store).await.expect("generated");
        let second = ensure_instance_id(&store).await.expect("loaded");
        assert_eq!(first, second);
        assert_eq!(
            store.load().await.expect("settings").instance_id,
            Some(first)
        );
    }

    #[tokio::test]
    async fn existing_instance_id_is_kept() {
        let existing = Uuid::new_v4();
        let store = MemorySettingsStore::new(PluginSettings {
            instance_id: Some(existing),
            ..PluginSettings::default()
        });
        assert_eq!(ensure_instance_id(&store).await.expect("loaded"), existing);
    }

    #[tokio::test]
    async fn open_persists_identity_under_the_data_dir() {
        let dir = TempDir::new().expect("tempdir");
        let config = config_for(&dir);

        let services = AppServices::open(config.clone()).await.expect("services");
        let id = services
            .settings
            .load()
            .await
            .expect("settings")
            .instance_id
            .expect("instance id");
        assert!(config.settings_path().exists());

        let reopened = AppServices::open(config).await.expect("reopened");
        let again = reopened.settings.load().await.expect("settings").instance_id;
        assert_eq!(again, Some(id));
    }

    #[tokio::test]
    async fn api_state_shares_the_catalog() {
        let dir = TempDir::new().expect("tempdir");
        let config = config_for(&dir);
        let settings: Arc<dyn SettingsStore> = Arc::new(MemorySettingsStore::with_license_key(
            LicenseKey::parse("strapix_app_key").expect("key"),
        ));
        let catalog = Arc::new(MemoryAssetStore::with_assets([image_asset(1)]));
        let licensing = LicensingClient::new(
            config.base_url.clone(),
            config.http_timeout,
            Arc::clone(&settings),
        )
        .expect("licensing");
        let gateway: Arc<dyn QuotaGateway> = Arc::new(licensing.clone());
        let services = AppServices::assemble(
            config,
            settings,
            Arc::clone(&catalog),
            Arc::new(alttext_test_support::PassthroughNormalizer),
            licensing,
            gateway,
        )
        .expect("services");

        let registered = services
            .catalog
            .register_asset(NewAsset {
                name: "pier.png".to_string(),
                mime: "image/png".to_string(),
                url: "/uploads/pier.png".to_string(),
                formats: alttext_core::AssetFormats::default(),
            })
            .await
            .expect("registered");
        assert_eq!(registered.id, 2);
        assert_eq!(catalog.list_assets().await.expect("assets").len(), 2);
        let _state = services.api_state();
    }
}
