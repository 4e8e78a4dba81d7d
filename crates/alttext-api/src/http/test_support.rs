//! Handler test harness wiring the API state over in-memory fakes.

use std::sync::Arc;
use std::time::Duration;

use alttext_bulk::{BulkController, Dispatcher, ItemProcessor};
use alttext_config::{LicenseKey, MemorySettingsStore, PluginSettings, SettingsStore};
use alttext_core::{AssetCatalog, AssetStore, QuotaGateway};
use alttext_events::EventBus;
use alttext_gateway::LicensingClient;
use alttext_telemetry::Metrics;
use alttext_test_support::{MemoryAssetStore, PassthroughNormalizer, ScriptedGateway};

use crate::state::ApiState;

pub(crate) const TEST_KEY: &str = "strapix_api_test_key";
const UNROUTABLE_BASE_URL: &str = "http://127.0.0.1:9";

pub(crate) struct Harness {
    pub(crate) state: Arc<ApiState>,
    pub(crate) store: Arc<MemoryAssetStore>,
    pub(crate) gateway: Arc<ScriptedGateway>,
    pub(crate) settings: Arc<MemorySettingsStore>,
    pub(crate) events: EventBus,
}

pub(crate) struct HarnessBuilder {
    settings: PluginSettings,
    store: MemoryAssetStore,
    gateway: ScriptedGateway,
    licensing_base_url: String,
    max_bulk_items: usize,
}

impl HarnessBuilder {
    pub(crate) fn new() -> Self {
        Self {
            settings: PluginSettings {
                license_key: Some(LicenseKey::parse(TEST_KEY).expect("test key")),
                ..PluginSettings::default()
            },
            store: MemoryAssetStore::default(),
            gateway: ScriptedGateway::new(),
            licensing_base_url: UNROUTABLE_BASE_URL.to_string(),
            max_bulk_items: 10,
        }
    }

    pub(crate) fn without_license_key(mut self) -> Self {
        self.settings.license_key = None;
        self
    }

    pub(crate) fn with_settings(mut self, settings: PluginSettings) -> Self {
        self.settings = settings;
        self
    }

    pub(crate) fn with_parallel_processing(mut self) -> Self {
        self.settings.bulk_processing_parallel_enabled = true;
        self
    }

    pub(crate) fn with_store(mut self, store: MemoryAssetStore) -> Self {
        self.store = store;
        self
    }

    pub(crate) fn with_gateway(mut self, gateway: ScriptedGateway) -> Self {
        self.gateway = gateway;
        self
    }

    pub(crate) fn with_licensing_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.licensing_base_url = base_url.into();
        self
    }

    pub(crate) fn with_max_bulk_items(mut self, max: usize) -> Self {
        self.max_bulk_items = max;
        self
    }

    pub(crate) fn build(self) -> Harness {
        let settings = Arc::new(MemorySettingsStore::new(self.settings));
        let store = Arc::new(self.store);
        let gateway = Arc::new(self.gateway);
        let events = EventBus::new();
        let metrics = Metrics::new().expect("metrics");

        let processor = ItemProcessor::new(
            Arc::clone(&store) as Arc<dyn AssetStore>,
            Arc::new(PassthroughNormalizer),
            Arc::clone(&gateway) as Arc<dyn QuotaGateway>,
        );
        let controller = BulkController::new(
            Dispatcher::new(processor),
            Arc::clone(&settings) as Arc<dyn SettingsStore>,
            events.clone(),
            metrics.clone(),
            Duration::from_secs(3),
        );
        let licensing = LicensingClient::new(
            self.licensing_base_url.parse().expect("base url"),
            Duration::from_secs(5),
            Arc::clone(&settings) as Arc<dyn SettingsStore>,
        )
        .expect("licensing client");

        let state = Arc::new(ApiState::new(
            Arc::clone(&settings) as Arc<dyn SettingsStore>,
            licensing,
            controller,
            Arc::clone(&store) as Arc<dyn AssetCatalog>,
            events.clone(),
            metrics,
            self.max_bulk_items,
        ));

        Harness {
            state,
            store,
            gateway,
            settings,
            events,
        }
    }
}

pub(crate) fn active_subscription(auto_tagging: bool, bulk_processing: bool) -> serde_json::Value {
    serde_json::json!({
        "hasSubscription": true,
        "isActive": true,
        "cancelAtPeriodEnd": false,
        "status": "active",
        "planName": "Pro",
        "currentPeriodEnd": 1_767_225_600,
        "generationsLimit": 500,
        "autoTagging": auto_tagging,
        "bulkProcessing": bulk_processing
    })
}
