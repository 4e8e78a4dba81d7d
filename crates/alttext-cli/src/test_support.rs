//! Command test harness over in-memory fakes.

use std::sync::Arc;

use alttext_app::AppServices;
use alttext_config::{AppConfig, LicenseKey, MemorySettingsStore, PluginSettings, SettingsStore};
use alttext_core::QuotaGateway;
use alttext_gateway::LicensingClient;
use alttext_test_support::{MemoryAssetStore, PassthroughNormalizer, ScriptedGateway};

use crate::cli::OutputFormat;
use crate::client::CliContext;

pub(crate) const TEST_KEY: &str = "strapix_cli_test_key";
const UNROUTABLE_BASE_URL: &str = "http://127.0.0.1:9";

pub(crate) struct Harness {
    pub(crate) ctx: CliContext,
    pub(crate) store: Arc<MemoryAssetStore>,
    pub(crate) gateway: Arc<ScriptedGateway>,
    pub(crate) settings: Arc<MemorySettingsStore>,
}

pub(crate) struct HarnessBuilder {
    settings: PluginSettings,
    store: MemoryAssetStore,
    gateway: ScriptedGateway,
    base_url: String,
    output: OutputFormat,
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
            base_url: UNROUTABLE_BASE_URL.to_string(),
            output: OutputFormat::Json,
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

    pub(crate) fn with_store(mut self, store: MemoryAssetStore) -> Self {
        self.store = store;
        self
    }

    pub(crate) fn with_gateway(mut self, gateway: ScriptedGateway) -> Self {
        self.gateway = gateway;
        self
    }

    pub(crate) fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub(crate) const fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    pub(crate) fn build(self) -> Harness {
        let base_url = self.base_url;
        let config = AppConfig::from_lookup(|key| match key {
            "ALT_TEXT_BASE_URL" => Some(base_url.clone()),
            "ALT_TEXT_PROGRESS_RESET_MS" => Some("50".to_string()),
            _ => None,
        })
        .expect("config");

        let settings = Arc::new(MemorySettingsStore::new(self.settings));
        let store = Arc::new(self.store);
        let gateway = Arc::new(self.gateway);
        let licensing = LicensingClient::new(
            config.base_url.clone(),
            config.http_timeout,
            Arc::clone(&settings) as Arc<dyn SettingsStore>,
        )
        .expect("licensing client");

        let services = AppServices::assemble(
            config,
            Arc::clone(&settings) as Arc<dyn SettingsStore>,
            Arc::clone(&store),
            Arc::new(PassthroughNormalizer),
            licensing,
            Arc::clone(&gateway) as Arc<dyn QuotaGateway>,
        )
        .expect("services");

        Harness {
            ctx: CliContext::new(services, self.output),
            store,
            gateway,
            settings,
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
