//! Background worker that describes newly registered images.

use std::sync::Arc;

use alttext_bulk::ItemProcessor;
use alttext_config::SettingsStore;
use alttext_core::{AssetId, AssetStore};
use alttext_events::{Event, EventBus};
use alttext_gateway::{Feature, LicensingClient};
use alttext_telemetry::{GenerationOutcome, Metrics};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Why a registration was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The asset disappeared before the worker saw it.
    UnknownAsset,
    /// The MIME type is not a supported image type.
    NotAnImage,
    /// The asset already carries alt text.
    AlreadyDescribed,
    /// Auto-tagging is switched off.
    Disabled,
    /// No license key is stored.
    MissingLicenseKey,
    /// The subscription does not include auto-tagging.
    NotOnPlan,
}

/// Result of handling one registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoTagOutcome {
    /// Alt text was generated and saved.
    Tagged(String),
    /// The asset was not eligible.
    Skipped(SkipReason),
    /// Generation or persistence failed.
    Failed(String),
}

/// Generates alt text for images as they are registered.
///
/// Failures are logged and published as [`Event::AutoTagFailed`]; they never
/// reach the code that registered the asset.
pub struct AutoTagger {
    settings: Arc<dyn SettingsStore>,
    licensing: LicensingClient,
    store: Arc<dyn AssetStore>,
    processor: ItemProcessor,
    events: EventBus,
    metrics: Metrics,
}

impl AutoTagger {
    /// Build a worker over the given collaborators.
    #[must_use]
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        licensing: LicensingClient,
        store: Arc<dyn AssetStore>,
        processor: ItemProcessor,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        Self {
            settings,
            licensing,
            store,
            processor,
            events,
            metrics,
        }
    }

    /// Subscribe to registrations and handle them until the bus closes.
    ///
    /// The subscription is taken before the task starts, so assets registered
    /// after this call returns are never missed.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        let mut stream = self.events.subscribe(None);
        tokio::spawn(async move {
            while let Some(envelope) = stream.next().await {
                if let Event::AssetRegistered { asset_id, .. } = envelope.event {
                    let outcome = self.handle_registration(asset_id).await;
                    debug!(asset_id, ?outcome, "registration handled");
                }
            }
            debug!("auto-tagging worker stopped");
        })
    }

    /// Decide whether `asset_id` qualifies and, if so, describe it.
    pub async fn handle_registration(&self, asset_id: AssetId) -> AutoTagOutcome {
        if let Some(reason) = self.skip_reason(asset_id).await {
            return AutoTagOutcome::Skipped(reason);
        }

        match self.processor.process(asset_id).await {
            Ok(text) => {
                info!(asset_id, "auto-generated alt text");
                self.metrics.inc_generation(GenerationOutcome::Success);
                self.publish(Event::AutoTagged { asset_id });
                AutoTagOutcome::Tagged(text)
            }
            Err(err) => {
                let message = err.to_string();
                error!(asset_id, error = %message, "auto-tagging failed");
                let outcome = if err.is_quota_exceeded() {
                    GenerationOutcome::Quota
                } else {
                    GenerationOutcome::Failed
                };
                self.metrics.inc_generation(outcome);
                self.publish(Event::AutoTagFailed {
                    asset_id,
                    message: message.clone(),
                });
                AutoTagOutcome::Failed(message)
            }
        }
    }

    async fn skip_reason(&self, asset_id: AssetId) -> Option<SkipReason> {
        let asset = match self.store.find_asset(asset_id).await {
            Ok(Some(asset)) => asset,
            Ok(None) => return Some(SkipReason::UnknownAsset),
            Err(err) => {
                error!(asset_id, error = %err, "asset lookup failed during auto-tagging");
                return Some(SkipReason::UnknownAsset);
            }
        };
        if !asset.is_image() {
            return Some(SkipReason::NotAnImage);
        }
        if asset
            .alternative_text
            .as_deref()
            .is_some_and(|text| !text.is_empty())
        {
            return Some(SkipReason::AlreadyDescribed);
        }

        let settings = match self.settings.load().await {
            Ok(settings) => settings,
            Err(err) => {
                error!(asset_id, error = %err, "settings unavailable during auto-tagging");
                return Some(SkipReason::Disabled);
            }
        };
        if !settings.auto_tagging_enabled {
            return Some(SkipReason::Disabled);
        }
        if !settings.has_license_key() {
            warn!(asset_id, "auto-tagging skipped: no license key configured");
            return Some(SkipReason::MissingLicenseKey);
        }
        if !self.licensing.subscription().await.allows(Feature::AutoTagging) {
            return Some(SkipReason::NotOnPlan);
        }
        None
    }

    fn publish(&self, event: Event) {
        self.metrics.inc_event(event.kind());
        self.events.publish(event);
    }
}
