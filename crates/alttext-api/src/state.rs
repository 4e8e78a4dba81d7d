//! Shared dependencies handed to every request handler.

use std::sync::Arc;

use alttext_bulk::BulkController;
use alttext_config::SettingsStore;
use alttext_core::AssetCatalog;
use alttext_events::{Event, EventBus, EventId};
use alttext_gateway::LicensingClient;
use alttext_telemetry::Metrics;

/// Application state shared by the router.
pub struct ApiState {
    pub(crate) settings: Arc<dyn SettingsStore>,
    pub(crate) licensing: LicensingClient,
    pub(crate) controller: BulkController,
    pub(crate) catalog: Arc<dyn AssetCatalog>,
    pub(crate) events: EventBus,
    pub(crate) telemetry: Metrics,
    pub(crate) max_bulk_items: usize,
}

impl ApiState {
    /// Bundle the service dependencies.
    ///
    /// `max_bulk_items` caps the number of assets accepted by a single
    /// `/generate-bulk` request.
    #[must_use]
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        licensing: LicensingClient,
        controller: BulkController,
        catalog: Arc<dyn AssetCatalog>,
        events: EventBus,
        telemetry: Metrics,
        max_bulk_items: usize,
    ) -> Self {
        Self {
            settings,
            licensing,
            controller,
            catalog,
            events,
            telemetry,
            max_bulk_items,
        }
    }

    pub(crate) fn publish(&self, event: Event) -> EventId {
        self.telemetry.inc_event(event.kind());
        self.events.publish(event)
    }
}
