//! Event payload types carried across the alt-text platform.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identifier assigned to each event emitted by the platform.
pub type EventId = u64;

/// Identifier of a media asset as stored by the host catalog.
pub type AssetId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed domain events surfaced across the system.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A bulk run passed validation and began dispatching work.
    RunStarted {
        /// Identifier for the run.
        run_id: Uuid,
        /// Number of selected assets in the run.
        total: usize,
        /// Whether chunked parallel dispatch was used.
        parallel: bool,
    },
    /// An item inside a run changed status.
    ItemStatusChanged {
        /// Identifier for the run the item belongs to.
        run_id: Uuid,
        /// Asset whose status changed.
        asset_id: AssetId,
        /// Updated status.
        status: ItemStatus,
        /// Failure message when the item failed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// A bulk run finished and produced a summary notification.
    RunCompleted {
        /// Identifier for the run.
        run_id: Uuid,
        /// Number of assets that received alt text.
        success_count: usize,
        /// Number of assets that failed or were not attempted.
        error_count: usize,
        /// Whether the run stopped because the usage quota was exhausted.
        quota_exceeded: bool,
        /// Notification category for the summary.
        summary: RunSummary,
    },
    /// Per-run progress indicators were cleared after the display delay.
    ProgressReset {
        /// Identifier for the run whose progress was cleared.
        run_id: Uuid,
    },
    /// A run request was rejected before any work started.
    RunRejected {
        /// Human-readable rejection reason.
        reason: String,
    },
    /// The usage quota is exhausted and the operator should upgrade.
    UpgradeRequired {
        /// Generations used in the current period, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        used: Option<u64>,
        /// Generations allowed in the current period, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<u64>,
    },
    /// The cached usage snapshot was refreshed from the remote service.
    UsageRefreshed {
        /// Generations used in the current period.
        used: u64,
        /// Generations allowed in the current period.
        limit: u64,
    },
    /// A new asset was registered with the catalog.
    AssetRegistered {
        /// Identifier for the new asset.
        asset_id: AssetId,
        /// Display name of the asset.
        name: String,
        /// MIME type reported for the asset.
        mime: String,
    },
    /// Alt text was generated automatically for a newly registered asset.
    AutoTagged {
        /// Identifier for the tagged asset.
        asset_id: AssetId,
    },
    /// Automatic tagging failed for a newly registered asset.
    AutoTagFailed {
        /// Identifier for the asset.
        asset_id: AssetId,
        /// Failure message.
        message: String,
    },
    /// Plugin settings were updated.
    SettingsChanged {
        /// Short description of the change.
        description: String,
    },
}

impl Event {
    /// Machine-friendly discriminator for the event type.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::ItemStatusChanged { .. } => "item_status_changed",
            Self::RunCompleted { .. } => "run_completed",
            Self::ProgressReset { .. } => "progress_reset",
            Self::RunRejected { .. } => "run_rejected",
            Self::UpgradeRequired { .. } => "upgrade_required",
            Self::UsageRefreshed { .. } => "usage_refreshed",
            Self::AssetRegistered { .. } => "asset_registered",
            Self::AutoTagged { .. } => "auto_tagged",
            Self::AutoTagFailed { .. } => "auto_tag_failed",
            Self::SettingsChanged { .. } => "settings_changed",
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier for the event.
    pub id: EventId,
    /// Timestamp when the event was emitted.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}

/// Per-item status within a bulk run.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Not part of any run yet.
    #[default]
    Idle,
    /// Selected and waiting for a result.
    Pending,
    /// Alt text was generated and saved.
    Success,
    /// Generation failed or was not attempted.
    Failed,
}

impl ItemStatus {
    /// Whether the status is final for the current run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// Notification category attached to a completed run.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunSummary {
    /// At least one item succeeded.
    Success,
    /// Nothing succeeded and at least one item failed.
    Warning,
    /// Nothing succeeded and nothing failed.
    Info,
}

impl RunSummary {
    /// Derive the category from the success and error counts of a run.
    #[must_use]
    pub const fn from_counts(success_count: usize, error_count: usize) -> Self {
        if success_count > 0 {
            Self::Success
        } else if error_count > 0 {
            Self::Warning
        } else {
            Self::Info
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}
