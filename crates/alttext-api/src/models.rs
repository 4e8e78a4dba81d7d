//! Request and response bodies exchanged over the HTTP API.

use alttext_bulk::{ControllerState, RunProgress};
use alttext_core::{AssetId, ItemStatus, RunOutcome, RunSummary};
use serde::{Deserialize, Serialize};

/// RFC9457 problem document returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short summary of the problem class.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Occurrence-specific explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Offending request fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_params: Option<Vec<ProblemInvalidParam>>,
}

/// Invalid parameter pointer surfaced alongside a [`ProblemDetails`] payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemInvalidParam {
    /// JSON pointer into the request body.
    pub pointer: String,
    /// Why the value was rejected.
    pub message: String,
}

/// Body of `POST /generate`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Asset to describe.
    #[serde(default)]
    pub file_id: Option<AssetId>,
}

/// Response of `POST /generate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// Always `true`; failures are problem documents.
    pub success: bool,
    /// Generated and saved alt text.
    pub alt_text: String,
}

/// Body of `POST /generate-bulk`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBulkRequest {
    /// Assets to describe, in processing order.
    #[serde(default)]
    pub file_ids: Vec<AssetId>,
}

/// Per-asset entry of a bulk generation response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    /// Asset the entry belongs to.
    pub file_id: AssetId,
    /// Whether alt text was generated and saved.
    pub success: bool,
    /// Final status of the asset.
    pub status: ItemStatus,
    /// Saved alt text on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileResult {
    /// Project the entry for `id` out of a run outcome.
    #[must_use]
    pub fn from_outcome(id: AssetId, outcome: &RunOutcome) -> Self {
        let status = outcome.status(id);
        Self {
            file_id: id,
            success: status == ItemStatus::Success,
            status,
            alt_text: outcome.alt_texts.get(&id).cloned(),
            error: outcome.errors.get(&id).cloned(),
        }
    }
}

/// Response of `POST /generate-bulk`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBulkResponse {
    /// One entry per requested asset, in request order.
    pub results: Vec<FileResult>,
    /// Whether processing stopped on the usage quota.
    pub quota_exceeded: bool,
}

/// Body of `POST /runs`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// Assets to describe, in processing order.
    #[serde(default)]
    pub file_ids: Vec<AssetId>,
    /// Dispatch mode; the stored bulk-processing setting when omitted.
    #[serde(default)]
    pub parallel: Option<bool>,
}

/// Response of `POST /runs`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    /// Notification category.
    pub summary: RunSummary,
    /// Number of failed or skipped assets.
    pub error_count: usize,
    /// Full run outcome.
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

impl From<RunOutcome> for RunResponse {
    fn from(outcome: RunOutcome) -> Self {
        Self {
            summary: outcome.summary(),
            error_count: outcome.error_count(),
            outcome,
        }
    }
}

/// Response of `GET /runs`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatusResponse {
    /// Controller lifecycle state.
    pub state: ControllerState,
    /// Completion percentage of the current run.
    pub percent: u8,
    /// Progress of the current or most recent run.
    #[serde(flatten)]
    pub progress: RunProgress,
}

/// Whether a license key is stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LicenseStatus {
    /// `true` once a key has been saved.
    pub has_license_key: bool,
}

/// Body of `POST /license-key`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveLicenseKeyRequest {
    /// Key issued by the licensing service.
    #[serde(default)]
    pub license_key: Option<String>,
}

/// Generic acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuccessResponse {
    /// Always `true`.
    pub success: bool,
}

/// Current value of a plan-gated toggle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureToggle {
    /// Whether the toggle is on.
    pub enabled: bool,
    /// Whether the plan includes the feature.
    pub available: bool,
}

/// Body of the toggle update endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureToggleRequest {
    /// Requested value.
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Response of the toggle update endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureToggleUpdated {
    /// Always `true`.
    pub success: bool,
    /// Stored value.
    pub enabled: bool,
}

/// Response of `GET /pricing-info`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PricingInfo {
    /// Public pricing page.
    pub pricing_url: String,
    /// Account dashboard page.
    pub dashboard_url: String,
    /// Whether a license key is stored.
    pub has_license_key: bool,
}

/// Body of the billing session endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnUrlRequest {
    /// Where the billing provider sends the user afterwards.
    #[serde(default)]
    pub return_url: Option<String>,
}

/// A billing session URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UrlResponse {
    /// Session URL.
    pub url: String,
}

/// Query of `GET /usage/can-generate`.
#[derive(Debug, Clone, Deserialize)]
pub struct CanGenerateQuery {
    /// Number of generations about to be requested.
    #[serde(default = "default_generation_count")]
    pub count: u64,
}

const fn default_generation_count() -> u64 {
    1
}
