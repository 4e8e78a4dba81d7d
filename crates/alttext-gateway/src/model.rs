//! Wire types exchanged with the licensing service.

use alttext_core::{BatchItemResult, FREE_TIER_LIMIT, UsageSnapshot};
use serde::{Deserialize, Serialize};

/// Subscription state reported by the licensing service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Whether the license has ever had a subscription.
    pub has_subscription: bool,
    /// Whether the subscription is currently active.
    pub is_active: bool,
    /// Whether the subscription ends with the current period.
    pub cancel_at_period_end: bool,
    /// Billing provider status.
    pub status: Option<String>,
    /// Plan display name.
    pub plan_name: Option<String>,
    /// End of the current period as a unix timestamp.
    pub current_period_end: Option<i64>,
    /// Generations included per period.
    pub generations_limit: u64,
    /// Whether the plan includes auto-tagging.
    pub auto_tagging: bool,
    /// Whether the plan includes parallel bulk processing.
    pub bulk_processing: bool,
    /// Usage for the current period, when reported.
    #[serde(default)]
    pub usage: Option<UsageSnapshot>,
}

impl Subscription {
    /// Subscription assumed when no key is configured or the service is unreachable.
    #[must_use]
    pub const fn free_tier() -> Self {
        Self {
            has_subscription: false,
            is_active: false,
            cancel_at_period_end: false,
            status: None,
            plan_name: None,
            current_period_end: None,
            generations_limit: FREE_TIER_LIMIT,
            auto_tagging: false,
            bulk_processing: false,
            usage: None,
        }
    }

    /// Whether the subscription grants `feature`.
    #[must_use]
    pub const fn allows(&self, feature: Feature) -> bool {
        self.is_active
            && match feature {
                Feature::AutoTagging => self.auto_tagging,
                Feature::BulkProcessing => self.bulk_processing,
            }
    }
}

/// Plan-gated features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Alt text for newly registered images.
    AutoTagging,
    /// Chunked batch calls during bulk runs.
    BulkProcessing,
}

impl Feature {
    /// Message shown when the feature is not part of the plan.
    #[must_use]
    pub const fn unavailable_message(self) -> &'static str {
        match self {
            Self::AutoTagging => "Auto-tagging feature is not available on your current plan",
            Self::BulkProcessing => {
                "Bulk processing feature is not available on your current plan"
            }
        }
    }
}

/// Counters returned after incrementing usage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageIncrement {
    /// Generations consumed after the increment.
    pub used: u64,
    /// Generations allowed in the period.
    pub limit: u64,
    /// Generations left in the period.
    pub remaining: u64,
}

/// Whether a number of generations still fits in the allowance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationAllowance {
    /// Whether the requested count fits.
    pub allowed: bool,
    /// Generations left in the period.
    pub remaining: u64,
}

impl GenerationAllowance {
    /// Evaluate `count` against `usage`.
    #[must_use]
    pub const fn evaluate(usage: &UsageSnapshot, count: u64) -> Self {
        Self {
            allowed: usage.allows(count),
            remaining: usage.remaining(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateRequest<'a> {
    pub(crate) image: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateResponse {
    pub(crate) alt_text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchRequest<'a> {
    pub(crate) images: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchResponse {
    pub(crate) results: Vec<BatchItemResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReturnUrlRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) return_url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct IncrementRequest {
    pub(crate) count: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UrlResponse {
    pub(crate) url: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub(crate) error: Option<String>,
}
