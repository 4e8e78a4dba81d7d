//! Domain DTOs shared by the bulk orchestrator, the gateway, and the catalog.

use std::collections::BTreeMap;

use alttext_events::{AssetId, ItemStatus, RunSummary};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// MIME types accepted for alt-text generation.
pub const SUPPORTED_IMAGE_MIME_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];

/// MIME type of vector images, which are forwarded without re-encoding.
pub const SVG_MIME_TYPE: &str = "image/svg+xml";

/// Number of assets submitted per remote batch call in parallel mode.
pub const CHUNK_SIZE: usize = 5;

/// Generations allowed per period when no subscription is known.
pub const FREE_TIER_LIMIT: u64 = 10;

/// Rendition URL attached to an asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetFormat {
    /// Location of the rendition.
    pub url: String,
}

/// Optional preview renditions produced by the host for an asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AssetFormats {
    /// Smallest rendition, preferred for previews.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<AssetFormat>,
    /// Small rendition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small: Option<AssetFormat>,
}

/// Media asset stored by the host catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Catalog identifier.
    pub id: AssetId,
    /// Display name.
    pub name: String,
    /// MIME type reported at upload time.
    pub mime: String,
    /// Location of the original file.
    pub url: String,
    /// Preview renditions, when the host produced any.
    #[serde(default)]
    pub formats: AssetFormats,
    /// Current alt text, if any.
    #[serde(default)]
    pub alternative_text: Option<String>,
}

impl Asset {
    /// Whether the asset's MIME type is eligible for generation.
    #[must_use]
    pub fn is_image(&self) -> bool {
        is_supported_image(&self.mime)
    }

    /// Whether the asset is a vector image.
    #[must_use]
    pub fn is_svg(&self) -> bool {
        self.mime == SVG_MIME_TYPE || self.url.to_ascii_lowercase().ends_with(".svg")
    }

    /// Best URL for a preview: thumbnail, then small, then the original.
    #[must_use]
    pub fn preview_url(&self) -> &str {
        self.formats
            .thumbnail
            .as_ref()
            .or(self.formats.small.as_ref())
            .map_or(self.url.as_str(), |format| format.url.as_str())
    }
}

/// Whether `mime` is one of the supported image types.
#[must_use]
pub fn is_supported_image(mime: &str) -> bool {
    SUPPORTED_IMAGE_MIME_TYPES.contains(&mime)
}

/// Ordered, duplicate-free set of asset identifiers chosen for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<AssetId>", into = "Vec<AssetId>")]
pub struct SelectionSet {
    ids: Vec<AssetId>,
}

impl SelectionSet {
    /// Build a selection, keeping the first occurrence of each identifier.
    #[must_use]
    pub fn new(ids: impl IntoIterator<Item = AssetId>) -> Self {
        let mut selection = Self::default();
        for id in ids {
            selection.insert(id);
        }
        selection
    }

    /// Add an identifier; returns `false` when it was already selected.
    pub fn insert(&mut self, id: AssetId) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Remove an identifier; returns `true` when it was selected.
    pub fn remove(&mut self, id: AssetId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|candidate| *candidate != id);
        before != self.ids.len()
    }

    /// Selected identifiers in selection order.
    #[must_use]
    pub fn ids(&self) -> &[AssetId] {
        &self.ids
    }

    /// Whether `id` is selected.
    #[must_use]
    pub fn contains(&self, id: AssetId) -> bool {
        self.ids.contains(&id)
    }

    /// Number of selected identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Split the selection into consecutive chunks of at most `size` ids.
    ///
    /// A `size` of zero is treated as one.
    #[must_use]
    pub fn chunks(&self, size: usize) -> Vec<Chunk> {
        self.ids
            .chunks(size.max(1))
            .enumerate()
            .map(|(index, ids)| Chunk {
                index,
                ids: ids.to_vec(),
            })
            .collect()
    }
}

impl From<Vec<AssetId>> for SelectionSet {
    fn from(ids: Vec<AssetId>) -> Self {
        Self::new(ids)
    }
}

impl From<SelectionSet> for Vec<AssetId> {
    fn from(selection: SelectionSet) -> Self {
        selection.ids
    }
}

/// Consecutive slice of a selection submitted as one remote batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    index: usize,
    ids: Vec<AssetId>,
}

impl Chunk {
    /// Position of the chunk within the selection.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Identifiers in the chunk, in selection order.
    #[must_use]
    pub fn ids(&self) -> &[AssetId] {
        &self.ids
    }

    /// Number of identifiers in the chunk.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the chunk carries no identifiers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Image payload prepared for the remote generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// MIME type of the encoded bytes.
    pub mime: String,
    /// Base64 payload (standard alphabet, padded).
    pub base64: String,
}

impl EncodedImage {
    /// Render the payload as a `data:` URL.
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.base64)
    }
}

/// One element of a remote batch response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemResult {
    /// Whether the remote generated text for this image.
    pub success: bool,
    /// Generated alt text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Usage counters for the current billing period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    /// Generations consumed in the period.
    pub used: u64,
    /// Generations allowed in the period.
    pub limit: u64,
    /// Start of the period.
    pub period_start: DateTime<Utc>,
    /// End of the period.
    pub period_end: DateTime<Utc>,
}

impl UsageSnapshot {
    /// Free-tier snapshot covering the calendar month containing `now`.
    #[must_use]
    pub fn free_tier(now: DateTime<Utc>) -> Self {
        let (period_start, period_end) = month_bounds(now);
        Self {
            used: 0,
            limit: FREE_TIER_LIMIT,
            period_start,
            period_end,
        }
    }

    /// Generations left in the period.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    /// Whether the period's allowance is spent.
    #[must_use]
    pub const fn is_limit_reached(&self) -> bool {
        self.used >= self.limit
    }

    /// Whether `count` more generations fit in the allowance.
    #[must_use]
    pub const fn allows(&self, count: u64) -> bool {
        self.remaining() >= count
    }
}

fn month_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let (year, month) = (now.year(), now.month());
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let start = Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let end = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    (start, end)
}

/// Aggregate result of a bulk run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    /// Number of assets whose alt text was generated and saved.
    pub success_count: usize,
    /// Failure message per failed or skipped asset.
    pub errors: BTreeMap<AssetId, String>,
    /// Generated alt text per successful asset.
    pub alt_texts: BTreeMap<AssetId, String>,
    /// Final status per selected asset.
    pub statuses: BTreeMap<AssetId, ItemStatus>,
    /// Whether the run stopped because the usage quota was exhausted.
    pub quota_exceeded: bool,
}

impl RunOutcome {
    /// Number of failed or skipped assets.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Notification category for the run.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_counts(self.success_count, self.error_count())
    }

    /// Status recorded for `id`, or `Idle` when it was not part of the run.
    #[must_use]
    pub fn status(&self, id: AssetId) -> ItemStatus {
        self.statuses.get(&id).copied().unwrap_or_default()
    }
}
