//! Asset builders.

use alttext_core::{Asset, AssetFormats, AssetId};

/// Bytes a [`crate::MemoryAssetStore`] serves for `id` unless overridden.
///
/// [`crate::ScriptedGateway`] recognises this payload to map images back to
/// their asset.
#[must_use]
pub fn asset_bytes(id: AssetId) -> Vec<u8> {
    format!("asset-{id}").into_bytes()
}

/// PNG asset with identifier `id`.
#[must_use]
pub fn image_asset(id: AssetId) -> Asset {
    Asset {
        id,
        name: format!("image-{id}.png"),
        mime: "image/png".to_string(),
        url: format!("/uploads/image-{id}.png"),
        formats: AssetFormats::default(),
        alternative_text: None,
    }
}

/// SVG asset with identifier `id`.
#[must_use]
pub fn svg_asset(id: AssetId) -> Asset {
    Asset {
        name: format!("vector-{id}.svg"),
        mime: "image/svg+xml".to_string(),
        url: format!("/uploads/vector-{id}.svg"),
        ..image_asset(id)
    }
}

/// Non-image asset with identifier `id`.
#[must_use]
pub fn document_asset(id: AssetId) -> Asset {
    Asset {
        name: format!("report-{id}.pdf"),
        mime: "application/pdf".to_string(),
        url: format!("/uploads/report-{id}.pdf"),
        ..image_asset(id)
    }
}
