//! Asset catalog endpoints.

use std::sync::Arc;

use alttext_core::{Asset, NewAsset};
use alttext_events::Event;
use axum::{Json, extract::State, http::StatusCode};
use tracing::{error, info};

use crate::http::errors::ApiError;
use crate::state::ApiState;

/// `GET /assets`.
pub(crate) async fn list_assets(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<Asset>>, ApiError> {
    state.catalog.list_assets().await.map(Json).map_err(|err| {
        error!(error = %err, "failed to list assets");
        ApiError::internal("failed to list assets")
    })
}

/// `POST /assets`: register an uploaded file and announce it so the
/// auto-tagging worker can pick it up.
pub(crate) async fn register_asset(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<NewAsset>,
) -> Result<(StatusCode, Json<Asset>), ApiError> {
    if request.url.trim().is_empty() {
        return Err(ApiError::bad_request("url is required"));
    }
    if request.mime.trim().is_empty() {
        return Err(ApiError::bad_request("mime is required"));
    }
    let asset = state.catalog.register_asset(request).await.map_err(|err| {
        error!(error = %err, "failed to register asset");
        ApiError::internal("failed to register asset")
    })?;
    info!(asset_id = asset.id, mime = %asset.mime, "asset registered");
    state.publish(Event::AssetRegistered {
        asset_id: asset.id,
        name: asset.name.clone(),
        mime: asset.mime.clone(),
    });
    Ok((StatusCode::CREATED, Json(asset)))
}
