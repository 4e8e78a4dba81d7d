//! Single-asset and bulk generation endpoints.

use std::sync::Arc;

use alttext_core::SelectionSet;
use axum::{Json, extract::State};
use tracing::{info, warn};

use crate::http::errors::{ApiError, map_config_error, map_gateway_error, map_item_error};
use crate::models::{
    FileResult, GenerateBulkRequest, GenerateBulkResponse, GenerateRequest, GenerateResponse,
};
use crate::state::ApiState;

/// `POST /generate`: generate and save alt text for one asset.
pub(crate) async fn generate(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Some(file_id) = request.file_id.filter(|id| *id > 0) else {
        return Err(ApiError::bad_request("fileId is required"));
    };
    require_license_key(&state).await?;

    let processor = state.controller.dispatcher().processor();
    match processor.process(file_id).await {
        Ok(alt_text) => {
            info!(asset_id = file_id, "alt text generated");
            Ok(Json(GenerateResponse {
                success: true,
                alt_text,
            }))
        }
        Err(err) => {
            warn!(asset_id = file_id, error = %err, "alt text generation failed");
            Err(map_item_error(&err))
        }
    }
}

/// `POST /generate-bulk`: process a bounded list of assets in the configured
/// dispatch mode and report every asset's result.
pub(crate) async fn generate_bulk(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<GenerateBulkRequest>,
) -> Result<Json<GenerateBulkResponse>, ApiError> {
    if request.file_ids.is_empty() {
        return Err(ApiError::bad_request("fileIds array is required"));
    }
    if request.file_ids.len() > state.max_bulk_items {
        return Err(ApiError::bad_request(format!(
            "Maximum {} images allowed per request",
            state.max_bulk_items
        )));
    }
    require_license_key(&state).await?;

    let parallel = state
        .settings
        .load()
        .await
        .map_err(|err| map_config_error(&err, "failed to load settings"))?
        .bulk_processing_parallel_enabled;
    let selection = SelectionSet::new(request.file_ids);
    let outcome = state.controller.process_batch(&selection, parallel).await;
    info!(
        requested = selection.len(),
        success_count = outcome.success_count,
        error_count = outcome.error_count(),
        parallel,
        "bulk request processed"
    );

    let results = selection
        .ids()
        .iter()
        .map(|id| FileResult::from_outcome(*id, &outcome))
        .collect();
    Ok(Json(GenerateBulkResponse {
        results,
        quota_exceeded: outcome.quota_exceeded,
    }))
}

async fn require_license_key(state: &ApiState) -> Result<(), ApiError> {
    let present = state
        .licensing
        .has_license_key()
        .await
        .map_err(|err| map_gateway_error(&err))?;
    if present {
        Ok(())
    } else {
        Err(ApiError::bad_request("License key not configured"))
    }
}
