//! License key and feature toggle endpoints.

use std::sync::Arc;

use alttext_config::{LicenseKey, PluginSettings, SettingsPatch};
use alttext_events::Event;
use alttext_gateway::Feature;
use axum::{Json, extract::State};
use tracing::{info, warn};

use crate::http::errors::{ApiError, map_config_error};
use crate::models::{
    FeatureToggle, FeatureToggleRequest, FeatureToggleUpdated, LicenseStatus,
    SaveLicenseKeyRequest, SuccessResponse,
};
use crate::state::ApiState;

/// `GET /settings` and `GET /license-key`.
pub(crate) async fn license_status(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<LicenseStatus>, ApiError> {
    let settings = load_settings(&state).await?;
    Ok(Json(LicenseStatus {
        has_license_key: settings.license_key.is_some(),
    }))
}

/// `POST /license-key`.
pub(crate) async fn save_license_key(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SaveLicenseKeyRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let key = LicenseKey::parse(request.license_key.as_deref().unwrap_or_default())
        .map_err(|err| map_config_error(&err, "failed to validate license key"))?;
    info!(license = %key.log_prefix(), "storing license key");
    state
        .settings
        .update(SettingsPatch {
            license_key: Some(Some(key)),
            ..SettingsPatch::default()
        })
        .await
        .map_err(|err| map_config_error(&err, "failed to store license key"))?;
    state.publish(Event::SettingsChanged {
        description: "license key updated".to_string(),
    });
    Ok(Json(SuccessResponse { success: true }))
}

/// `DELETE /license-key`.
pub(crate) async fn delete_license_key(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state
        .settings
        .update(SettingsPatch {
            license_key: Some(None),
            ..SettingsPatch::default()
        })
        .await
        .map_err(|err| map_config_error(&err, "failed to remove license key"))?;
    info!("license key removed");
    state.publish(Event::SettingsChanged {
        description: "license key removed".to_string(),
    });
    Ok(Json(SuccessResponse { success: true }))
}

/// `GET /auto-tagging`.
pub(crate) async fn get_auto_tagging(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<FeatureToggle>, ApiError> {
    read_toggle(&state, Feature::AutoTagging).await.map(Json)
}

/// `POST /auto-tagging`.
pub(crate) async fn set_auto_tagging(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<FeatureToggleRequest>,
) -> Result<Json<FeatureToggleUpdated>, ApiError> {
    write_toggle(&state, Feature::AutoTagging, request.enabled)
        .await
        .map(Json)
}

/// `GET /bulk-processing`.
pub(crate) async fn get_bulk_processing(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<FeatureToggle>, ApiError> {
    read_toggle(&state, Feature::BulkProcessing).await.map(Json)
}

/// `POST /bulk-processing`.
pub(crate) async fn set_bulk_processing(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<FeatureToggleRequest>,
) -> Result<Json<FeatureToggleUpdated>, ApiError> {
    write_toggle(&state, Feature::BulkProcessing, request.enabled)
        .await
        .map(Json)
}

/// A toggle that is on but no longer covered by the plan is switched off.
async fn read_toggle(state: &ApiState, feature: Feature) -> Result<FeatureToggle, ApiError> {
    let settings = load_settings(state).await?;
    let mut enabled = toggle_value(&settings, feature);
    let available = state.licensing.subscription().await.allows(feature);
    if enabled && !available {
        warn!(feature = toggle_label(feature), "feature no longer on plan; disabling");
        store_toggle(state, feature, false).await?;
        enabled = false;
    }
    Ok(FeatureToggle { enabled, available })
}

async fn write_toggle(
    state: &ApiState,
    feature: Feature,
    enabled: Option<bool>,
) -> Result<FeatureToggleUpdated, ApiError> {
    let Some(enabled) = enabled else {
        return Err(ApiError::bad_request("enabled must be a boolean"));
    };
    if enabled && !state.licensing.subscription().await.allows(feature) {
        return Err(ApiError::forbidden(feature.unavailable_message()));
    }
    store_toggle(state, feature, enabled).await?;
    info!(feature = toggle_label(feature), enabled, "feature toggle updated");
    Ok(FeatureToggleUpdated {
        success: true,
        enabled,
    })
}

async fn store_toggle(state: &ApiState, feature: Feature, enabled: bool) -> Result<(), ApiError> {
    let patch = match feature {
        Feature::AutoTagging => SettingsPatch {
            auto_tagging_enabled: Some(enabled),
            ..SettingsPatch::default()
        },
        Feature::BulkProcessing => SettingsPatch {
            bulk_processing_parallel_enabled: Some(enabled),
            ..SettingsPatch::default()
        },
    };
    state
        .settings
        .update(patch)
        .await
        .map_err(|err| map_config_error(&err, "failed to store settings"))?;
    let verb = if enabled { "enabled" } else { "disabled" };
    state.publish(Event::SettingsChanged {
        description: format!("{} {verb}", toggle_label(feature)),
    });
    Ok(())
}

async fn load_settings(state: &ApiState) -> Result<PluginSettings, ApiError> {
    state
        .settings
        .load()
        .await
        .map_err(|err| map_config_error(&err, "failed to load settings"))
}

const fn toggle_value(settings: &PluginSettings, feature: Feature) -> bool {
    match feature {
        Feature::AutoTagging => settings.auto_tagging_enabled,
        Feature::BulkProcessing => settings.bulk_processing_parallel_enabled,
    }
}

const fn toggle_label(feature: Feature) -> &'static str {
    match feature {
        Feature::AutoTagging => "auto-tagging",
        Feature::BulkProcessing => "parallel bulk processing",
    }
}
