//! Subscription, usage, and billing session endpoints.

use std::sync::Arc;

use alttext_core::UsageSnapshot;
use alttext_gateway::{GenerationAllowance, Subscription};
use axum::{
    Json,
    extract::{Query, State},
};
use tracing::warn;

use crate::http::errors::{ApiError, map_gateway_error};
use crate::models::{CanGenerateQuery, PricingInfo, ReturnUrlRequest, UrlResponse};
use crate::state::ApiState;

/// `GET /subscription`: never fails; the free tier stands in for errors.
pub(crate) async fn subscription(State(state): State<Arc<ApiState>>) -> Json<Subscription> {
    Json(state.licensing.subscription().await)
}

/// `GET /usage`: never fails; the free-tier allowance stands in for errors.
pub(crate) async fn usage(State(state): State<Arc<ApiState>>) -> Json<UsageSnapshot> {
    Json(state.licensing.usage_with_limits().await)
}

/// `GET /usage/can-generate?count=N`.
pub(crate) async fn can_generate(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<CanGenerateQuery>,
) -> Json<GenerationAllowance> {
    Json(state.licensing.can_generate(query.count).await)
}

/// `GET /pricing-info`.
pub(crate) async fn pricing_info(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<PricingInfo>, ApiError> {
    let has_license_key = state
        .licensing
        .has_license_key()
        .await
        .map_err(|err| map_gateway_error(&err))?;
    Ok(Json(PricingInfo {
        pricing_url: state.licensing.pricing_url(),
        dashboard_url: state.licensing.dashboard_url(),
        has_license_key,
    }))
}

/// `POST /customer-portal`.
pub(crate) async fn customer_portal(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ReturnUrlRequest>,
) -> Result<Json<UrlResponse>, ApiError> {
    let Some(return_url) = request.return_url.filter(|url| !url.trim().is_empty()) else {
        return Err(ApiError::bad_request("returnUrl is required"));
    };
    match state.licensing.portal_url(&return_url).await {
        Ok(url) => Ok(Json(UrlResponse { url })),
        Err(err) => {
            warn!(error = %err, detail = %err.user_message(), "failed to create customer portal session");
            Err(map_gateway_error(&err))
        }
    }
}

/// `POST /checkout`.
pub(crate) async fn checkout(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ReturnUrlRequest>,
) -> Result<Json<UrlResponse>, ApiError> {
    match state
        .licensing
        .checkout_url(request.return_url.as_deref())
        .await
    {
        Ok(url) => Ok(Json(UrlResponse { url })),
        Err(err) => {
            warn!(error = %err, detail = %err.user_message(), "failed to get checkout URL");
            Err(map_gateway_error(&err))
        }
    }
}
