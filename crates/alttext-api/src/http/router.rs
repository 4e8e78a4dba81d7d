//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use alttext_telemetry::{build_sha, propagate_request_id_layer, set_request_id_layer};
use axum::{
    Router,
    http::{HeaderName, Method, Request, header::CONTENT_TYPE},
    middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::http::assets::{list_assets, register_asset};
use crate::http::billing::{
    can_generate, checkout, customer_portal, pricing_info, subscription, usage,
};
use crate::http::constants::{HEADER_LAST_EVENT_ID, HEADER_REQUEST_ID};
use crate::http::errors::{ServeError, ServeResult};
use crate::http::generation::{generate, generate_bulk};
use crate::http::health::{health, metrics};
use crate::http::runs::{run_status, start_run};
use crate::http::settings::{
    delete_license_key, get_auto_tagging, get_bulk_processing, license_status, save_license_key,
    set_auto_tagging, set_bulk_processing,
};
use crate::http::sse::stream_events;
use crate::http::observe::observe_request;
use crate::state::ApiState;

/// Axum router wrapper that hosts the alt-text API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Build the router over the shared application state.
    #[must_use]
    pub fn new(state: ApiState) -> Self {
        let state = Arc::new(state);

        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE, HeaderName::from_static(HEADER_LAST_EVENT_ID)]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    run_id = tracing::field::Empty,
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(trace_layer)
            .layer(middleware::from_fn_with_state(
                Arc::clone(&state),
                observe_request,
            ));

        let router = Self::build_router()
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);

        Self { router }
    }

    fn build_router() -> Router<Arc<ApiState>> {
        Self::public_routes()
            .merge(Self::generation_routes())
            .merge(Self::settings_routes())
            .merge(Self::billing_routes())
    }

    fn public_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
    }

    fn generation_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/generate", post(generate))
            .route("/generate-bulk", post(generate_bulk))
            .route("/runs", get(run_status).post(start_run))
            .route("/runs/events", get(stream_events))
            .route("/assets", get(list_assets).post(register_asset))
    }

    fn settings_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/settings", get(license_status))
            .route(
                "/license-key",
                get(license_status)
                    .post(save_license_key)
                    .delete(delete_license_key),
            )
            .route(
                "/auto-tagging",
                get(get_auto_tagging).post(set_auto_tagging),
            )
            .route(
                "/bulk-processing",
                get(get_bulk_processing).post(set_bulk_processing),
            )
    }

    fn billing_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/subscription", get(subscription))
            .route("/pricing-info", get(pricing_info))
            .route("/customer-portal", post(customer_portal))
            .route("/usage", get(usage))
            .route("/usage/can-generate", get(can_generate))
            .route("/checkout", post(checkout))
    }

    /// Serve the API on `addr` until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> ServeResult<()> {
        tracing::info!("Starting API on {}", addr);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServeError::Bind { addr, source })?;
        axum::serve(listener, self.router.into_make_service())
            .await
            .map_err(|source| ServeError::Serve { source })
    }

    /// Underlying router, for embedding or in-process requests.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }
}
