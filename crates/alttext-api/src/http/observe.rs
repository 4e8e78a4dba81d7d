//! Per-request observation: route metrics, request context, and run tagging.

use std::sync::Arc;

use alttext_telemetry::with_request_context;
use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{Span, warn};

use crate::http::constants::HEADER_REQUEST_ID;
use crate::state::ApiState;

const UNMATCHED_ROUTE: &str = "unmatched";
const RUN_ROUTE_PREFIX: &str = "/runs";

/// Count the request under its matched route and tag run requests with the
/// run they observed.
pub(crate) async fn observe_request(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or(UNMATCHED_ROUTE, MatchedPath::as_str)
        .to_string();
    let request_id = request
        .headers()
        .get(HEADER_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let response = with_request_context(request_id.clone(), route.clone(), next.run(request)).await;

    let status = response.status();
    state.telemetry.inc_http_request(&route, status.as_u16());
    if route.starts_with(RUN_ROUTE_PREFIX)
        && let Some(run_id) = state.controller.progress().run_id
    {
        Span::current().record("run_id", tracing::field::display(run_id));
    }
    if status.is_server_error() {
        warn!(%route, %request_id, status = status.as_u16(), "request failed");
    }
    response
}

#[cfg(test)]
mod tests {
    use crate::http::router::ApiServer;
    use crate::http::test_support::HarnessBuilder;
    use alttext_test_support::{MemoryAssetStore, image_asset};
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode, header::CONTENT_TYPE};
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn run_requests_are_counted_by_route_and_status() {
        let harness = HarnessBuilder::new()
            .with_store(MemoryAssetStore::with_assets([image_asset(1)]))
            .build();
        let state = Arc::try_unwrap(harness.state).unwrap_or_else(|_| panic!("state still shared"));
        let router = ApiServer::new(state).into_router();

        for body in [r#"{"fileIds":[1]}"#, r#"{"fileIds":[]}"#] {
            let response = router
                .clone()
                .oneshot(
                    Request::builder()
                        .method(Method::POST)
                        .uri("/runs")
                        .header(CONTENT_TYPE, "application/json")
                        .body(Body::from(body))
                        .expect("request"),
                )
                .await
                .expect("response");
            assert_ne!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let text = String::from_utf8(bytes.to_vec()).expect("utf8");
        for code in ["200", "400"] {
            assert!(
                text.lines().any(|line| line.starts_with("http_requests_total")
                    && line.contains(&format!("code=\"{code}\""))
                    && line.contains("route=\"/runs\"")
                    && line.ends_with(" 1")),
                "missing /runs sample for {code}"
            );
        }
    }
}
