//! Bulk run trigger and progress endpoints.

use std::sync::Arc;

use alttext_core::SelectionSet;
use axum::{Json, extract::State};

use crate::http::errors::{ApiError, map_run_error};
use crate::models::{RunRequest, RunResponse, RunStatusResponse};
use crate::state::ApiState;

/// `POST /runs`: run the controller over the selection and return the
/// outcome once every item has a final status.
pub(crate) async fn start_run(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    let selection = SelectionSet::new(request.file_ids);
    let result = match request.parallel {
        Some(parallel) => state.controller.run(selection, parallel).await,
        None => state.controller.run_configured(selection).await,
    };
    result
        .map(|outcome| Json(RunResponse::from(outcome)))
        .map_err(|err| map_run_error(&err))
}

/// `GET /runs`: progress of the current or most recent run.
pub(crate) async fn run_status(State(state): State<Arc<ApiState>>) -> Json<RunStatusResponse> {
    let progress = state.controller.progress();
    Json(RunStatusResponse {
        state: state.controller.state(),
        percent: progress.percent(),
        progress,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::HarnessBuilder;
    use alttext_bulk::ControllerState;
    use alttext_core::{ItemStatus, RunSummary};
    use alttext_events::Event;
    use alttext_test_support::{GatewayCall, MemoryAssetStore, document_asset, image_asset};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn run_returns_outcome_and_leaves_progress_visible() {
        let harness = HarnessBuilder::new()
            .with_store(MemoryAssetStore::with_assets([
                image_asset(1),
                image_asset(2),
                image_asset(3),
            ]))
            .build();

        let Json(response) = start_run(
            State(Arc::clone(&harness.state)),
            Json(RunRequest {
                file_ids: vec![1, 2, 3],
                parallel: Some(false),
            }),
        )
        .await
        .expect("run");

        assert_eq!(response.outcome.success_count, 3);
        assert_eq!(response.summary, RunSummary::Success);
        assert_eq!(response.error_count, 0);

        let Json(status) = run_status(State(Arc::clone(&harness.state))).await;
        assert_eq!(status.state, ControllerState::Idle);
        assert_eq!(status.percent, 100);
        assert_eq!(status.progress.statuses[&2], ItemStatus::Success);
    }

    #[tokio::test]
    async fn run_uses_stored_mode_when_none_is_requested() {
        let harness = HarnessBuilder::new()
            .with_parallel_processing()
            .with_store(MemoryAssetStore::with_assets([image_asset(1), image_asset(2)]))
            .build();

        let _ = start_run(
            State(Arc::clone(&harness.state)),
            Json(RunRequest {
                file_ids: vec![1, 2],
                parallel: None,
            }),
        )
        .await
        .expect("run");

        assert_eq!(harness.gateway.calls(), vec![GatewayCall::Many(vec![1, 2])]);
    }

    #[tokio::test]
    async fn run_reports_non_images_as_warning() {
        let harness = HarnessBuilder::new()
            .with_store(MemoryAssetStore::with_assets([document_asset(9)]))
            .build();

        let Json(response) = start_run(
            State(Arc::clone(&harness.state)),
            Json(RunRequest {
                file_ids: vec![9],
                parallel: Some(false),
            }),
        )
        .await
        .expect("run");

        assert_eq!(response.summary, RunSummary::Warning);
        assert_eq!(
            response.outcome.errors.get(&9).map(String::as_str),
            Some("File is not an image")
        );
    }

    #[tokio::test]
    async fn rejected_runs_become_problem_responses() {
        let harness = HarnessBuilder::new().without_license_key().build();

        let err = start_run(
            State(Arc::clone(&harness.state)),
            Json(RunRequest {
                file_ids: vec![1],
                parallel: Some(false),
            }),
        )
        .await
        .expect_err("rejected");

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.detail(), Some("License key not configured"));
        assert!(
            harness
                .events
                .backlog()
                .iter()
                .any(|envelope| matches!(envelope.event, Event::RunRejected { .. }))
        );
        assert_eq!(harness.gateway.generation_calls(), 0);
    }
}
