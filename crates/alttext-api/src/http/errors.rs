//! RFC9457-style request errors and listener failures.

use std::net::SocketAddr;

use alttext_bulk::RunError;
use alttext_config::ConfigError;
use alttext_core::ItemError;
use alttext_gateway::GatewayError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::http::constants::{
    PROBLEM_BAD_REQUEST, PROBLEM_CONFLICT, PROBLEM_FORBIDDEN, PROBLEM_INTERNAL,
    PROBLEM_LICENSE_INVALID, PROBLEM_NOT_FOUND, PROBLEM_SERVICE_UNAVAILABLE,
};
use crate::models::{ProblemDetails, ProblemInvalidParam};

/// Result alias for hosting the API.
pub type ServeResult<T> = Result<T, ServeError>;

/// Failures hosting the API listener.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The listener could not bind.
    #[error("failed to bind api listener on {addr}")]
    Bind {
        /// Address attempted.
        addr: SocketAddr,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The server stopped accepting connections.
    #[error("api server terminated unexpectedly")]
    Serve {
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// Structured API error with optional RFC9457 fields.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
    pub(crate) invalid_params: Option<Vec<ProblemInvalidParam>>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
            invalid_params: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn with_invalid_params(mut self, params: Vec<ProblemInvalidParam>) -> Self {
        self.invalid_params = Some(params);
        self
    }

    pub(crate) fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, PROBLEM_FORBIDDEN, "forbidden").with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            PROBLEM_NOT_FOUND,
            "resource not found",
        )
        .with_detail(detail)
    }

    pub(crate) fn conflict(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, PROBLEM_CONFLICT, "conflict").with_detail(detail)
    }

    pub(crate) fn license_invalid(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            PROBLEM_LICENSE_INVALID,
            "license key invalid",
        )
        .with_detail(detail)
    }

    pub(crate) fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            PROBLEM_SERVICE_UNAVAILABLE,
            "service unavailable",
        )
        .with_detail(detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
            invalid_params: self.invalid_params,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Settings that cannot be read or written are a server-side failure.
pub(crate) fn map_config_error(err: &ConfigError, context: &'static str) -> ApiError {
    if let ConfigError::InvalidLicenseKey { reason } = err {
        return ApiError::license_invalid(*reason).with_invalid_params(vec![ProblemInvalidParam {
            pointer: "/licenseKey".to_string(),
            message: (*reason).to_string(),
        }]);
    }
    error!(error = %err, detail = %err.detail(), "{context}");
    ApiError::internal(context)
}

/// Licensing failures are surfaced with the service's own message.
pub(crate) fn map_gateway_error(err: &GatewayError) -> ApiError {
    match err {
        GatewayError::Settings { source } => map_config_error(source, "settings unavailable"),
        GatewayError::Transport { .. } => {
            error!(error = %err, detail = %err.user_message(), "licensing service unreachable");
            ApiError::service_unavailable(err.user_message())
        }
        _ => ApiError::bad_request(err.user_message()),
    }
}

/// Rejections of a single-asset generation request.
pub(crate) fn map_item_error(err: &ItemError) -> ApiError {
    match err {
        ItemError::NotFound => ApiError::not_found(err.to_string()),
        _ => ApiError::bad_request(err.to_string()),
    }
}

/// Rejected bulk runs.
pub(crate) fn map_run_error(err: &RunError) -> ApiError {
    match err {
        RunError::EmptySelection | RunError::MissingLicenseKey => {
            ApiError::bad_request(err.to_string())
        }
        RunError::AlreadyRunning => ApiError::conflict(err.to_string()),
        RunError::Settings { source } => map_config_error(source, "settings unavailable"),
    }
}
