#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! Telemetry primitives shared across the alt-text workspace.
//!
//! Logging setup, Prometheus metrics, and request-context helpers live here so
//! the server, the CLI, and the bulk orchestrator report the same way.

mod context;
mod error;
mod init;
mod metrics;

pub use context::{
    current_request_id, current_route, propagate_request_id_layer, set_request_id_layer,
    with_request_context,
};
pub use error::{TelemetryError, TelemetryResult};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{GenerationOutcome, Metrics, MetricsSnapshot};
