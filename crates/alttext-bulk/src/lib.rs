#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! Bulk alt-text orchestration.
//!
//! A run flows controller → dispatcher → processor → gateway. The
//! [`ItemProcessor`] turns one asset into generated text, the [`Dispatcher`]
//! walks a selection sequentially or as concurrently issued chunk batches, and
//! the [`BulkController`] owns the run lifecycle, status events, and the
//! upgrade prompt raised when the usage quota runs out.

pub mod context;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod processor;
pub mod progress;

pub use context::RunContext;
pub use controller::{BulkController, ControllerState};
pub use dispatcher::Dispatcher;
pub use error::{RunError, RunResult};
pub use processor::ItemProcessor;
pub use progress::{ProgressTracker, RunProgress};
