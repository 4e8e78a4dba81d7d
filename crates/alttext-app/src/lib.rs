#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! Alt-text server bootstrap wiring.
//!
//! Layout: `services.rs` (collaborator graph shared with the CLI),
//! `autotag.rs` (registration worker), `bootstrap.rs` (server boot sequence).

/// Auto-tagging worker for newly registered images.
pub mod autotag;
/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application error type.
pub mod error;
/// Collaborator wiring.
pub mod services;

pub use autotag::{AutoTagOutcome, AutoTagger, SkipReason};
pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
pub use services::{AppServices, ensure_instance_id};
