#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! HTTP surface for the alt-text service.
//!
//! Mirrors the admin endpoints of the plugin: single and bulk generation,
//! license and feature settings, billing links, and usage. Bulk runs started
//! through `/runs` report live progress over server-sent events.

pub mod http;
pub mod models;
pub mod state;

pub use http::errors::{ServeError, ServeResult};
pub use http::router::ApiServer;
pub use state::ApiState;
