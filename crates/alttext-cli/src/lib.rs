#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! Operator CLI for the alt-text service.
//!
//! Commands run in-process against the same settings, catalog, and licensing
//! client the server uses, so a bulk run started here behaves exactly like
//! one started over HTTP.
//!
//! Layout:
//! - `cli.rs`: argument parsing and command dispatch
//! - `commands/`: command handlers grouped by concern
//! - `client.rs`: command context, errors, and configuration overrides
//! - `output.rs`: renderers and formatting helpers
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod client;
pub(crate) mod commands;
pub(crate) mod output;
#[cfg(test)]
pub(crate) mod test_support;

pub use cli::run;
