#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! Client for the remote licensing and alt-text generation service.
//!
//! Every authenticated call reads the license key from the settings store at
//! call time, so key changes apply without rebuilding the client. Remote
//! failures become [`GatewayError`]s; the [`alttext_core::QuotaGateway`]
//! implementation converts them into classified generation errors.

pub mod client;
pub mod error;
pub mod model;

pub use client::{HEADER_AUTHORIZATION, LicensingClient};
pub use error::{GatewayError, GatewayResult};
pub use model::{Feature, GenerationAllowance, Subscription, UsageIncrement};
