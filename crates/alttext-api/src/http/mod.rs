//! HTTP surface modules (router, handlers, middleware).

/// Asset catalog endpoints.
pub mod assets;
/// Licensing, billing, and usage endpoints.
pub mod billing;
/// Shared constants and header names.
pub mod constants;
/// Problem response helpers and error types.
pub mod errors;
/// Single and bulk generation endpoints.
pub mod generation;
/// Health and metrics endpoints.
pub mod health;
/// Request metrics and context middleware.
pub(crate) mod observe;
/// Router construction and server host.
pub mod router;
/// Bulk run trigger and progress endpoints.
pub mod runs;
/// License key and feature toggle endpoints.
pub mod settings;
/// Server-sent events streaming.
pub mod sse;

#[cfg(test)]
pub(crate) mod test_support;
