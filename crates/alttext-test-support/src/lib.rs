#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! Shared test helpers used across crate suites.
//! Layout: fixtures.rs (asset builders), mocks.rs (scripted collaborators).

pub mod fixtures;
pub mod mocks;

pub use fixtures::{asset_bytes, document_asset, image_asset, svg_asset};
pub use mocks::{
    GatewayCall, MemoryAssetStore, PassthroughNormalizer, Reply, ScriptedGateway,
};
