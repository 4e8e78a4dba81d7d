#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! Configuration for the alt-text service.
//!
//! Process settings come from the environment ([`AppConfig`]); operator
//! choices such as the license key and feature toggles are persisted through a
//! [`SettingsStore`].

pub mod error;
pub mod loader;
pub mod model;
pub mod store;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    AppConfig, DEFAULT_BASE_URL, DEFAULT_BIND_ADDR, DEFAULT_DATA_DIR, DEFAULT_HTTP_TIMEOUT_SECS,
    DEFAULT_MAX_BULK_ITEMS, DEFAULT_PROGRESS_RESET_MS,
};
pub use model::{LICENSE_KEY_PREFIX, LicenseKey, PluginSettings, SettingsPatch};
pub use store::{FileSettingsStore, MemorySettingsStore, SettingsStore};
