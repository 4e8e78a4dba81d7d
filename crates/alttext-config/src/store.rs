//! Settings persistence backends.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{LicenseKey, PluginSettings, SettingsPatch};

/// Abstraction over where plugin settings live.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read the current settings; a missing document yields defaults.
    async fn load(&self) -> ConfigResult<PluginSettings>;

    /// Merge `patch` into the stored settings and return the result.
    async fn update(&self, patch: SettingsPatch) -> ConfigResult<PluginSettings>;

    /// Configured license key, if any.
    async fn license_key(&self) -> ConfigResult<Option<LicenseKey>> {
        Ok(self.load().await?.license_key)
    }
}

/// JSON document on disk.
pub struct FileSettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSettingsStore {
    /// Store backed by the document at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the settings document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> ConfigResult<PluginSettings> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "settings document absent; using defaults");
                return Ok(PluginSettings::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    operation: "settings.read",
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Serde {
            operation: "settings.decode",
            source,
        })
    }

    async fn write(&self, settings: &PluginSettings) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    operation: "settings.create_dir",
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let payload = serde_json::to_vec_pretty(settings).map_err(|source| ConfigError::Serde {
            operation: "settings.encode",
            source,
        })?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, payload)
            .await
            .map_err(|source| ConfigError::Io {
                operation: "settings.write",
                path: staging.clone(),
                source,
            })?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|source| ConfigError::Io {
                operation: "settings.rename",
                path: self.path.clone(),
                source,
            })
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> ConfigResult<PluginSettings> {
        self.read().await
    }

    async fn update(&self, patch: SettingsPatch) -> ConfigResult<PluginSettings> {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.read().await?;
        patch.apply(&mut settings);
        self.write(&settings).await?;
        Ok(settings)
    }
}

/// In-process settings, used by tests and ephemeral runs.
#[derive(Default)]
pub struct MemorySettingsStore {
    settings: RwLock<PluginSettings>,
}

impl MemorySettingsStore {
    /// Store seeded with `settings`.
    #[must_use]
    pub fn new(settings: PluginSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    /// Store seeded with a license key and otherwise default settings.
    #[must_use]
    pub fn with_license_key(key: LicenseKey) -> Self {
        Self::new(PluginSettings {
            license_key: Some(key),
            ..PluginSettings::default()
        })
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> ConfigResult<PluginSettings> {
        Ok(self.settings.read().await.clone())
    }

    async fn update(&self, patch: SettingsPatch) -> ConfigResult<PluginSettings> {
        let mut settings = self.settings.write().await;
        patch.apply(&mut settings);
        Ok(settings.clone())
    }
}
