//! Persisted plugin settings and the license key newtype.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigError, ConfigResult};

/// Prefix every license key issued by the licensing service carries.
pub const LICENSE_KEY_PREFIX: &str = "strapix_";

/// Number of leading characters that may appear in logs.
const LOG_PREFIX_LEN: usize = 10;

/// Credential sent to the licensing service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseKey(String);

impl LicenseKey {
    /// Validate and normalise a user-supplied key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLicenseKey`] when the key is blank or
    /// lacks the issuer prefix.
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidLicenseKey {
                reason: "licenseKey is required",
            });
        }
        if !trimmed.starts_with(LICENSE_KEY_PREFIX) {
            return Err(ConfigError::InvalidLicenseKey {
                reason: "Invalid license key format",
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Raw key for use in request headers.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short, log-safe prefix of the key.
    #[must_use]
    pub fn log_prefix(&self) -> String {
        let prefix: String = self.0.chars().take(LOG_PREFIX_LEN).collect();
        format!("{prefix}...")
    }
}

impl fmt::Debug for LicenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LicenseKey").field(&self.log_prefix()).finish()
    }
}

/// Settings persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginSettings {
    /// Credential for the licensing service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_key: Option<LicenseKey>,
    /// Generate alt text for newly registered images.
    pub auto_tagging_enabled: bool,
    /// Use chunked batch calls for bulk runs.
    pub bulk_processing_parallel_enabled: bool,
    /// Identifier generated on first boot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<Uuid>,
}

impl PluginSettings {
    /// Whether a license key is configured.
    #[must_use]
    pub const fn has_license_key(&self) -> bool {
        self.license_key.is_some()
    }
}

/// Partial update merged over the stored settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    /// `Some(Some(key))` sets the key, `Some(None)` removes it.
    pub license_key: Option<Option<LicenseKey>>,
    /// New auto-tagging flag.
    pub auto_tagging_enabled: Option<bool>,
    /// New parallel processing flag.
    pub bulk_processing_parallel_enabled: Option<bool>,
    /// Instance identifier to record.
    pub instance_id: Option<Uuid>,
}

impl SettingsPatch {
    /// Apply the patch to `settings`, leaving unspecified fields untouched.
    pub fn apply(self, settings: &mut PluginSettings) {
        if let Some(license_key) = self.license_key {
            settings.license_key = license_key;
        }
        if let Some(enabled) = self.auto_tagging_enabled {
            settings.auto_tagging_enabled = enabled;
        }
        if let Some(enabled) = self.bulk_processing_parallel_enabled {
            settings.bulk_processing_parallel_enabled = enabled;
        }
        if let Some(instance_id) = self.instance_id {
            settings.instance_id = Some(instance_id);
        }
    }
}
