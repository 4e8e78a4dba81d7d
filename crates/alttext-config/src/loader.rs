//! Environment-driven application configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Licensing service used when `ALT_TEXT_BASE_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "https://strapix.com";
/// Data directory used when `ALT_TEXT_DATA_DIR` is unset.
pub const DEFAULT_DATA_DIR: &str = "./data";
/// Listener address used when `ALT_TEXT_BIND_ADDR` is unset.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7171";
/// Remote request timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
/// Largest selection accepted by a single bulk request.
pub const DEFAULT_MAX_BULK_ITEMS: usize = 10;
/// Delay before per-run progress indicators are cleared.
pub const DEFAULT_PROGRESS_RESET_MS: u64 = 3_000;

const ENV_BASE_URL: &str = "ALT_TEXT_BASE_URL";
const ENV_DATA_DIR: &str = "ALT_TEXT_DATA_DIR";
const ENV_BIND_ADDR: &str = "ALT_TEXT_BIND_ADDR";
const ENV_HTTP_TIMEOUT: &str = "ALT_TEXT_HTTP_TIMEOUT_SECS";
const ENV_MAX_BULK_ITEMS: &str = "ALT_TEXT_MAX_BULK_ITEMS";
const ENV_PROGRESS_RESET: &str = "ALT_TEXT_PROGRESS_RESET_MS";

/// Process-level configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Base URL of the licensing and generation service.
    pub base_url: Url,
    /// Directory holding settings, the asset catalog, and uploads.
    pub data_dir: PathBuf,
    /// HTTP listener address.
    pub bind_addr: SocketAddr,
    /// Timeout applied to remote requests.
    pub http_timeout: Duration,
    /// Largest selection accepted by `/generate-bulk`.
    pub max_bulk_items: usize,
    /// Delay before progress indicators are cleared after a run.
    pub progress_reset_delay: Duration,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when a variable is present but
    /// cannot be parsed.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when a variable is present but
    /// cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let base_url = parse_base_url(read(ENV_BASE_URL).as_deref().unwrap_or(DEFAULT_BASE_URL))?;
        let data_dir = PathBuf::from(read(ENV_DATA_DIR).unwrap_or_else(|| DEFAULT_DATA_DIR.into()));
        let bind_addr = read(ENV_BIND_ADDR)
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidField {
                field: ENV_BIND_ADDR,
                value: read(ENV_BIND_ADDR),
                reason: "must be a socket address",
            })?;
        let http_timeout = Duration::from_secs(parse_positive(
            ENV_HTTP_TIMEOUT,
            read(ENV_HTTP_TIMEOUT),
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?);
        let max_bulk_items = usize::try_from(parse_positive(
            ENV_MAX_BULK_ITEMS,
            read(ENV_MAX_BULK_ITEMS),
            DEFAULT_MAX_BULK_ITEMS as u64,
        )?)
        .map_err(|_| ConfigError::InvalidField {
            field: ENV_MAX_BULK_ITEMS,
            value: read(ENV_MAX_BULK_ITEMS),
            reason: "too large",
        })?;
        let progress_reset_delay = Duration::from_millis(parse_u64(
            ENV_PROGRESS_RESET,
            read(ENV_PROGRESS_RESET),
            DEFAULT_PROGRESS_RESET_MS,
        )?);

        Ok(Self {
            base_url,
            data_dir,
            bind_addr,
            http_timeout,
            max_bulk_items,
            progress_reset_delay,
        })
    }

    /// Location of the persisted plugin settings.
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    /// Location of the asset catalog document.
    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("assets.json")
    }

    /// Root that `/uploads/...` asset URLs resolve under.
    #[must_use]
    pub fn public_dir(&self) -> PathBuf {
        self.data_dir.join("public")
    }
}

fn parse_base_url(raw: &str) -> ConfigResult<Url> {
    let url = Url::parse(raw).map_err(|_| ConfigError::InvalidField {
        field: ENV_BASE_URL,
        value: Some(raw.to_string()),
        reason: "must be an absolute URL",
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidField {
            field: ENV_BASE_URL,
            value: Some(raw.to_string()),
            reason: "must use http or https",
        });
    }
    Ok(url)
}

fn parse_u64(field: &'static str, raw: Option<String>, default: u64) -> ConfigResult<u64> {
    raw.map_or(Ok(default), |value| {
        value.parse::<u64>().map_err(|_| ConfigError::InvalidField {
            field,
            value: Some(value),
            reason: "must be a non-negative integer",
        })
    })
}

fn parse_positive(field: &'static str, raw: Option<String>, default: u64) -> ConfigResult<u64> {
    let value = parse_u64(field, raw, default)?;
    if value == 0 {
        return Err(ConfigError::InvalidField {
            field,
            value: Some(value.to_string()),
            reason: "must be greater than zero",
        });
    }
    Ok(value)
}
