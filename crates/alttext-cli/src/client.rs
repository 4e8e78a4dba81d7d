//! Shared command context, error types, and configuration overrides for the CLI.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use alttext_app::AppServices;
use alttext_config::{AppConfig, ConfigError};
use alttext_gateway::GatewayError;
use anyhow::anyhow;

use crate::cli::OutputFormat;

const ENV_BASE_URL: &str = "ALT_TEXT_BASE_URL";
const ENV_DATA_DIR: &str = "ALT_TEXT_DATA_DIR";

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// Validation failures for bad input; everything else is operational.
pub(crate) fn classify_config_error(err: &ConfigError) -> CliError {
    match err {
        ConfigError::InvalidField { .. } | ConfigError::InvalidLicenseKey { .. } => {
            CliError::validation(err.detail())
        }
        ConfigError::Io { .. } | ConfigError::Serde { .. } => {
            CliError::failure(anyhow!("settings unavailable: {}", err.detail()))
        }
    }
}

pub(crate) fn classify_gateway_error(err: &GatewayError) -> CliError {
    match err {
        GatewayError::MissingLicenseKey => CliError::validation(
            "License key not configured (run `alttext license set <KEY>`)",
        ),
        GatewayError::InvalidRequest { reason, .. } => CliError::validation(*reason),
        GatewayError::Settings { source } => classify_config_error(source),
        GatewayError::Transport { .. }
        | GatewayError::Remote { .. }
        | GatewayError::Decode { .. }
        | GatewayError::Endpoint { .. } => CliError::failure(anyhow!(err.user_message())),
    }
}

/// Command-line values that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConfigOverrides {
    pub(crate) data_dir: Option<PathBuf>,
    pub(crate) base_url: Option<String>,
}

impl ConfigOverrides {
    /// Resolve process configuration, preferring explicit flags.
    pub(crate) fn load(&self) -> CliResult<AppConfig> {
        self.load_with(|key| std::env::var(key).ok())
    }

    pub(crate) fn load_with<F>(&self, lookup: F) -> CliResult<AppConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        AppConfig::from_lookup(|key| match key {
            ENV_DATA_DIR => self
                .data_dir
                .as_ref()
                .map(|dir| dir.to_string_lossy().into_owned())
                .or_else(|| lookup(key)),
            ENV_BASE_URL => self.base_url.clone().or_else(|| lookup(key)),
            _ => lookup(key),
        })
        .map_err(|err| classify_config_error(&err))
    }
}

/// Context passed to command handlers.
pub(crate) struct CliContext {
    pub(crate) services: AppServices,
    pub(crate) output: OutputFormat,
}

impl CliContext {
    pub(crate) const fn new(services: AppServices, output: OutputFormat) -> Self {
        Self { services, output }
    }
}
