//! # Design
//!
//! - Centralize application-level errors for bootstrap and service wiring.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration or settings operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: alttext_config::ConfigError,
    },
    /// Asset catalog operations failed.
    #[error("media operation failed")]
    Media {
        /// Operation identifier.
        operation: &'static str,
        /// Source media error.
        source: alttext_media::MediaError,
    },
    /// Licensing client construction failed.
    #[error("gateway operation failed")]
    Gateway {
        /// Operation identifier.
        operation: &'static str,
        /// Source gateway error.
        source: alttext_gateway::GatewayError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: alttext_telemetry::TelemetryError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: alttext_api::ServeError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: alttext_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn media(operation: &'static str, source: alttext_media::MediaError) -> Self {
        Self::Media { operation, source }
    }

    pub(crate) const fn gateway(
        operation: &'static str,
        source: alttext_gateway::GatewayError,
    ) -> Self {
        Self::Gateway { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: alttext_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: alttext_api::ServeError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "settings.load",
            alttext_config::ConfigError::InvalidLicenseKey {
                reason: "Invalid license key format",
            },
        );
        assert!(matches!(config, AppError::Config { .. }));
        assert_eq!(config.to_string(), "configuration operation failed");
        assert!(config.source().is_some());

        let media = AppError::media(
            "catalog.open",
            alttext_media::MediaError::MissingFile {
                path: PathBuf::from("data/assets.json"),
            },
        );
        assert!(matches!(media, AppError::Media { .. }));

        let gateway = AppError::gateway(
            "licensing.new",
            alttext_gateway::GatewayError::MissingLicenseKey,
        );
        assert!(matches!(gateway, AppError::Gateway { .. }));

        let telemetry = AppError::telemetry(
            "telemetry.init",
            alttext_telemetry::TelemetryError::UnknownLogFormat {
                value: "xml".to_string(),
            },
        );
        assert!(matches!(telemetry, AppError::Telemetry { .. }));

        let api = AppError::api_server(
            "api_server.serve",
            alttext_api::ServeError::Serve {
                source: io::Error::other("io"),
            },
        );
        assert!(matches!(api, AppError::ApiServer { .. }));
        assert_eq!(api.to_string(), "api server operation failed");
    }
}
