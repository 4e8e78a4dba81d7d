//! Run rejection errors.

use alttext_config::ConfigError;
use thiserror::Error;

/// Reasons a run is refused before any work starts.
#[derive(Debug, Error)]
pub enum RunError {
    /// Nothing was selected.
    #[error("No images selected")]
    EmptySelection,
    /// No license key is configured.
    #[error("License key not configured")]
    MissingLicenseKey,
    /// Another run is still in progress.
    #[error("A bulk run is already in progress")]
    AlreadyRunning,
    /// Plugin settings could not be read.
    #[error("settings unavailable")]
    Settings {
        /// Underlying settings error.
        #[from]
        source: ConfigError,
    },
}

/// Convenience alias for run results.
pub type RunResult<T> = Result<T, RunError>;
