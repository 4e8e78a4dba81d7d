use alttext_api::ApiServer;
use alttext_config::AppConfig;
use alttext_telemetry::{LoggingConfig, init_logging};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::services::AppServices;

/// Dependencies required to bootstrap the alt-text server.
pub(crate) struct BootstrapDependencies {
    logging: LoggingConfig<'static>,
    config: AppConfig,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config = AppConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
        Ok(Self {
            logging: LoggingConfig::default(),
            config,
        })
    }
}

/// Entry point for the server boot sequence.
///
/// # Errors
///
/// Returns an error if dependency construction or application startup fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies).await
}

/// Boot sequence that relies entirely on injected dependencies.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let BootstrapDependencies { logging, config } = dependencies;
    init_logging(&logging).map_err(|err| AppError::telemetry("telemetry.init", err))?;

    info!(
        base_url = %config.base_url,
        data_dir = %config.data_dir.display(),
        "alt-text server bootstrap starting"
    );

    let addr = config.bind_addr;
    let services = AppServices::open(config).await?;
    let auto_tagger = services.auto_tagger().spawn();
    let api = ApiServer::new(services.api_state());

    info!(addr = %addr, "Launching API listener");
    let serve_result = api.serve(addr).await;

    if !auto_tagger.is_finished() {
        auto_tagger.abort();
    }
    if let Err(err) = auto_tagger.await
        && !err.is_cancelled()
    {
        warn!(error = %err, "auto-tagging worker join failed");
    }

    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("API server shutdown complete");
    Ok(())
}
