//! Argument parsing and command dispatch.

use std::path::PathBuf;

use alttext_app::AppServices;
use alttext_core::AssetId;
use alttext_telemetry::{LogFormat, LoggingConfig, build_sha, init_logging};
use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::client::{CliContext, CliError, CliResult, ConfigOverrides};
use crate::commands::billing::{
    handle_checkout, handle_portal, handle_pricing, handle_subscription, handle_usage,
};
use crate::commands::generate::handle_generate;
use crate::commands::license::{handle_license_clear, handle_license_set, handle_license_status};
use crate::commands::settings::{Toggle, handle_toggle};

/// Parses CLI arguments, executes the requested command, and reports the
/// outcome. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn execute(cli: Cli) -> CliResult<()> {
    if let Some(level) = cli.log_level.as_deref() {
        let logging = LoggingConfig {
            level,
            format: LogFormat::Pretty,
            build_sha: build_sha(),
        };
        init_logging(&logging)
            .context("failed to install logging")
            .map_err(CliError::failure)?;
    }

    let config = ConfigOverrides {
        data_dir: cli.data_dir,
        base_url: cli.base_url,
    }
    .load()?;
    let services = AppServices::open(config)
        .await
        .context("failed to open alt-text data directory")
        .map_err(CliError::failure)?;
    let ctx = CliContext::new(services, cli.output);
    dispatch(&ctx, cli.command).await
}

pub(crate) async fn dispatch(ctx: &CliContext, command: Command) -> CliResult<()> {
    match command {
        Command::Generate(args) => handle_generate(ctx, args).await,
        Command::Usage => handle_usage(ctx).await,
        Command::Subscription => handle_subscription(ctx).await,
        Command::License(license) => match license {
            LicenseCommand::Set(args) => handle_license_set(ctx, args).await,
            LicenseCommand::Clear => handle_license_clear(ctx).await,
            LicenseCommand::Status => handle_license_status(ctx).await,
        },
        Command::Settings(settings) => match settings {
            SettingsCommand::AutoTagging(args) => {
                handle_toggle(ctx, Toggle::AutoTagging, args.state).await
            }
            SettingsCommand::BulkProcessing(args) => {
                handle_toggle(ctx, Toggle::BulkProcessing, args.state).await
            }
        },
        Command::Pricing => handle_pricing(ctx).await,
        Command::Portal(args) => handle_portal(ctx, args).await,
        Command::Checkout(args) => handle_checkout(ctx, args).await,
    }
}

#[derive(Parser)]
#[command(name = "alttext", about = "Operator CLI for bulk alt-text generation")]
pub(crate) struct Cli {
    #[arg(long, global = true, env = "ALT_TEXT_DATA_DIR")]
    pub(crate) data_dir: Option<PathBuf>,
    #[arg(long, global = true, env = "ALT_TEXT_BASE_URL")]
    pub(crate) base_url: Option<String>,
    #[arg(
        long,
        global = true,
        env = "ALT_TEXT_LOG",
        help = "Emit diagnostics at this level (e.g. info, debug)"
    )]
    pub(crate) log_level: Option<String>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate alt text for the given asset ids.
    Generate(GenerateArgs),
    /// Show usage for the current period.
    Usage,
    /// Show the subscription for the stored license key.
    Subscription,
    /// Manage the stored license key.
    #[command(subcommand)]
    License(LicenseCommand),
    /// Read or change feature toggles.
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Show pricing and dashboard links.
    Pricing,
    /// Open a billing portal session.
    Portal(PortalArgs),
    /// Start a checkout session.
    Checkout(CheckoutArgs),
}

#[derive(Args, Debug)]
pub(crate) struct GenerateArgs {
    #[arg(required = true, num_args = 1.., help = "Asset identifiers to describe")]
    pub(crate) ids: Vec<AssetId>,
    #[arg(long, conflicts_with = "sequential", help = "Send images in chunked batches")]
    pub(crate) parallel: bool,
    #[arg(long, help = "Send images one at a time")]
    pub(crate) sequential: bool,
}

impl GenerateArgs {
    /// Dispatch mode requested on the command line; `None` defers to settings.
    pub(crate) const fn mode(&self) -> Option<bool> {
        if self.parallel {
            Some(true)
        } else if self.sequential {
            Some(false)
        } else {
            None
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum LicenseCommand {
    /// Validate and store a license key.
    Set(LicenseSetArgs),
    /// Remove the stored license key.
    Clear,
    /// Report whether a license key is stored.
    Status,
}

#[derive(Args)]
pub(crate) struct LicenseSetArgs {
    #[arg(help = "License key issued by the licensing service")]
    pub(crate) key: String,
}

#[derive(Subcommand)]
pub(crate) enum SettingsCommand {
    /// Generate alt text for newly registered images.
    AutoTagging(ToggleArgs),
    /// Use chunked batch calls for bulk runs.
    BulkProcessing(ToggleArgs),
}

#[derive(Args)]
pub(crate) struct ToggleArgs {
    #[arg(value_enum, help = "Omit to show the current state")]
    pub(crate) state: Option<ToggleState>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum ToggleState {
    On,
    Off,
}

impl ToggleState {
    pub(crate) const fn enabled(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Args)]
pub(crate) struct PortalArgs {
    #[arg(long, help = "Page the portal returns to")]
    pub(crate) return_url: String,
}

#[derive(Args, Default)]
pub(crate) struct CheckoutArgs {
    #[arg(long, help = "Page checkout returns to")]
    pub(crate) return_url: Option<String>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}
