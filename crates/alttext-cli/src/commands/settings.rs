//! Feature toggle commands.

use alttext_config::{PluginSettings, SettingsPatch};
use alttext_events::Event;
use alttext_gateway::Feature;
use tracing::{info, warn};

use crate::cli::ToggleState;
use crate::client::{CliContext, CliError, CliResult, classify_config_error};
use crate::output::{ToggleView, render_toggle};

/// Plan-gated setting addressed by the `settings` subcommands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Toggle {
    AutoTagging,
    BulkProcessing,
}

impl Toggle {
    const fn feature(self) -> Feature {
        match self {
            Self::AutoTagging => Feature::AutoTagging,
            Self::BulkProcessing => Feature::BulkProcessing,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::AutoTagging => "auto-tagging",
            Self::BulkProcessing => "bulk-processing",
        }
    }

    const fn value(self, settings: &PluginSettings) -> bool {
        match self {
            Self::AutoTagging => settings.auto_tagging_enabled,
            Self::BulkProcessing => settings.bulk_processing_parallel_enabled,
        }
    }

    fn patch(self, enabled: bool) -> SettingsPatch {
        match self {
            Self::AutoTagging => SettingsPatch {
                auto_tagging_enabled: Some(enabled),
                ..SettingsPatch::default()
            },
            Self::BulkProcessing => SettingsPatch {
                bulk_processing_parallel_enabled: Some(enabled),
                ..SettingsPatch::default()
            },
        }
    }
}

pub(crate) async fn handle_toggle(
    ctx: &CliContext,
    toggle: Toggle,
    state: Option<ToggleState>,
) -> CliResult<()> {
    let view = match state {
        Some(state) => write_toggle(ctx, toggle, state.enabled()).await?,
        None => read_toggle(ctx, toggle).await?,
    };
    println!("{}", render_toggle(&view, ctx.output)?);
    Ok(())
}

/// Current state; a toggle that is on but no longer on the plan is switched off.
pub(crate) async fn read_toggle(ctx: &CliContext, toggle: Toggle) -> CliResult<ToggleView> {
    let settings = ctx
        .services
        .settings
        .load()
        .await
        .map_err(|err| classify_config_error(&err))?;
    let mut enabled = toggle.value(&settings);
    let available = ctx
        .services
        .licensing
        .subscription()
        .await
        .allows(toggle.feature());
    if enabled && !available {
        warn!(feature = toggle.label(), "feature no longer on plan; disabling");
        store_toggle(ctx, toggle, false).await?;
        enabled = false;
    }
    Ok(ToggleView {
        feature: toggle.label(),
        enabled,
        available,
    })
}

pub(crate) async fn write_toggle(
    ctx: &CliContext,
    toggle: Toggle,
    enabled: bool,
) -> CliResult<ToggleView> {
    let available = ctx
        .services
        .licensing
        .subscription()
        .await
        .allows(toggle.feature());
    if enabled && !available {
        return Err(CliError::validation(toggle.feature().unavailable_message()));
    }
    store_toggle(ctx, toggle, enabled).await?;
    info!(feature = toggle.label(), enabled, "feature toggle updated");
    Ok(ToggleView {
        feature: toggle.label(),
        enabled,
        available,
    })
}

async fn store_toggle(ctx: &CliContext, toggle: Toggle, enabled: bool) -> CliResult<()> {
    ctx.services
        .settings
        .update(toggle.patch(enabled))
        .await
        .map_err(|err| classify_config_error(&err))?;
    let verb = if enabled { "enabled" } else { "disabled" };
    ctx.services.events.publish(Event::SettingsChanged {
        description: format!("{} {verb}", toggle.label()),
    });
    Ok(())
}
