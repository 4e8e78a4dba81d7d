//! License key management.

use alttext_config::{LicenseKey, SettingsPatch};
use alttext_events::Event;
use tracing::info;

use crate::cli::LicenseSetArgs;
use crate::client::{CliContext, CliResult, classify_config_error};
use crate::output::render_license_status;

pub(crate) async fn handle_license_set(ctx: &CliContext, args: LicenseSetArgs) -> CliResult<()> {
    let key = LicenseKey::parse(&args.key).map_err(|err| classify_config_error(&err))?;
    info!(license = %key.log_prefix(), "storing license key");
    store_key(ctx, Some(key), "license key saved").await?;
    println!("License key saved");
    Ok(())
}

pub(crate) async fn handle_license_clear(ctx: &CliContext) -> CliResult<()> {
    store_key(ctx, None, "license key removed").await?;
    println!("License key removed");
    Ok(())
}

pub(crate) async fn handle_license_status(ctx: &CliContext) -> CliResult<()> {
    let settings = ctx
        .services
        .settings
        .load()
        .await
        .map_err(|err| classify_config_error(&err))?;
    println!(
        "{}",
        render_license_status(settings.has_license_key(), ctx.output)?
    );
    Ok(())
}

async fn store_key(
    ctx: &CliContext,
    key: Option<LicenseKey>,
    description: &str,
) -> CliResult<()> {
    ctx.services
        .settings
        .update(SettingsPatch {
            license_key: Some(key),
            ..SettingsPatch::default()
        })
        .await
        .map_err(|err| classify_config_error(&err))?;
    ctx.services.events.publish(Event::SettingsChanged {
        description: description.to_string(),
    });
    Ok(())
}
