//! Usage, subscription, and billing commands.

use crate::cli::{CheckoutArgs, PortalArgs};
use crate::client::{CliContext, CliResult, classify_gateway_error};
use crate::output::{PricingView, render_pricing, render_subscription, render_url, render_usage};

pub(crate) async fn handle_usage(ctx: &CliContext) -> CliResult<()> {
    let usage = ctx.services.licensing.usage_with_limits().await;
    println!("{}", render_usage(&usage, ctx.output)?);
    Ok(())
}

pub(crate) async fn handle_subscription(ctx: &CliContext) -> CliResult<()> {
    let subscription = ctx.services.licensing.subscription().await;
    println!("{}", render_subscription(&subscription, ctx.output)?);
    Ok(())
}

pub(crate) async fn handle_pricing(ctx: &CliContext) -> CliResult<()> {
    println!("{}", render_pricing(&pricing(ctx).await?, ctx.output)?);
    Ok(())
}

pub(crate) async fn handle_portal(ctx: &CliContext, args: PortalArgs) -> CliResult<()> {
    let url = portal(ctx, &args).await?;
    println!("{}", render_url(&url, ctx.output)?);
    Ok(())
}

pub(crate) async fn handle_checkout(ctx: &CliContext, args: CheckoutArgs) -> CliResult<()> {
    let url = ctx
        .services
        .licensing
        .checkout_url(args.return_url.as_deref())
        .await
        .map_err(|err| classify_gateway_error(&err))?;
    println!("{}", render_url(&url, ctx.output)?);
    Ok(())
}

async fn pricing(ctx: &CliContext) -> CliResult<PricingView> {
    let licensing = &ctx.services.licensing;
    let has_license_key = licensing
        .has_license_key()
        .await
        .map_err(|err| classify_gateway_error(&err))?;
    Ok(PricingView {
        pricing_url: licensing.pricing_url(),
        dashboard_url: licensing.dashboard_url(),
        has_license_key,
    })
}

async fn portal(ctx: &CliContext, args: &PortalArgs) -> CliResult<String> {
    ctx.services
        .licensing
        .portal_url(&args.return_url)
        .await
        .map_err(|err| classify_gateway_error(&err))
}
