//! Output renderers and formatting helpers for CLI commands.

use alttext_core::{AssetId, ItemStatus, RunOutcome, RunSummary, UsageSnapshot};
use alttext_gateway::Subscription;
use anyhow::anyhow;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

/// JSON shape of a finished `generate` command.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateReport<'a> {
    summary: RunSummary,
    message: String,
    #[serde(flatten)]
    outcome: &'a RunOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<&'a UsageSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upgrade_url: Option<&'a str>,
}

/// Feature toggle as shown to operators.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToggleView {
    pub(crate) feature: &'static str,
    pub(crate) enabled: bool,
    pub(crate) available: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PricingView {
    pub(crate) pricing_url: String,
    pub(crate) dashboard_url: String,
    pub(crate) has_license_key: bool,
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

/// One-line summary matching the run's notification category.
pub(crate) fn summary_message(outcome: &RunOutcome) -> String {
    match outcome.summary() {
        RunSummary::Success => format!(
            "Generated alt text for {}",
            plural(outcome.success_count, "image")
        ),
        RunSummary::Warning => format!(
            "Alt text generation failed for {}",
            plural(outcome.error_count(), "image")
        ),
        RunSummary::Info => "No alt text was generated".to_string(),
    }
}

pub(crate) fn upgrade_prompt(usage: Option<&UsageSnapshot>, pricing_url: &str) -> String {
    usage.map_or_else(
        || format!("Usage limit reached. Upgrade your plan: {pricing_url}"),
        |usage| {
            format!(
                "Usage limit reached ({}/{} this period). Upgrade your plan: {pricing_url}",
                usage.used, usage.limit
            )
        },
    )
}

pub(crate) fn render_run_outcome(
    outcome: &RunOutcome,
    usage: Option<&UsageSnapshot>,
    pricing_url: &str,
    format: OutputFormat,
) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(&GenerateReport {
            summary: outcome.summary(),
            message: summary_message(outcome),
            outcome,
            usage,
            upgrade_url: outcome.quota_exceeded.then_some(pricing_url),
        }),
        OutputFormat::Table => {
            let mut lines = vec![format!("{:<10} {:<8} DETAIL", "ID", "STATUS")];
            for (id, status) in &outcome.statuses {
                let detail = outcome
                    .alt_texts
                    .get(id)
                    .or_else(|| outcome.errors.get(id))
                    .map_or("", String::as_str);
                lines.push(format!(
                    "{:<10} {:<8} {detail}",
                    id,
                    status_label(*status)
                ));
            }
            lines.push(summary_message(outcome));
            if outcome.quota_exceeded {
                lines.push(upgrade_prompt(usage, pricing_url));
            }
            Ok(lines.join("\n"))
        }
    }
}

/// Live progress line for an item that reached a final status.
pub(crate) fn format_item_progress(
    done: usize,
    total: usize,
    asset_id: AssetId,
    status: ItemStatus,
    message: Option<&str>,
) -> String {
    let mut line = format!("[{done}/{total}] #{asset_id} {}", status_label(status));
    if let Some(message) = message {
        line.push_str(": ");
        line.push_str(message);
    }
    line
}

pub(crate) fn render_usage(usage: &UsageSnapshot, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(usage),
        OutputFormat::Table => Ok([
            format!("used: {}", usage.used),
            format!("limit: {}", usage.limit),
            format!("remaining: {}", usage.remaining()),
            format!(
                "period: {} .. {}",
                usage.period_start.format("%Y-%m-%d"),
                usage.period_end.format("%Y-%m-%d")
            ),
        ]
        .join("\n")),
    }
}

pub(crate) fn render_subscription(
    subscription: &Subscription,
    format: OutputFormat,
) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(subscription),
        OutputFormat::Table => {
            let mut lines = vec![
                format!(
                    "plan: {}",
                    subscription.plan_name.as_deref().unwrap_or("Free")
                ),
                format!(
                    "status: {}",
                    subscription
                        .status
                        .as_deref()
                        .unwrap_or(if subscription.is_active { "active" } else { "inactive" })
                ),
                format!("generations per period: {}", subscription.generations_limit),
                format!("auto-tagging: {}", yes_no(subscription.auto_tagging)),
                format!("bulk processing: {}", yes_no(subscription.bulk_processing)),
            ];
            if subscription.cancel_at_period_end {
                lines.push("cancels at period end: yes".to_string());
            }
            if let Some(usage) = &subscription.usage {
                lines.push(format!("usage: {}/{}", usage.used, usage.limit));
            }
            Ok(lines.join("\n"))
        }
    }
}

pub(crate) fn render_toggle(toggle: &ToggleView, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(toggle),
        OutputFormat::Table => {
            let state = if toggle.enabled { "on" } else { "off" };
            let mut line = format!("{}: {state}", toggle.feature);
            if !toggle.available {
                line.push_str(" (not included in current plan)");
            }
            Ok(line)
        }
    }
}

pub(crate) fn render_pricing(pricing: &PricingView, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(pricing),
        OutputFormat::Table => Ok([
            format!("pricing: {}", pricing.pricing_url),
            format!("dashboard: {}", pricing.dashboard_url),
            format!("license key: {}", configured(pricing.has_license_key)),
        ]
        .join("\n")),
    }
}

pub(crate) fn render_license_status(has_license_key: bool, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(&serde_json::json!({ "hasLicenseKey": has_license_key })),
        OutputFormat::Table => Ok(format!("license key: {}", configured(has_license_key))),
    }
}

pub(crate) fn render_url(url: &str, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(&serde_json::json!({ "url": url })),
        OutputFormat::Table => Ok(url.to_string()),
    }
}

#[must_use]
pub(crate) const fn status_label(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Idle => "idle",
        ItemStatus::Pending => "pending",
        ItemStatus::Success => "success",
        ItemStatus::Failed => "failed",
    }
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

const fn configured(value: bool) -> &'static str {
    if value { "configured" } else { "not configured" }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
