//! Bulk generation command with live progress on stderr.

use std::time::Duration;

use alttext_bulk::RunError;
use alttext_core::{RunOutcome, SelectionSet};
use alttext_events::{Event, EventStream};
use anyhow::anyhow;
use tokio::task::JoinHandle;

use crate::cli::{GenerateArgs, OutputFormat};
use crate::client::{CliContext, CliError, CliResult, classify_config_error};
use crate::output::{format_item_progress, render_run_outcome};

const PROGRESS_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) async fn handle_generate(ctx: &CliContext, args: GenerateArgs) -> CliResult<()> {
    let printer = (ctx.output == OutputFormat::Table)
        .then(|| spawn_progress_printer(ctx.services.events.subscribe(None)));

    let result = generate(ctx, &args).await;
    if let Some(mut printer) = printer
        && tokio::time::timeout(PROGRESS_DRAIN_TIMEOUT, &mut printer)
            .await
            .is_err()
    {
        printer.abort();
    }
    let outcome = result?;

    let controller = &ctx.services.controller;
    let usage = if outcome.quota_exceeded {
        controller.last_usage()
    } else {
        None
    };
    let pricing_url = ctx.services.licensing.pricing_url();
    println!(
        "{}",
        render_run_outcome(&outcome, usage.as_ref(), &pricing_url, ctx.output)?
    );
    Ok(())
}

/// Run the selection, honouring an explicit mode flag over the stored setting.
pub(crate) async fn generate(ctx: &CliContext, args: &GenerateArgs) -> CliResult<RunOutcome> {
    let selection = SelectionSet::new(args.ids.iter().copied());
    let controller = &ctx.services.controller;
    let result = match args.mode() {
        Some(parallel) => controller.run(selection, parallel).await,
        None => controller.run_configured(selection).await,
    };
    result.map_err(|err| classify_run_error(&err))
}

fn classify_run_error(err: &RunError) -> CliError {
    match err {
        RunError::EmptySelection => CliError::validation(err.to_string()),
        RunError::MissingLicenseKey => CliError::validation(
            "License key not configured (run `alttext license set <KEY>`)",
        ),
        RunError::AlreadyRunning => CliError::failure(anyhow!(err.to_string())),
        RunError::Settings { source } => classify_config_error(source),
    }
}

fn spawn_progress_printer(mut events: EventStream) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut progress = ProgressLines::default();
        while let Some(envelope) = events.next().await {
            if let Some(line) = progress.line(&envelope.event) {
                eprintln!("{line}");
            }
            if progress.finished {
                break;
            }
        }
    })
}

/// Turns run events into progress lines.
#[derive(Default)]
struct ProgressLines {
    total: usize,
    done: usize,
    finished: bool,
}

impl ProgressLines {
    fn line(&mut self, event: &Event) -> Option<String> {
        match event {
            Event::RunStarted {
                total, parallel, ..
            } => {
                self.total = *total;
                let mode = if *parallel { "batched" } else { "one at a time" };
                Some(format!("Generating alt text for {total} image(s), {mode}"))
            }
            Event::ItemStatusChanged {
                asset_id,
                status,
                message,
                ..
            } if status.is_terminal() => {
                self.done += 1;
                Some(format_item_progress(
                    self.done,
                    self.total,
                    *asset_id,
                    *status,
                    message.as_deref(),
                ))
            }
            Event::UpgradeRequired { .. } => {
                Some("Usage limit reached; remaining images were not processed".to_string())
            }
            Event::RunCompleted { .. } | Event::RunRejected { .. } => {
                self.finished = true;
                None
            }
            _ => None,
        }
    }
}
