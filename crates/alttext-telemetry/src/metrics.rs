//! Prometheus-backed metrics registry and snapshot helpers.

use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{TelemetryError, TelemetryResult};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    events_emitted_total: IntCounterVec,
    generations_total: IntCounterVec,
    bulk_runs_total: IntCounterVec,
    quota_exhausted_total: IntCounter,
    active_runs: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Runs currently dispatching work.
    pub active_runs: i64,
    /// Items that received alt text.
    pub generations_succeeded: u64,
    /// Items that failed for reasons other than the quota.
    pub generations_failed: u64,
    /// Items the generator rejected because of the quota.
    pub generations_quota: u64,
    /// Items never sent because the quota ran out earlier in the run.
    pub generations_skipped: u64,
    /// Runs stopped by an exhausted quota.
    pub quota_exhausted_total: u64,
}

/// Outcome label attached to `generations_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Alt text was generated and saved.
    Success,
    /// The item failed.
    Failed,
    /// The generator rejected the item because of the quota.
    Quota,
    /// The item was never sent because the quota ran out first.
    Skipped,
}

impl GenerationOutcome {
    const fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Quota => "quota",
            Self::Skipped => "skipped",
        }
    }
}

fn register<C>(registry: &Registry, name: &'static str, collector: C) -> TelemetryResult<C>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    Ok(collector)
}

fn counter_vec(
    name: &'static str,
    help: &str,
    labels: &[&str],
) -> TelemetryResult<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> TelemetryResult<Self> {
        let registry = Registry::new();

        let http_requests_total = register(
            &registry,
            "http_requests_total",
            counter_vec(
                "http_requests_total",
                "Total HTTP requests received",
                &["route", "code"],
            )?,
        )?;
        let events_emitted_total = register(
            &registry,
            "events_emitted_total",
            counter_vec(
                "events_emitted_total",
                "Domain events emitted by type",
                &["type"],
            )?,
        )?;
        let generations_total = register(
            &registry,
            "generations_total",
            counter_vec(
                "generations_total",
                "Alt-text generation attempts by outcome",
                &["outcome"],
            )?,
        )?;
        let bulk_runs_total = register(
            &registry,
            "bulk_runs_total",
            counter_vec(
                "bulk_runs_total",
                "Completed bulk runs by summary",
                &["summary"],
            )?,
        )?;
        let quota_exhausted_total = register(
            &registry,
            "quota_exhausted_total",
            IntCounter::with_opts(Opts::new(
                "quota_exhausted_total",
                "Runs halted because the usage quota was exhausted",
            ))
            .map_err(|source| TelemetryError::MetricsRegister {
                name: "quota_exhausted_total",
                source,
            })?,
        )?;
        let active_runs = register(
            &registry,
            "active_runs",
            IntGauge::with_opts(Opts::new("active_runs", "Bulk runs currently in flight"))
                .map_err(|source| TelemetryError::MetricsRegister {
                    name: "active_runs",
                    source,
                })?,
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                events_emitted_total,
                generations_total,
                bulk_runs_total,
                quota_exhausted_total,
                active_runs,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Record the outcome of one item.
    pub fn inc_generation(&self, outcome: GenerationOutcome) {
        self.inner
            .generations_total
            .with_label_values(&[outcome.label()])
            .inc();
    }

    /// Record a completed run under its summary category.
    pub fn inc_bulk_run(&self, summary: &str) {
        self.inner
            .bulk_runs_total
            .with_label_values(&[summary])
            .inc();
    }

    /// Record a run halted by the usage quota.
    pub fn inc_quota_exhausted(&self) {
        self.inner.quota_exhausted_total.inc();
    }

    /// Mark a run as started.
    pub fn run_started(&self) {
        self.inner.active_runs.inc();
    }

    /// Mark a run as finished.
    pub fn run_finished(&self) {
        self.inner.active_runs.dec();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let generations = &self.inner.generations_total;
        let count = |outcome: GenerationOutcome| generations.with_label_values(&[outcome.label()]).get();
        MetricsSnapshot {
            active_runs: self.inner.active_runs.get(),
            generations_succeeded: count(GenerationOutcome::Success),
            generations_failed: count(GenerationOutcome::Failed),
            generations_quota: count(GenerationOutcome::Quota),
            generations_skipped: count(GenerationOutcome::Skipped),
            quota_exhausted_total: self.inner.quota_exhausted_total.get(),
        }
    }
}
