//! Run lifecycle: validation, dispatch, summary, and the upgrade prompt.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use alttext_config::SettingsStore;
use alttext_core::{RunOutcome, SelectionSet, UsageSnapshot};
use alttext_events::{Event, EventBus, EventId};
use alttext_telemetry::Metrics;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::RunContext;
use crate::dispatcher::Dispatcher;
use crate::error::{RunError, RunResult};
use crate::progress::{ProgressTracker, RunProgress};

/// Lifecycle state of the controller.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    /// No run in progress.
    #[default]
    Idle,
    /// Items are being dispatched.
    Running,
    /// Dispatch finished; the summary is being produced.
    Completing,
}

/// Owns bulk runs end to end.
///
/// Only one run executes at a time. Rejected runs publish
/// [`Event::RunRejected`] and never produce an outcome.
#[derive(Clone)]
pub struct BulkController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    dispatcher: Dispatcher,
    settings: Arc<dyn SettingsStore>,
    events: EventBus,
    metrics: Metrics,
    progress: ProgressTracker,
    progress_reset_delay: Duration,
    state: Mutex<ControllerState>,
    last_usage: Mutex<Option<UsageSnapshot>>,
}

/// Returns the controller to `Idle` however the run ends.
struct ActiveRun<'a> {
    inner: &'a ControllerInner,
}

impl<'a> ActiveRun<'a> {
    fn enter(inner: &'a ControllerInner) -> RunResult<Self> {
        let mut state = lock(&inner.state);
        if *state != ControllerState::Idle {
            return Err(RunError::AlreadyRunning);
        }
        *state = ControllerState::Running;
        inner.metrics.run_started();
        Ok(Self { inner })
    }

    fn completing(&self) {
        *lock(&self.inner.state) = ControllerState::Completing;
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        *lock(&self.inner.state) = ControllerState::Idle;
        self.inner.metrics.run_finished();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BulkController {
    /// Build a controller.
    ///
    /// `progress_reset_delay` is how long transient progress counters stay
    /// visible after a run completes.
    #[must_use]
    pub fn new(
        dispatcher: Dispatcher,
        settings: Arc<dyn SettingsStore>,
        events: EventBus,
        metrics: Metrics,
        progress_reset_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                dispatcher,
                settings,
                events,
                metrics,
                progress: ProgressTracker::default(),
                progress_reset_delay,
                state: Mutex::new(ControllerState::Idle),
                last_usage: Mutex::new(None),
            }),
        }
    }

    /// Dispatcher used for runs.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        *lock(&self.inner.state)
    }

    /// Progress of the current or most recent run.
    #[must_use]
    pub fn progress(&self) -> RunProgress {
        self.inner.progress.snapshot()
    }

    /// Usage snapshot cached by the most recent refresh.
    #[must_use]
    pub fn last_usage(&self) -> Option<UsageSnapshot> {
        lock(&self.inner.last_usage).clone()
    }

    /// Usage for the current period, fetched on first use.
    ///
    /// Returns `None` without a license key or when the lookup fails.
    pub async fn usage(&self) -> Option<UsageSnapshot> {
        if let Some(usage) = self.last_usage() {
            return Some(usage);
        }
        self.refresh_usage().await
    }

    /// Fetch usage from the gateway and cache it.
    ///
    /// Returns `None` without a license key or when the lookup fails.
    pub async fn refresh_usage(&self) -> Option<UsageSnapshot> {
        match self.inner.settings.license_key().await {
            Ok(Some(_)) => {}
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "failed to read settings for usage refresh");
                return None;
            }
        }
        match self.inner.dispatcher.processor().gateway().usage_snapshot().await {
            Ok(usage) => {
                self.publish(Event::UsageRefreshed {
                    used: usage.used,
                    limit: usage.limit,
                });
                *lock(&self.inner.last_usage) = Some(usage.clone());
                Some(usage)
            }
            Err(err) => {
                debug!(error = %err, "usage refresh failed");
                None
            }
        }
    }

    /// Run `selection` using the parallel flag from plugin settings.
    ///
    /// # Errors
    ///
    /// See [`BulkController::run`].
    pub async fn run_configured(&self, selection: SelectionSet) -> RunResult<RunOutcome> {
        let parallel = match self.inner.settings.load().await {
            Ok(settings) => settings.bulk_processing_parallel_enabled,
            Err(source) => return Err(self.reject(RunError::Settings { source })),
        };
        self.run(selection, parallel).await
    }

    /// Generate alt text for every asset in `selection`.
    ///
    /// Item failures are part of the returned outcome; only a rejected run
    /// returns an error.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::EmptySelection`] or [`RunError::MissingLicenseKey`]
    /// when validation fails, [`RunError::AlreadyRunning`] while another run is
    /// active, and [`RunError::Settings`] when settings cannot be read.
    pub async fn run(&self, selection: SelectionSet, parallel: bool) -> RunResult<RunOutcome> {
        if let Err(err) = self.validate(&selection).await {
            return Err(self.reject(err));
        }
        let active = ActiveRun::enter(&self.inner).map_err(|err| self.reject(err))?;

        let run_id = Uuid::new_v4();
        info!(%run_id, total = selection.len(), parallel, "bulk run started");
        self.publish(Event::RunStarted {
            run_id,
            total: selection.len(),
            parallel,
        });

        let mut context = RunContext::begin(
            run_id,
            &selection,
            self.inner.events.clone(),
            self.inner.metrics.clone(),
            self.inner.progress.clone(),
        );
        self.inner
            .dispatcher
            .dispatch(&selection, parallel, &mut context)
            .await;

        active.completing();
        let outcome = context.finish();
        if outcome.quota_exceeded {
            self.prompt_upgrade().await;
        }

        let summary = outcome.summary();
        self.inner.metrics.inc_bulk_run(summary.as_str());
        self.publish(Event::RunCompleted {
            run_id,
            success_count: outcome.success_count,
            error_count: outcome.error_count(),
            quota_exceeded: outcome.quota_exceeded,
            summary,
        });
        info!(
            %run_id,
            success_count = outcome.success_count,
            error_count = outcome.error_count(),
            quota_exceeded = outcome.quota_exceeded,
            summary = summary.as_str(),
            "bulk run completed"
        );
        self.schedule_progress_reset(run_id);
        drop(active);
        Ok(outcome)
    }

    /// Process `selection` outside the controller lifecycle.
    ///
    /// Used by request handlers that return per-item results directly; the
    /// run does not block or appear in [`BulkController::progress`].
    pub async fn process_batch(&self, selection: &SelectionSet, parallel: bool) -> RunOutcome {
        let mut context = RunContext::begin(
            Uuid::new_v4(),
            selection,
            self.inner.events.clone(),
            self.inner.metrics.clone(),
            ProgressTracker::default(),
        );
        self.inner
            .dispatcher
            .dispatch(selection, parallel, &mut context)
            .await;
        context.finish()
    }

    async fn validate(&self, selection: &SelectionSet) -> RunResult<()> {
        if selection.is_empty() {
            return Err(RunError::EmptySelection);
        }
        if self.inner.settings.license_key().await?.is_none() {
            return Err(RunError::MissingLicenseKey);
        }
        Ok(())
    }

    fn reject(&self, err: RunError) -> RunError {
        warn!(reason = %err, "bulk run rejected");
        self.publish(Event::RunRejected {
            reason: err.to_string(),
        });
        err
    }

    async fn prompt_upgrade(&self) {
        self.inner.metrics.inc_quota_exhausted();
        // Best effort; the prompt is shown even without fresh numbers.
        let usage = self.refresh_usage().await;
        self.publish(Event::UpgradeRequired {
            used: usage.as_ref().map(|usage| usage.used),
            limit: usage.as_ref().map(|usage| usage.limit),
        });
    }

    fn schedule_progress_reset(&self, run_id: Uuid) {
        let progress = self.inner.progress.clone();
        let events = self.inner.events.clone();
        let metrics = self.inner.metrics.clone();
        let delay = self.inner.progress_reset_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if progress.reset_counters(run_id) {
                let event = Event::ProgressReset { run_id };
                metrics.inc_event(event.kind());
                events.publish(event);
            }
        });
    }

    fn publish(&self, event: Event) -> EventId {
        self.inner.metrics.inc_event(event.kind());
        self.inner.events.publish(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alttext_config::{LicenseKey, MemorySettingsStore, PluginSettings};
    use alttext_core::{AssetStore, GenerationError, ItemStatus, QuotaGateway, RunSummary};
    use alttext_events::EventEnvelope;
    use alttext_test_support::{
        GatewayCall, MemoryAssetStore, PassthroughNormalizer, Reply, ScriptedGateway,
        document_asset, image_asset,
    };

    use crate::processor::ItemProcessor;

    const RESET_DELAY: Duration = Duration::from_secs(3);

    struct Harness {
        controller: BulkController,
        gateway: Arc<ScriptedGateway>,
        events: EventBus,
        metrics: Metrics,
    }

    fn licensed() -> MemorySettingsStore {
        MemorySettingsStore::with_license_key(LicenseKey::parse("strapix_test").expect("key"))
    }

    fn harness(
        store: MemoryAssetStore,
        gateway: ScriptedGateway,
        settings: MemorySettingsStore,
    ) -> Harness {
        let gateway = Arc::new(gateway);
        let processor = ItemProcessor::new(
            Arc::new(store) as Arc<dyn AssetStore>,
            Arc::new(PassthroughNormalizer),
            Arc::clone(&gateway) as Arc<dyn QuotaGateway>,
        );
        let events = EventBus::new();
        let metrics = Metrics::new().expect("metrics");
        let controller = BulkController::new(
            Dispatcher::new(processor),
            Arc::new(settings),
            events.clone(),
            metrics.clone(),
            RESET_DELAY,
        );
        Harness {
            controller,
            gateway,
            events,
            metrics,
        }
    }

    fn images(ids: impl IntoIterator<Item = u64>) -> MemoryAssetStore {
        MemoryAssetStore::with_assets(ids.into_iter().map(image_asset))
    }

    fn events_of(bus: &EventBus, kind: &str) -> Vec<EventEnvelope> {
        bus.backlog()
            .into_iter()
            .filter(|envelope| envelope.event.kind() == kind)
            .collect()
    }

    #[tokio::test]
    async fn sequential_success_reports_success_summary() {
        let harness = harness(images(1..=3), ScriptedGateway::new(), licensed());
        let outcome = harness
            .controller
            .run(SelectionSet::new([1, 2, 3]), false)
            .await
            .expect("run accepted");

        assert_eq!(outcome.success_count, 3);
        assert_eq!(outcome.summary(), RunSummary::Success);
        assert_eq!(harness.controller.state(), ControllerState::Idle);

        let completed = events_of(&harness.events, "run_completed");
        assert_eq!(completed.len(), 1);
        assert!(matches!(
            completed[0].event,
            Event::RunCompleted {
                success_count: 3,
                error_count: 0,
                quota_exceeded: false,
                summary: RunSummary::Success,
                ..
            }
        ));
        assert!(events_of(&harness.events, "upgrade_required").is_empty());
        assert_eq!(harness.metrics.snapshot().active_runs, 0);
    }

    #[tokio::test]
    async fn parallel_quota_prompts_upgrade_with_refreshed_usage() {
        let mut usage = UsageSnapshot::free_tier(chrono::Utc::now());
        usage.used = 10;
        let harness = harness(
            images(1..=12),
            ScriptedGateway::new()
                .with_reply(7, Reply::Quota)
                .with_usage(Ok(usage)),
            licensed(),
        );
        let outcome = harness
            .controller
            .run(SelectionSet::new(1..=12), true)
            .await
            .expect("run accepted");

        assert!(outcome.quota_exceeded);
        assert_eq!(outcome.success_count, 6);
        assert_eq!(outcome.summary(), RunSummary::Success);
        assert!(harness.gateway.calls().contains(&GatewayCall::Usage));

        let prompts = events_of(&harness.events, "upgrade_required");
        assert_eq!(prompts.len(), 1);
        assert_eq!(
            prompts[0].event,
            Event::UpgradeRequired {
                used: Some(10),
                limit: Some(10)
            }
        );
        assert_eq!(harness.controller.last_usage().map(|usage| usage.used), Some(10));
        assert_eq!(harness.metrics.snapshot().quota_exhausted_total, 1);
    }

    #[tokio::test]
    async fn failed_usage_refresh_is_swallowed() {
        let harness = harness(
            images([1]),
            ScriptedGateway::new()
                .with_reply(1, Reply::Quota)
                .with_usage(Err(GenerationError::from_message("connection refused"))),
            licensed(),
        );
        let outcome = harness
            .controller
            .run(SelectionSet::new([1]), false)
            .await
            .expect("run accepted");

        assert!(outcome.quota_exceeded);
        assert_eq!(outcome.summary(), RunSummary::Warning);
        assert_eq!(
            events_of(&harness.events, "upgrade_required")[0].event,
            Event::UpgradeRequired {
                used: None,
                limit: None
            }
        );
    }

    #[tokio::test]
    async fn non_image_selection_yields_warning() {
        let harness = harness(
            MemoryAssetStore::with_assets([document_asset(9)]),
            ScriptedGateway::new(),
            licensed(),
        );
        let outcome = harness
            .controller
            .run(SelectionSet::new([9]), false)
            .await
            .expect("run accepted");

        assert_eq!(outcome.status(9), ItemStatus::Failed);
        assert_eq!(outcome.errors[&9], "File is not an image");
        assert_eq!(outcome.success_count, 0);
        assert_eq!(outcome.summary(), RunSummary::Warning);
    }

    #[tokio::test]
    async fn missing_license_key_rejects_before_processing() {
        let harness = harness(
            images([1]),
            ScriptedGateway::new(),
            MemorySettingsStore::new(PluginSettings::default()),
        );
        let err = harness
            .controller
            .run(SelectionSet::new([1]), false)
            .await
            .expect_err("rejected");

        assert!(matches!(err, RunError::MissingLicenseKey));
        assert!(harness.gateway.calls().is_empty());
        assert!(events_of(&harness.events, "run_started").is_empty());
        let rejected = events_of(&harness.events, "run_rejected");
        assert_eq!(
            rejected[0].event,
            Event::RunRejected {
                reason: "License key not configured".into()
            }
        );
        assert_eq!(harness.controller.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn empty_selection_is_rejected() {
        let harness = harness(images([1]), ScriptedGateway::new(), licensed());
        let err = harness
            .controller
            .run(SelectionSet::default(), true)
            .await
            .expect_err("rejected");
        assert!(matches!(err, RunError::EmptySelection));
        assert_eq!(events_of(&harness.events, "run_rejected").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_runs_are_refused() {
        let harness = harness(
            images(1..=2),
            ScriptedGateway::new().with_delay(1, Duration::from_secs(5)),
            licensed(),
        );
        let first = {
            let controller = harness.controller.clone();
            tokio::spawn(async move { controller.run(SelectionSet::new([1]), false).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(harness.controller.state(), ControllerState::Running);

        let err = harness
            .controller
            .run(SelectionSet::new([2]), false)
            .await
            .expect_err("second run refused");
        assert!(matches!(err, RunError::AlreadyRunning));

        let outcome = first.await.expect("join").expect("first run accepted");
        assert_eq!(outcome.success_count, 1);
        assert_eq!(harness.controller.state(), ControllerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_run_releases_the_controller_and_progress() {
        let harness = harness(
            images(1..=2),
            ScriptedGateway::new().with_delay(1, Duration::from_secs(5)),
            licensed(),
        );
        let task = {
            let controller = harness.controller.clone();
            tokio::spawn(async move { controller.run(SelectionSet::new([1, 2]), false).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(harness.controller.progress().running);

        task.abort();
        assert!(task.await.expect_err("aborted").is_cancelled());
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(harness.controller.state(), ControllerState::Idle);
        let progress = harness.controller.progress();
        assert!(!progress.running);
        assert_eq!((progress.total, progress.completed), (0, 0));
        assert_eq!(events_of(&harness.events, "progress_reset").len(), 1);
        assert!(events_of(&harness.events, "run_completed").is_empty());
        assert_eq!(harness.metrics.snapshot().active_runs, 0);

        let outcome = harness
            .controller
            .run(SelectionSet::new([2]), false)
            .await
            .expect("next run accepted");
        assert_eq!(outcome.success_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_counters_clear_after_the_display_delay() {
        let harness = harness(images(1..=2), ScriptedGateway::new(), licensed());
        harness
            .controller
            .run(SelectionSet::new([1, 2]), false)
            .await
            .expect("run accepted");

        let progress = harness.controller.progress();
        assert_eq!((progress.total, progress.completed), (2, 2));
        assert_eq!(progress.percent(), 100);

        tokio::time::sleep(RESET_DELAY + Duration::from_millis(10)).await;
        let progress = harness.controller.progress();
        assert_eq!((progress.total, progress.completed), (0, 0));
        assert_eq!(progress.statuses[&1], ItemStatus::Success);
        assert_eq!(events_of(&harness.events, "progress_reset").len(), 1);
    }

    #[tokio::test]
    async fn run_configured_reads_the_parallel_flag() {
        let settings = MemorySettingsStore::new(PluginSettings {
            license_key: Some(LicenseKey::parse("strapix_test").expect("key")),
            bulk_processing_parallel_enabled: true,
            ..PluginSettings::default()
        });
        let harness = harness(images(1..=3), ScriptedGateway::new(), settings);
        harness
            .controller
            .run_configured(SelectionSet::new([1, 2, 3]))
            .await
            .expect("run accepted");
        assert_eq!(harness.gateway.calls(), vec![GatewayCall::Many(vec![1, 2, 3])]);
    }

    #[tokio::test]
    async fn usage_is_fetched_lazily_and_cached() {
        let harness = harness(images([1]), ScriptedGateway::new(), licensed());
        assert!(harness.controller.last_usage().is_none());
        assert!(harness.controller.usage().await.is_some());
        assert!(harness.controller.usage().await.is_some());
        assert_eq!(harness.gateway.calls(), vec![GatewayCall::Usage]);

        let unlicensed = harness_without_key();
        assert!(unlicensed.controller.usage().await.is_none());
        assert!(unlicensed.gateway.calls().is_empty());
    }

    fn harness_without_key() -> Harness {
        harness(
            images([1]),
            ScriptedGateway::new(),
            MemorySettingsStore::default(),
        )
    }
}
