//! Run-scoped state shared by the controller and the dispatcher.

use alttext_core::{AssetId, ItemError, ItemStatus, RunOutcome, SelectionSet};
use alttext_events::{Event, EventBus, EventId};
use alttext_telemetry::{GenerationOutcome, Metrics};
use tracing::warn;
use uuid::Uuid;

use crate::progress::ProgressTracker;

/// Mutable state of one run.
///
/// Every status change goes through here so the outcome, the progress view,
/// the event stream, and metrics stay in step. Dropping a context that was
/// never finished marks the run abandoned and clears its progress counters.
pub struct RunContext {
    run_id: Uuid,
    events: EventBus,
    metrics: Metrics,
    progress: ProgressTracker,
    outcome: RunOutcome,
    finished: bool,
}

impl RunContext {
    /// Start tracking `selection`, marking every asset pending.
    #[must_use]
    pub fn begin(
        run_id: Uuid,
        selection: &SelectionSet,
        events: EventBus,
        metrics: Metrics,
        progress: ProgressTracker,
    ) -> Self {
        progress.begin(run_id, selection.ids());
        let mut context = Self {
            run_id,
            events,
            metrics,
            progress,
            outcome: RunOutcome::default(),
            finished: false,
        };
        for id in selection.ids() {
            context.set_status(*id, ItemStatus::Pending, None);
        }
        context
    }

    /// Identifier of the run.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Outcome accumulated so far.
    #[must_use]
    pub const fn outcome(&self) -> &RunOutcome {
        &self.outcome
    }

    /// Whether the quota was exhausted during the run.
    #[must_use]
    pub const fn quota_exceeded(&self) -> bool {
        self.outcome.quota_exceeded
    }

    /// Record saved alt text for `id`.
    pub fn record_success(&mut self, id: AssetId, text: String) {
        self.metrics.inc_generation(GenerationOutcome::Success);
        self.outcome.success_count += 1;
        self.outcome.errors.remove(&id);
        self.outcome.alt_texts.insert(id, text);
        self.set_status(id, ItemStatus::Success, None);
    }

    /// Record a failure for `id`.
    pub fn record_failure(&mut self, id: AssetId, error: &ItemError) {
        let outcome = if error.is_quota_exceeded() {
            GenerationOutcome::Quota
        } else if matches!(error, ItemError::Skipped) {
            GenerationOutcome::Skipped
        } else {
            GenerationOutcome::Failed
        };
        self.metrics.inc_generation(outcome);
        let message = error.to_string();
        self.outcome.errors.insert(id, message.clone());
        self.set_status(id, ItemStatus::Failed, Some(message));
    }

    /// Flag the run as stopped by the usage quota.
    pub fn mark_quota_exceeded(&mut self) {
        self.outcome.quota_exceeded = true;
    }

    /// Publish `event` on the bus, counting it in metrics.
    pub fn publish(&self, event: Event) -> EventId {
        self.metrics.inc_event(event.kind());
        self.events.publish(event)
    }

    /// Stop tracking and hand back the outcome.
    #[must_use]
    pub fn finish(mut self) -> RunOutcome {
        self.finished = true;
        std::mem::take(&mut self.outcome)
    }

    fn set_status(&mut self, id: AssetId, status: ItemStatus, message: Option<String>) {
        self.outcome.statuses.insert(id, status);
        self.progress.record(id, status);
        self.publish(Event::ItemStatusChanged {
            run_id: self.run_id,
            asset_id: id,
            status,
            message,
        });
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        if self.finished {
            self.progress.finish();
            return;
        }
        warn!(run_id = %self.run_id, "bulk run abandoned before completion");
        if self.progress.abandon(self.run_id) {
            self.publish(Event::ProgressReset {
                run_id: self.run_id,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alttext_core::GenerationError;

    #[test]
    fn status_changes_flow_to_outcome_progress_and_events() {
        let events = EventBus::new();
        let metrics = Metrics::new().expect("metrics");
        let progress = ProgressTracker::default();
        let run_id = Uuid::new_v4();
        let mut context = RunContext::begin(
            run_id,
            &SelectionSet::new([1, 2, 3]),
            events.clone(),
            metrics.clone(),
            progress.clone(),
        );

        context.record_success(1, "A harbour at dawn".into());
        context.record_failure(2, &ItemError::from(GenerationError::from_message(
            "Usage limit exceeded",
        )));
        context.record_failure(3, &ItemError::Skipped);
        context.mark_quota_exceeded();
        let outcome = context.finish();

        assert_eq!(outcome.success_count, 1);
        assert_eq!(outcome.error_count(), 2);
        assert!(outcome.quota_exceeded);
        assert_eq!(outcome.status(3), ItemStatus::Failed);
        assert_eq!(
            outcome.errors.get(&3).map(String::as_str),
            Some("Not attempted: usage limit exceeded")
        );

        let snapshot = progress.snapshot();
        assert!(!snapshot.running);
        assert_eq!(snapshot.completed, 3);

        // Three pending transitions followed by three final ones.
        let changes = events
            .backlog()
            .into_iter()
            .filter(|envelope| matches!(envelope.event, Event::ItemStatusChanged { .. }))
            .count();
        assert_eq!(changes, 6);

        let counts = metrics.snapshot();
        assert_eq!(counts.generations_succeeded, 1);
        assert_eq!(counts.generations_quota, 1);
        assert_eq!(counts.generations_skipped, 1);
    }

    #[test]
    fn dropping_an_unfinished_run_clears_progress() {
        let events = EventBus::new();
        let progress = ProgressTracker::default();
        let run_id = Uuid::new_v4();
        let mut context = RunContext::begin(
            run_id,
            &SelectionSet::new([1, 2]),
            events.clone(),
            Metrics::new().expect("metrics"),
            progress.clone(),
        );
        context.record_success(1, "A quiet street".into());
        drop(context);

        let snapshot = progress.snapshot();
        assert!(!snapshot.running);
        assert_eq!((snapshot.total, snapshot.completed), (0, 0));
        assert_eq!(snapshot.statuses[&1], ItemStatus::Success);
        assert_eq!(snapshot.statuses[&2], ItemStatus::Pending);
        assert!(
            events
                .backlog()
                .iter()
                .any(|envelope| envelope.event == Event::ProgressReset { run_id })
        );
    }
}
