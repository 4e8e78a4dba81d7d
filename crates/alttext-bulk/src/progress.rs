//! Observable progress of the most recent run.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alttext_core::{AssetId, ItemStatus};
use serde::Serialize;
use uuid::Uuid;

/// Progress view of the current or most recent run.
///
/// `total` and `completed` are transient and cleared shortly after the run
/// ends; `statuses` stay until the next run starts.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunProgress {
    /// Run the view belongs to.
    pub run_id: Option<Uuid>,
    /// Whether the run is still dispatching.
    pub running: bool,
    /// Number of selected assets.
    pub total: usize,
    /// Number of assets with a final status.
    pub completed: usize,
    /// Latest status per selected asset.
    pub statuses: BTreeMap<AssetId, ItemStatus>,
}

impl RunProgress {
    /// Completion percentage, rounded down.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let ratio = self.completed.min(self.total) * 100 / self.total;
        u8::try_from(ratio).unwrap_or(100)
    }
}

/// Shared handle to a [`RunProgress`].
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<Mutex<RunProgress>>,
}

impl ProgressTracker {
    /// Current progress view.
    #[must_use]
    pub fn snapshot(&self) -> RunProgress {
        self.lock().clone()
    }

    pub(crate) fn begin(&self, run_id: Uuid, ids: &[AssetId]) {
        *self.lock() = RunProgress {
            run_id: Some(run_id),
            running: true,
            total: ids.len(),
            completed: 0,
            statuses: ids.iter().map(|id| (*id, ItemStatus::Pending)).collect(),
        };
    }

    pub(crate) fn record(&self, id: AssetId, status: ItemStatus) {
        let mut progress = self.lock();
        let previous = progress.statuses.insert(id, status);
        if status.is_terminal() && !previous.is_some_and(ItemStatus::is_terminal) {
            progress.completed += 1;
        }
    }

    pub(crate) fn finish(&self) {
        self.lock().running = false;
    }

    /// Stop `run_id` without a completion display; returns whether it was current.
    pub(crate) fn abandon(&self, run_id: Uuid) -> bool {
        let mut progress = self.lock();
        if progress.run_id != Some(run_id) {
            return false;
        }
        progress.running = false;
        progress.total = 0;
        progress.completed = 0;
        true
    }

    /// Clear the transient counters if `run_id` is still the latest finished run.
    pub(crate) fn reset_counters(&self, run_id: Uuid) -> bool {
        let mut progress = self.lock();
        if progress.run_id != Some(run_id) || progress.running {
            return false;
        }
        progress.total = 0;
        progress.completed = 0;
        true
    }

    fn lock(&self) -> MutexGuard<'_, RunProgress> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
