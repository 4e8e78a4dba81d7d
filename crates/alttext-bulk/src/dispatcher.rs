//! Sequential and chunked-parallel dispatch of a selection.
//!
//! In parallel mode every chunk is submitted as one batch call and all chunks
//! are polled concurrently from the calling task. Results are applied strictly
//! in chunk order, so the final statuses do not depend on which batch returns
//! first. Alt text is only saved when its chunk is applied.

use alttext_core::{
    AssetId, CHUNK_SIZE, Chunk, GENERATION_FAILED, GenerationError, ItemError, SelectionSet,
};
use futures_util::StreamExt;
use futures_util::stream::FuturesOrdered;
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::processor::ItemProcessor;

/// Per-item results of one chunk, in chunk order.
struct ChunkReport {
    index: usize,
    entries: Vec<(AssetId, Result<String, ItemError>)>,
}

/// Walks a selection and records every item's outcome on a [`RunContext`].
#[derive(Clone)]
pub struct Dispatcher {
    processor: ItemProcessor,
}

impl Dispatcher {
    /// Dispatcher submitting [`CHUNK_SIZE`] assets per batch call.
    #[must_use]
    pub const fn new(processor: ItemProcessor) -> Self {
        Self { processor }
    }

    /// Processor used for individual assets.
    #[must_use]
    pub const fn processor(&self) -> &ItemProcessor {
        &self.processor
    }

    /// Process `selection`, recording outcomes on `context`.
    ///
    /// Failures never escape; they become item statuses. A quota failure
    /// stops the run early.
    pub async fn dispatch(&self, selection: &SelectionSet, parallel: bool, context: &mut RunContext) {
        if parallel {
            self.dispatch_parallel(selection, context).await;
        } else {
            self.dispatch_sequential(selection, context).await;
        }
    }

    async fn dispatch_sequential(&self, selection: &SelectionSet, context: &mut RunContext) {
        for &id in selection.ids() {
            match self.processor.process(id).await {
                Ok(text) => context.record_success(id, text),
                Err(err) => {
                    context.record_failure(id, &err);
                    if err.is_quota_exceeded() {
                        warn!(
                            run_id = %context.run_id(),
                            asset_id = id,
                            "usage limit reached; remaining items left pending"
                        );
                        context.mark_quota_exceeded();
                        return;
                    }
                }
            }
        }
    }

    async fn dispatch_parallel(&self, selection: &SelectionSet, context: &mut RunContext) {
        let chunks = selection.chunks(CHUNK_SIZE);
        info!(
            run_id = %context.run_id(),
            chunks = chunks.len(),
            "submitting chunk batches"
        );

        let mut in_flight: FuturesOrdered<_> =
            chunks.iter().map(|chunk| self.run_chunk(chunk)).collect();

        while let Some(report) = in_flight.next().await {
            let index = report.index;
            let Some(position) = self.apply(report, context).await else {
                continue;
            };

            // Results of later chunks are discarded unapplied.
            drop(in_flight);
            context.mark_quota_exceeded();
            let blocked = chunks[index].ids()[position + 1..]
                .iter()
                .chain(chunks[index + 1..].iter().flat_map(Chunk::ids));
            let mut skipped = 0_usize;
            for &id in blocked {
                context.record_failure(id, &ItemError::Skipped);
                skipped += 1;
            }
            warn!(
                run_id = %context.run_id(),
                chunk_index = index,
                skipped,
                "usage limit reached; remaining items blocked"
            );
            return;
        }
    }

    /// Apply a chunk's results; returns the position of a quota failure.
    async fn apply(&self, report: ChunkReport, context: &mut RunContext) -> Option<usize> {
        for (position, (id, result)) in report.entries.into_iter().enumerate() {
            match result {
                Ok(text) => match self.processor.persist(id, text).await {
                    Ok(text) => context.record_success(id, text),
                    Err(err) => context.record_failure(id, &err),
                },
                Err(err) if err.is_quota_exceeded() => {
                    context.record_failure(id, &err);
                    return Some(position);
                }
                Err(err) => context.record_failure(id, &err),
            }
        }
        None
    }

    async fn run_chunk(&self, chunk: &Chunk) -> ChunkReport {
        let mut slots: Vec<(AssetId, Option<Result<String, ItemError>>)> =
            Vec::with_capacity(chunk.len());
        let mut images = Vec::with_capacity(chunk.len());
        for &id in chunk.ids() {
            match self.processor.prepare(id).await {
                Ok(image) => {
                    slots.push((id, None));
                    images.push(image);
                }
                Err(err) => slots.push((id, Some(Err(err)))),
            }
        }

        let generated: Vec<Result<String, ItemError>> = if images.is_empty() {
            Vec::new()
        } else {
            match self.processor.gateway().generate_many(&images).await {
                Ok(results) => results
                    .into_iter()
                    .map(|result| result.into_text().map_err(ItemError::from))
                    .collect(),
                Err(err) => {
                    warn!(chunk_index = chunk.index(), error = %err, "batch generation failed");
                    vec![Err(ItemError::from(err)); images.len()]
                }
            }
        };
        debug!(
            chunk_index = chunk.index(),
            submitted = images.len(),
            returned = generated.len(),
            "chunk batch finished"
        );

        // Missing positions mean the remote returned fewer results than images.
        let mut generated = generated.into_iter();
        let entries = slots
            .into_iter()
            .map(|(id, slot)| {
                let result = slot.unwrap_or_else(|| {
                    generated.next().unwrap_or_else(|| {
                        Err(ItemError::from(GenerationError::from_message(
                            GENERATION_FAILED,
                        )))
                    })
                });
                (id, result)
            })
            .collect();

        ChunkReport {
            index: chunk.index(),
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use alttext_core::{AssetStore, ItemStatus, QuotaGateway, RunOutcome};
    use alttext_events::EventBus;
    use alttext_telemetry::Metrics;
    use alttext_test_support::{
        GatewayCall, MemoryAssetStore, PassthroughNormalizer, Reply, ScriptedGateway,
        document_asset, image_asset,
    };
    use uuid::Uuid;

    use crate::progress::ProgressTracker;

    struct Harness {
        store: Arc<MemoryAssetStore>,
        gateway: Arc<ScriptedGateway>,
        dispatcher: Dispatcher,
    }

    fn harness(store: MemoryAssetStore, gateway: ScriptedGateway) -> Harness {
        let store = Arc::new(store);
        let gateway = Arc::new(gateway);
        let processor = ItemProcessor::new(
            Arc::clone(&store) as Arc<dyn AssetStore>,
            Arc::new(PassthroughNormalizer),
            Arc::clone(&gateway) as Arc<dyn QuotaGateway>,
        );
        Harness {
            store,
            gateway,
            dispatcher: Dispatcher::new(processor),
        }
    }

    fn images(ids: impl IntoIterator<Item = AssetId>) -> MemoryAssetStore {
        MemoryAssetStore::with_assets(ids.into_iter().map(image_asset))
    }

    async fn run(harness: &Harness, ids: &[AssetId], parallel: bool) -> RunOutcome {
        let selection = SelectionSet::new(ids.iter().copied());
        let mut context = RunContext::begin(
            Uuid::new_v4(),
            &selection,
            EventBus::new(),
            Metrics::new().expect("metrics"),
            ProgressTracker::default(),
        );
        harness
            .dispatcher
            .dispatch(&selection, parallel, &mut context)
            .await;
        context.finish()
    }

    fn successes(outcome: &RunOutcome) -> usize {
        outcome
            .statuses
            .values()
            .filter(|status| **status == ItemStatus::Success)
            .count()
    }

    #[tokio::test]
    async fn sequential_run_processes_every_item_in_order() {
        let harness = harness(images(1..=3), ScriptedGateway::new());
        let outcome = run(&harness, &[1, 2, 3], false).await;

        assert_eq!(outcome.success_count, 3);
        assert_eq!(successes(&outcome), 3);
        assert!(!outcome.quota_exceeded);
        assert_eq!(
            harness.gateway.calls(),
            vec![GatewayCall::One(1), GatewayCall::One(2), GatewayCall::One(3)]
        );
        assert_eq!(harness.store.writes().len(), 3);
    }

    #[tokio::test]
    async fn sequential_quota_leaves_later_items_pending() {
        let harness = harness(
            images(1..=4),
            ScriptedGateway::new().with_reply(2, Reply::Quota),
        );
        let outcome = run(&harness, &[1, 2, 3, 4], false).await;

        assert!(outcome.quota_exceeded);
        assert_eq!(outcome.status(1), ItemStatus::Success);
        assert_eq!(outcome.status(2), ItemStatus::Failed);
        assert_eq!(outcome.status(3), ItemStatus::Pending);
        assert_eq!(outcome.status(4), ItemStatus::Pending);
        assert_eq!(outcome.error_count(), 1);
        assert_eq!(harness.gateway.generation_calls(), 2);
    }

    #[tokio::test]
    async fn sequential_failures_do_not_stop_the_run() {
        let harness = harness(
            MemoryAssetStore::with_assets([image_asset(1), document_asset(2), image_asset(3)]),
            ScriptedGateway::new().with_reply(1, Reply::Fail("Upstream timeout".into())),
        );
        let outcome = run(&harness, &[1, 2, 3, 4], false).await;

        assert_eq!(outcome.success_count, 1);
        assert_eq!(outcome.errors[&1], "Upstream timeout");
        assert_eq!(outcome.errors[&2], "File is not an image");
        assert_eq!(outcome.errors[&4], "File not found");
        assert_eq!(outcome.status(3), ItemStatus::Success);
    }

    #[tokio::test]
    async fn parallel_run_issues_one_batch_per_chunk() {
        let harness = harness(images(1..=12), ScriptedGateway::new());
        let ids: Vec<AssetId> = (1..=12).collect();
        let outcome = run(&harness, &ids, true).await;

        assert_eq!(outcome.success_count, 12);
        let mut batches: Vec<Vec<AssetId>> = harness
            .gateway
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Many(ids) => Some(ids),
                _ => None,
            })
            .collect();
        batches.sort();
        assert_eq!(
            batches,
            vec![vec![1, 2, 3, 4, 5], vec![6, 7, 8, 9, 10], vec![11, 12]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_quota_blocks_the_remaining_items() {
        // The first chunk finishes last; results must still apply in order.
        let harness = harness(
            images(1..=12),
            ScriptedGateway::new()
                .with_reply(7, Reply::Quota)
                .with_delay(1, Duration::from_secs(2))
                .with_delay(11, Duration::from_secs(1)),
        );
        let ids: Vec<AssetId> = (1..=12).collect();
        let outcome = run(&harness, &ids, true).await;

        assert!(outcome.quota_exceeded);
        for id in 1..=6 {
            assert_eq!(outcome.status(id), ItemStatus::Success, "asset {id}");
        }
        for id in 7..=12 {
            assert_eq!(outcome.status(id), ItemStatus::Failed, "asset {id}");
        }
        assert_eq!(outcome.success_count, 6);
        assert_eq!(successes(&outcome), outcome.success_count);
        assert_eq!(outcome.errors[&8], "Not attempted: usage limit exceeded");
        assert_eq!(outcome.errors[&12], "Not attempted: usage limit exceeded");
        assert!(outcome.errors[&7].contains("Usage limit exceeded"));
        assert_eq!(harness.store.alt_text(11), None);
        assert_eq!(harness.store.alt_text(8), None);
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_outcome_ignores_completion_order() {
        let ids: Vec<AssetId> = (1..=12).collect();
        let script = |slow: AssetId| {
            ScriptedGateway::new()
                .with_reply(4, Reply::Fail("Upstream timeout".into()))
                .with_reply(9, Reply::Quota)
                .with_delay(slow, Duration::from_secs(3))
        };

        let first = run(&harness(images(1..=12), script(1)), &ids, true).await;
        let second = run(&harness(images(1..=12), script(11)), &ids, true).await;
        assert_eq!(first.statuses, second.statuses);
        assert_eq!(first.errors, second.errors);
        assert_eq!(first.success_count, second.success_count);
    }

    #[tokio::test]
    async fn whole_chunk_failures_do_not_halt_later_chunks() {
        let harness = harness(
            images(1..=7),
            ScriptedGateway::new().with_batch_failure(3, "Network error"),
        );
        let ids: Vec<AssetId> = (1..=7).collect();
        let outcome = run(&harness, &ids, true).await;

        assert!(!outcome.quota_exceeded);
        for id in 1..=5 {
            assert_eq!(outcome.errors[&id], "Network error");
        }
        assert_eq!(outcome.status(6), ItemStatus::Success);
        assert_eq!(outcome.status(7), ItemStatus::Success);
        assert_eq!(outcome.success_count, 2);
    }

    #[tokio::test]
    async fn quota_rejected_batch_halts_the_run() {
        let harness = harness(
            images(1..=12),
            ScriptedGateway::new().with_batch_failure(6, "Usage limit exceeded"),
        );
        let ids: Vec<AssetId> = (1..=12).collect();
        let outcome = run(&harness, &ids, true).await;

        assert!(outcome.quota_exceeded);
        for id in 1..=5 {
            assert_eq!(outcome.status(id), ItemStatus::Success, "asset {id}");
        }
        for id in 6..=12 {
            assert_eq!(outcome.status(id), ItemStatus::Failed, "asset {id}");
        }
        assert!(outcome.errors[&6].contains("Usage limit exceeded"));
        assert_eq!(outcome.errors[&7], "Not attempted: usage limit exceeded");
        assert_eq!(outcome.errors[&11], "Not attempted: usage limit exceeded");
        assert_eq!(outcome.success_count, 5);
        assert_eq!(harness.store.alt_text(11), None);
    }

    #[tokio::test]
    async fn parallel_save_failures_stay_on_their_item() {
        let harness = harness(
            images(1..=6).with_failing_write(2),
            ScriptedGateway::new(),
        );
        let ids: Vec<AssetId> = (1..=6).collect();
        let outcome = run(&harness, &ids, true).await;

        assert!(!outcome.quota_exceeded);
        assert_eq!(outcome.status(2), ItemStatus::Failed);
        assert_eq!(outcome.errors[&2], "Failed to save alt text");
        assert!(!outcome.alt_texts.contains_key(&2));
        assert_eq!(outcome.success_count, 5);
        assert_eq!(successes(&outcome), 5);
        assert_eq!(harness.store.alt_text(2), None);
    }

    #[tokio::test]
    async fn parallel_local_failures_keep_their_own_messages() {
        let harness = harness(
            MemoryAssetStore::with_assets([image_asset(1), document_asset(2), image_asset(3)]),
            ScriptedGateway::new(),
        );
        let outcome = run(&harness, &[1, 2, 3], true).await;

        assert_eq!(outcome.success_count, 2);
        assert_eq!(outcome.errors[&2], "File is not an image");
        assert_eq!(harness.gateway.calls(), vec![GatewayCall::Many(vec![1, 3])]);
    }

    #[tokio::test]
    async fn rerunning_a_selection_is_stable() {
        let harness = harness(images(1..=6), ScriptedGateway::new());
        let ids: Vec<AssetId> = (1..=6).collect();
        let first = run(&harness, &ids, true).await;
        let second = run(&harness, &ids, true).await;
        assert_eq!(first.alt_texts, second.alt_texts);
        assert_eq!(first.success_count, 6);
    }
}
