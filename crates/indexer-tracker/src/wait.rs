//! Completion wait loop with stall detection.
//!
//! Enrichment workers push no completion signal, so the orchestrator
//! polls the tracker until the lineage converges. A lineage whose
//! settled count stops moving for `max_warnings` consecutive polls is
//! declared stalled and marked failed, converting a silent downstream
//! hang into a bounded, reported failure.

use std::time::Duration;

use tracing::{error, info, warn};

use indexer_types::Lineage;

use crate::tracker::IndexingTracker;

/// Poll timing for the wait loop.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Interval between polls
    pub poll_interval: Duration,
    /// Consecutive no-progress polls before declaring a stall
    pub max_warnings: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_warnings: 3,
        }
    }
}

/// How the wait loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Every expected document settled; the lineage was finalized.
    Completed,
    /// No progress for `max_warnings` polls; the lineage was marked
    /// failed.
    Stalled,
}

/// Block until the lineage converges or stalls.
///
/// Converging finalizes the lineage as completed; stalling marks it
/// failed. Either way the loop exits within
/// `max_warnings * poll_interval` of the last observed progress.
pub async fn wait_for_completion(
    tracker: &IndexingTracker,
    lineage: Lineage,
    config: &WaitConfig,
) -> WaitOutcome {
    let mut warning_count: u32 = 0;
    let mut previous_settled: u64 = 0;

    loop {
        let status = tracker.lineage_status(lineage);
        let settled = status.settled();

        if status.reached_expected() {
            info!(%lineage, settled, "All documents settled, marking lineage complete");
            tracker.finalize_tracking(lineage);
            return WaitOutcome::Completed;
        }
        info!(
            %lineage,
            expected = status.expected,
            processed = status.processed,
            failed = status.failed,
            "Indexing still in progress"
        );

        tokio::time::sleep(config.poll_interval).await;

        if settled == previous_settled {
            warning_count += 1;
            warn!(
                %lineage,
                warning = warning_count,
                max_warnings = config.max_warnings,
                "Potential hanging crawl detected, no progress since last check"
            );
            if warning_count >= config.max_warnings {
                error!(%lineage, "Max warnings reached, marking lineage as failed");
                tracker.mark_indexing_failed(lineage);
                return WaitOutcome::Stalled;
            }
        } else {
            warning_count = 0;
        }
        previous_settled = settled;
    }
}
