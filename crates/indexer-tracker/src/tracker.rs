//! Concurrent counters and the per-lineage state machine.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use indexer_types::{CrawlStatus, Lineage, OverallStatus};

use crate::history::CrawlHistory;

/// Per-lineage progress state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineageState {
    #[default]
    NotStarted,
    Running,
    Completed,
    Failed,
}

/// Point-in-time view of one lineage.
#[derive(Debug, Clone, Copy)]
pub struct LineageSnapshot {
    pub state: LineageState,
    /// Negative while the expected total is not yet finalized
    pub expected: i64,
    pub processed: u64,
    pub failed: u64,
}

impl LineageSnapshot {
    /// Documents that reached a terminal per-document outcome.
    pub fn settled(&self) -> u64 {
        self.processed + self.failed
    }

    /// Whether every expected document has settled. Never true while the
    /// expected total is unknown.
    pub fn reached_expected(&self) -> bool {
        self.expected >= 0 && self.settled() >= self.expected as u64
    }
}

#[derive(Debug, Default)]
struct LineageTrack {
    expected: AtomicI64,
    processed: AtomicU64,
    failed: AtomicU64,
    state: RwLock<LineageState>,
}

impl LineageTrack {
    fn reset(&self) {
        self.expected.store(0, Ordering::SeqCst);
        self.processed.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
        *self.write_state() = LineageState::NotStarted;
    }

    fn start(&self, expected: i64) {
        self.expected.store(expected, Ordering::SeqCst);
        self.processed.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
        *self.write_state() = LineageState::Running;
    }

    fn snapshot(&self) -> LineageSnapshot {
        LineageSnapshot {
            state: *self.read_state(),
            expected: self.expected.load(Ordering::SeqCst),
            processed: self.processed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, LineageState> {
        self.state.read().expect("lineage state lock poisoned")
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, LineageState> {
        self.state.write().expect("lineage state lock poisoned")
    }
}

/// Tracks one crawl at a time, plus a bounded history of finished crawls.
///
/// Counter increments are atomic and safe to call from any number of
/// concurrent enrichment tasks; state transitions are serialized behind
/// small locks held only for the transition itself.
#[derive(Debug)]
pub struct IndexingTracker {
    /// Vector-lineage signals expected per primary document
    chunk_fields_per_document: u64,
    crawl_id: RwLock<Option<String>>,
    overall: RwLock<OverallStatus>,
    start_time: RwLock<Option<DateTime<Utc>>>,
    end_time: RwLock<Option<DateTime<Utc>>>,
    message: RwLock<String>,
    primary: LineageTrack,
    vector: LineageTrack,
    history: CrawlHistory,
}

impl IndexingTracker {
    /// Create a tracker for a pipeline with `chunk_fields_per_document`
    /// chunked fields, retaining `history_limit` finished crawls.
    pub fn new(chunk_fields_per_document: u64, history_limit: usize) -> Self {
        Self {
            chunk_fields_per_document,
            crawl_id: RwLock::new(None),
            overall: RwLock::new(OverallStatus::NoneAvailable),
            start_time: RwLock::new(None),
            end_time: RwLock::new(None),
            message: RwLock::new(String::new()),
            primary: LineageTrack::default(),
            vector: LineageTrack::default(),
            history: CrawlHistory::new(history_limit),
        }
    }

    /// Clear all counters and state ahead of a new crawl.
    pub fn reset(&self) {
        self.primary.reset();
        self.vector.reset();
        *self.write(&self.crawl_id) = None;
        *self.write(&self.overall) = OverallStatus::NotStarted;
        *self.write(&self.start_time) = None;
        *self.write(&self.end_time) = None;
        *self.write(&self.message) = String::new();
    }

    /// Begin tracking a crawl. A negative `expected` means the source
    /// could not report a count; it is finalized later via
    /// [`IndexingTracker::finalize_expected`].
    pub fn start_tracking(&self, expected: i64, crawl_id: &str) {
        self.primary.start(expected);
        self.vector.start(self.vector_expected(expected));
        *self.write(&self.crawl_id) = Some(crawl_id.to_string());
        *self.write(&self.overall) = OverallStatus::Running;
        *self.write(&self.start_time) = Some(Utc::now());
        *self.write(&self.end_time) = None;
        *self.write(&self.message) = "Indexing started".to_string();
        info!(crawl_id, expected, "Started crawl tracking");
    }

    /// Set the expected totals once an open-ended crawl has seen its last
    /// page.
    pub fn finalize_expected(&self, expected: i64) {
        self.primary.expected.store(expected, Ordering::SeqCst);
        self.vector
            .expected
            .store(self.vector_expected(expected), Ordering::SeqCst);
        info!(expected, "Finalized expected document count");
    }

    fn vector_expected(&self, expected: i64) -> i64 {
        if expected < 0 {
            -1
        } else {
            expected * self.chunk_fields_per_document as i64
        }
    }

    /// Record a primary document reaching its terminal processed outcome.
    pub fn document_processed(&self) {
        self.primary.processed.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a primary document failing terminally.
    pub fn document_failed(&self) {
        self.primary.failed.fetch_add(1, Ordering::SeqCst);
    }

    /// Record one vector-lineage signal (one chunked field of one
    /// document) processed.
    pub fn vector_document_processed(&self) {
        self.vector.processed.fetch_add(1, Ordering::SeqCst);
    }

    /// Record one vector-lineage signal failed.
    pub fn vector_document_failed(&self) {
        self.vector.failed.fetch_add(1, Ordering::SeqCst);
    }

    /// Snapshot one lineage.
    pub fn lineage_status(&self, lineage: Lineage) -> LineageSnapshot {
        self.track(lineage).snapshot()
    }

    /// Mark a lineage completed, unless it already failed.
    pub fn finalize_tracking(&self, lineage: Lineage) {
        let track = self.track(lineage);
        let mut state = track.write_state();
        if *state != LineageState::Failed {
            *state = LineageState::Completed;
            info!(%lineage, "Lineage completed");
        }
    }

    /// Force a lineage into the failed state (stall detection).
    pub fn mark_indexing_failed(&self, lineage: Lineage) {
        *self.track(lineage).write_state() = LineageState::Failed;
        warn!(%lineage, "Lineage marked as failed");
    }

    /// Record the crawl's terminal status and retire it into history.
    pub fn update_crawl_status(&self, status: OverallStatus, message: &str) {
        *self.write(&self.overall) = status;
        *self.write(&self.message) = message.to_string();
        *self.write(&self.end_time) = Some(Utc::now());
        let snapshot = self.current_status();
        if !snapshot.crawl_id.is_empty() {
            self.history.record(snapshot);
        }
    }

    /// Latest known status of the current crawl, or the NONE_AVAILABLE
    /// sentinel when no crawl has ever started.
    pub fn current_status(&self) -> CrawlStatus {
        let crawl_id = match self.read(&self.crawl_id).clone() {
            Some(id) => id,
            None => return CrawlStatus::none_available(),
        };
        let primary = self.primary.snapshot();
        let vector = self.vector.snapshot();
        CrawlStatus {
            crawl_id,
            status: *self.read(&self.overall),
            documents_expected: primary.expected,
            documents_processed: primary.processed,
            documents_failed: primary.failed,
            vector_documents_expected: vector.expected,
            vector_documents_processed: vector.processed,
            vector_documents_failed: vector.failed,
            start_time: *self.read(&self.start_time),
            end_time: *self.read(&self.end_time),
            message: self.read(&self.message).clone(),
        }
    }

    /// Status of a crawl by id: the live crawl when it matches, otherwise
    /// the history entry.
    pub fn status_by_crawl_id(&self, crawl_id: &str) -> Option<CrawlStatus> {
        let current = self.current_status();
        if current.crawl_id == crawl_id {
            return Some(current);
        }
        self.history.get(crawl_id)
    }

    /// The most recent crawls, the live one first, then history.
    pub fn history(&self, limit: usize) -> Vec<CrawlStatus> {
        let mut entries = Vec::new();
        let current = self.current_status();
        if current.status == OverallStatus::Running {
            entries.push(current);
        }
        for entry in self.history.recent(limit) {
            if entries.len() >= limit {
                break;
            }
            if entries.iter().all(|e| e.crawl_id != entry.crawl_id) {
                entries.push(entry);
            }
        }
        entries
    }

    /// Whether a crawl is currently running.
    pub fn is_running(&self) -> bool {
        *self.read(&self.overall) == OverallStatus::Running
    }

    fn track(&self, lineage: Lineage) -> &LineageTrack {
        match lineage {
            Lineage::Primary => &self.primary,
            Lineage::Vector => &self.vector,
        }
    }

    fn read<'a, T>(&self, lock: &'a RwLock<T>) -> std::sync::RwLockReadGuard<'a, T> {
        lock.read().expect("tracker lock poisoned")
    }

    fn write<'a, T>(&self, lock: &'a RwLock<T>) -> std::sync::RwLockWriteGuard<'a, T> {
        lock.write().expect("tracker lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_none_available_before_any_crawl() {
        let tracker = IndexingTracker::new(1, 10);
        assert_eq!(
            tracker.current_status().status,
            OverallStatus::NoneAvailable
        );
        assert!(!tracker.is_running());
    }

    #[test]
    fn test_start_tracking_sets_running_and_expectations() {
        let tracker = IndexingTracker::new(2, 10);
        tracker.start_tracking(100, "crawl-1");

        let status = tracker.current_status();
        assert_eq!(status.status, OverallStatus::Running);
        assert_eq!(status.documents_expected, 100);
        // Two chunked fields: one vector signal per field per document
        assert_eq!(status.vector_documents_expected, 200);
        assert!(tracker.is_running());
    }

    #[test]
    fn test_unknown_expected_stays_unknown_for_both_lineages() {
        let tracker = IndexingTracker::new(3, 10);
        tracker.start_tracking(-1, "crawl-1");

        assert_eq!(tracker.lineage_status(Lineage::Primary).expected, -1);
        assert_eq!(tracker.lineage_status(Lineage::Vector).expected, -1);
        assert!(!tracker.lineage_status(Lineage::Primary).reached_expected());

        tracker.finalize_expected(40);
        assert_eq!(tracker.lineage_status(Lineage::Primary).expected, 40);
        assert_eq!(tracker.lineage_status(Lineage::Vector).expected, 120);
    }

    #[test]
    fn test_finalize_does_not_override_failed() {
        let tracker = IndexingTracker::new(1, 10);
        tracker.start_tracking(10, "crawl-1");
        tracker.mark_indexing_failed(Lineage::Primary);
        tracker.finalize_tracking(Lineage::Primary);

        assert_eq!(
            tracker.lineage_status(Lineage::Primary).state,
            LineageState::Failed
        );
    }

    #[test]
    fn test_finalize_completes_running_lineage() {
        let tracker = IndexingTracker::new(1, 10);
        tracker.start_tracking(10, "crawl-1");
        tracker.finalize_tracking(Lineage::Vector);

        assert_eq!(
            tracker.lineage_status(Lineage::Vector).state,
            LineageState::Completed
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments() {
        let tracker = Arc::new(IndexingTracker::new(1, 10));
        tracker.start_tracking(400, "crawl-1");

        let mut handles = Vec::new();
        for _ in 0..4 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    tracker.document_processed();
                    tracker.vector_document_failed();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let primary = tracker.lineage_status(Lineage::Primary);
        let vector = tracker.lineage_status(Lineage::Vector);
        assert_eq!(primary.processed, 400);
        assert_eq!(vector.failed, 400);
        assert!(primary.reached_expected());
    }

    #[test]
    fn test_terminal_update_retires_into_history() {
        let tracker = IndexingTracker::new(1, 10);
        tracker.start_tracking(5, "crawl-1");
        tracker.update_crawl_status(OverallStatus::Completed, "done");

        let recorded = tracker.status_by_crawl_id("crawl-1").unwrap();
        assert_eq!(recorded.status, OverallStatus::Completed);
        assert_eq!(recorded.message, "done");
        assert!(recorded.end_time.is_some());

        // A new crawl supersedes the current one; the old stays queryable
        tracker.reset();
        tracker.start_tracking(7, "crawl-2");
        let old = tracker.status_by_crawl_id("crawl-1").unwrap();
        assert_eq!(old.status, OverallStatus::Completed);
        assert_eq!(tracker.status_by_crawl_id("crawl-2").unwrap().documents_expected, 7);
    }

    #[test]
    fn test_history_lists_live_crawl_first() {
        let tracker = IndexingTracker::new(1, 10);
        tracker.start_tracking(5, "crawl-1");
        tracker.update_crawl_status(OverallStatus::Failed, "stalled");
        tracker.reset();
        tracker.start_tracking(5, "crawl-2");

        let ids: Vec<_> = tracker
            .history(10)
            .into_iter()
            .map(|s| s.crawl_id)
            .collect();
        assert_eq!(ids, vec!["crawl-2", "crawl-1"]);
    }
}
