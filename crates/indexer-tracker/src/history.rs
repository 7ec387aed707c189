//! Bounded store of past crawl statuses.
//!
//! Keyed by crawl id, capped at a fixed capacity with oldest-first
//! eviction, so long-running processes keep a useful tail of history
//! instead of an ever-growing map.

use std::collections::VecDeque;
use std::sync::Mutex;

use indexer_types::CrawlStatus;

/// Ring buffer of crawl statuses, newest last.
#[derive(Debug)]
pub struct CrawlHistory {
    capacity: usize,
    entries: Mutex<VecDeque<CrawlStatus>>,
}

impl CrawlHistory {
    /// Create a history retaining at most `capacity` crawls.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Insert or update a crawl status. A status for an already-recorded
    /// crawl id replaces the old entry in place; otherwise the status is
    /// appended, evicting the oldest entry when full.
    pub fn record(&self, status: CrawlStatus) {
        let mut entries = self.lock();
        if let Some(existing) = entries
            .iter_mut()
            .find(|entry| entry.crawl_id == status.crawl_id)
        {
            *existing = status;
            return;
        }
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(status);
    }

    /// Look up a crawl by id.
    pub fn get(&self, crawl_id: &str) -> Option<CrawlStatus> {
        self.lock()
            .iter()
            .find(|entry| entry.crawl_id == crawl_id)
            .cloned()
    }

    /// The most recent crawls, newest first, at most `limit`.
    pub fn recent(&self, limit: usize) -> Vec<CrawlStatus> {
        self.lock().iter().rev().take(limit).cloned().collect()
    }

    /// Number of retained crawls.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<CrawlStatus>> {
        self.entries.lock().expect("crawl history mutex poisoned")
    }
}
