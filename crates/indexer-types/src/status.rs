//! Crawl progress reporting types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall state of a crawl, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    /// Tracking exists but the crawl has not begun.
    NotStarted,
    /// The crawl is in progress.
    Running,
    /// The crawl finished and the primary lineage converged.
    Completed,
    /// The crawl finished with a failed lineage, or aborted.
    Failed,
    /// Sentinel: no crawl has ever run in this process.
    NoneAvailable,
}

impl OverallStatus {
    /// Whether the status will not change again for this crawl.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OverallStatus::Completed | OverallStatus::Failed)
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OverallStatus::NotStarted => "NOT_STARTED",
            OverallStatus::Running => "RUNNING",
            OverallStatus::Completed => "COMPLETED",
            OverallStatus::Failed => "FAILED",
            OverallStatus::NoneAvailable => "NONE_AVAILABLE",
        };
        f.write_str(s)
    }
}

/// One of the two independently-tracked progress tracks of a crawl.
///
/// Primary documents and vector/chunk documents converge separately: the
/// parent write can be done long before the last chunk batch lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lineage {
    Primary,
    Vector,
}

impl fmt::Display for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lineage::Primary => f.write_str("primary"),
            Lineage::Vector => f.write_str("vector"),
        }
    }
}

/// Snapshot of a crawl's progress, current or historical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlStatus {
    /// Opaque crawl identifier; empty for the [`OverallStatus::NoneAvailable`]
    /// sentinel.
    pub crawl_id: String,
    pub status: OverallStatus,
    /// Expected primary documents; negative when the source could not
    /// report a count.
    pub documents_expected: i64,
    pub documents_processed: u64,
    pub documents_failed: u64,
    /// Expected vector-lineage signals (documents x configured chunk fields).
    pub vector_documents_expected: i64,
    pub vector_documents_processed: u64,
    pub vector_documents_failed: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub message: String,
}

impl CrawlStatus {
    /// The sentinel returned when no crawl has ever run.
    pub fn none_available() -> Self {
        Self {
            crawl_id: String::new(),
            status: OverallStatus::NoneAvailable,
            documents_expected: 0,
            documents_processed: 0,
            documents_failed: 0,
            vector_documents_expected: 0,
            vector_documents_processed: 0,
            vector_documents_failed: 0,
            start_time: None,
            end_time: None,
            message: String::new(),
        }
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "crawl {} [{}]: primary {}/{} processed, {} failed; vector {}/{} processed, {} failed",
            self.crawl_id,
            self.status,
            self.documents_processed,
            self.documents_expected,
            self.documents_failed,
            self.vector_documents_processed,
            self.vector_documents_expected,
            self.vector_documents_failed,
        )
    }
}
