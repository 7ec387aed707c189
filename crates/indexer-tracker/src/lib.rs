//! Crawl progress tracking.
//!
//! One [`IndexingTracker`] is shared between the orchestrator (reader,
//! via the completion wait loop) and the enrichment listeners (writers,
//! incrementing counters from arbitrarily many concurrent calls). Two
//! lineages are tracked independently: primary documents and vector/chunk
//! documents.
//!
//! The tracker also owns the bounded [`CrawlHistory`], so finished crawl
//! statuses stay queryable without growing without bound.

pub mod history;
pub mod tracker;
pub mod wait;

pub use history::CrawlHistory;
pub use tracker::{IndexingTracker, LineageSnapshot, LineageState};
pub use wait::{wait_for_completion, WaitConfig, WaitOutcome};
