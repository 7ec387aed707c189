//! Error types for crawl orchestration.

use thiserror::Error;

use indexer_solr::SolrError;

/// Errors from destination validation, all fatal for the crawl.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Admin call against the destination failed
    #[error("Solr admin error: {0}")]
    Solr(#[from] SolrError),

    /// A vector field needed creating but no embedding probe has
    /// succeeded yet
    #[error("Embedding dimensionality unavailable: {0}")]
    DimensionalityUnavailable(String),
}

/// Errors that abort or fail an export job.
#[derive(Debug, Error)]
pub enum IndexingError {
    /// Destination validation failed before any data moved
    #[error("Destination validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Reading from the source collection failed
    #[error("Source query failed: {0}")]
    Source(SolrError),

    /// A destination commit or admin call failed
    #[error("Destination operation failed: {0}")]
    Destination(SolrError),

    /// The primary lineage ended failed; the message embeds the last
    /// tracked status
    #[error("Indexing job {crawl_id} failed. End status: {status}")]
    JobFailed { crawl_id: String, status: String },
}
