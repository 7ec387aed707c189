//! Error types for the enrichment pipeline.

use thiserror::Error;

use indexer_services::ServiceError;
use indexer_solr::SolrError;

/// Errors from document enrichment.
///
/// Only [`PipelineError::ContractViolation`] escapes a listener; RPC and
/// write failures are terminal per-document outcomes recorded in the
/// tracker instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A document reached enrichment without its required fields. This is
    /// a programming error upstream, not a data problem.
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Chunking or embedding call failed after retries
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// Destination write failed
    #[error("Solr error: {0}")]
    Solr(#[from] SolrError),
}
