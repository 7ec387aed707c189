//! The document listener seam and required-field contract.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use indexer_services::{ChunkingService, EmbeddingService};
use indexer_solr::DocumentWriter;
use indexer_tracker::IndexingTracker;
use indexer_types::{schema, InputDocument, VectorSpecRegistry};

use crate::chunk::ChunkDocumentListener;
use crate::chunk_docs::ChunkBatchProcessor;
use crate::error::PipelineError;
use crate::inline::InlineDocumentListener;

/// Enrichment step invoked once per tagged source document.
///
/// Implementations record terminal per-document outcomes in the shared
/// tracker. The only error a listener surfaces is a contract violation:
/// a document that reached enrichment without its required fields.
#[async_trait]
pub trait DocumentListener: Send + Sync {
    async fn process_document(&self, document: &InputDocument) -> Result<(), PipelineError>;

    /// Listener name for logging.
    fn name(&self) -> &str;
}

#[derive(Debug)]
pub(crate) struct RequiredFields {
    pub id: String,
    pub crawl_id: String,
}

/// Assert the fields every enriched document must carry.
///
/// Missing id or crawl id is a contract violation raised before any RPC.
/// A missing crawl date is only worth a warning.
pub(crate) fn require_contract(
    document: &InputDocument,
) -> Result<RequiredFields, PipelineError> {
    let id = document.get_str(schema::ID).ok_or_else(|| {
        PipelineError::ContractViolation("document without an id reached enrichment".to_string())
    })?;
    let crawl_id = document.get_str(schema::CRAWL_ID).ok_or_else(|| {
        PipelineError::ContractViolation(format!(
            "document '{}' reached enrichment without a crawl id",
            id
        ))
    })?;
    if document.get_str(schema::CRAWL_DATE).is_none() {
        warn!(doc_id = %id, "Document reached enrichment without a crawl date");
    }
    Ok(RequiredFields { id, crawl_id })
}

/// Build the closed set of listeners from the configured specs: one
/// inline, one chunk, both driven by the same registry partition.
#[allow(clippy::too_many_arguments)]
pub fn build_listeners(
    specs: Arc<VectorSpecRegistry>,
    chunker: Arc<dyn ChunkingService>,
    embedder: Arc<dyn EmbeddingService>,
    writer: Arc<dyn DocumentWriter>,
    tracker: Arc<IndexingTracker>,
    destination_collection: &str,
    embed_batch_size: usize,
    write_batch_size: usize,
) -> Vec<Arc<dyn DocumentListener>> {
    let inline = InlineDocumentListener::new(
        specs.clone(),
        embedder.clone(),
        writer.clone(),
        tracker.clone(),
        destination_collection,
    );
    let chunk = ChunkDocumentListener::new(
        specs,
        ChunkBatchProcessor::new(chunker, embedder, embed_batch_size),
        writer,
        tracker,
        destination_collection,
        write_batch_size,
    );
    vec![Arc::new(inline), Arc::new(chunk)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_requires_id() {
        let mut doc = InputDocument::new();
        doc.set(schema::CRAWL_ID, "crawl-1");
        assert!(matches!(
            require_contract(&doc),
            Err(PipelineError::ContractViolation(_))
        ));
    }

    #[test]
    fn test_contract_requires_crawl_id() {
        let mut doc = InputDocument::new();
        doc.set(schema::ID, "doc-1");
        let err = require_contract(&doc).unwrap_err();
        assert!(err.to_string().contains("doc-1"));
    }

    #[test]
    fn test_contract_passes_without_crawl_date() {
        let mut doc = InputDocument::new();
        doc.set(schema::ID, "doc-1");
        doc.set(schema::CRAWL_ID, "crawl-1");

        let required = require_contract(&doc).unwrap();
        assert_eq!(required.id, "doc-1");
        assert_eq!(required.crawl_id, "crawl-1");
    }
}
