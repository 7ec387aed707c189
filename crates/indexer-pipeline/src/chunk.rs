//! Chunked vector enrichment.
//!
//! For each configured chunked field, delegates to the batch processor
//! and writes the resulting child documents to the field's side
//! collection in batches. Each field of each document reaches exactly one
//! terminal vector-lineage outcome; child writes are independent of the
//! parent write performed by the inline listener.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use indexer_solr::DocumentWriter;
use indexer_tracker::IndexingTracker;
use indexer_types::{schema, InputDocument, VectorSpecRegistry};

use crate::chunk_docs::{ChunkBatchProcessor, ChunkParent};
use crate::error::PipelineError;
use crate::listener::{require_contract, DocumentListener};

/// Listener emitting chunk child documents into side collections.
pub struct ChunkDocumentListener {
    specs: Arc<VectorSpecRegistry>,
    processor: ChunkBatchProcessor,
    writer: Arc<dyn DocumentWriter>,
    tracker: Arc<IndexingTracker>,
    destination_collection: String,
    write_batch_size: usize,
}

impl ChunkDocumentListener {
    pub fn new(
        specs: Arc<VectorSpecRegistry>,
        processor: ChunkBatchProcessor,
        writer: Arc<dyn DocumentWriter>,
        tracker: Arc<IndexingTracker>,
        destination_collection: &str,
        write_batch_size: usize,
    ) -> Self {
        Self {
            specs,
            processor,
            writer,
            tracker,
            destination_collection: destination_collection.to_string(),
            write_batch_size: write_batch_size.max(1),
        }
    }
}

#[async_trait]
impl DocumentListener for ChunkDocumentListener {
    async fn process_document(&self, document: &InputDocument) -> Result<(), PipelineError> {
        let required = require_contract(document)?;
        debug!(doc_id = %required.id, "Processing chunked vectors");

        for spec in self.specs.chunked() {
            let field_data = match document.get_str(&spec.field_name) {
                Some(data) => data,
                None => {
                    warn!(
                        doc_id = %required.id,
                        field = %spec.field_name,
                        "Field is null, skipping chunk processing for this field"
                    );
                    self.tracker.vector_document_processed();
                    continue;
                }
            };

            let parent = ChunkParent {
                id: required.id.clone(),
                crawl_id: required.crawl_id.clone(),
                crawl_date: document.get_str(schema::CRAWL_DATE),
            };
            let chunk_documents = match self
                .processor
                .build_chunk_documents(&spec, &parent, &field_data)
                .await
            {
                Ok(docs) => docs,
                Err(e) => {
                    error!(
                        doc_id = %required.id,
                        field = %spec.field_name,
                        error = %e,
                        "Could not build chunk documents"
                    );
                    self.tracker.vector_document_failed();
                    continue;
                }
            };

            let collection = spec.chunk_collection_name(&self.destination_collection);
            let mut has_error = false;
            for batch in chunk_documents.chunks(self.write_batch_size) {
                debug!(
                    doc_id = %required.id,
                    collection = %collection,
                    count = batch.len(),
                    "Adding chunk documents"
                );
                if let Err(e) = self.writer.add(&collection, batch).await {
                    error!(
                        doc_id = %required.id,
                        collection = %collection,
                        error = %e,
                        "Could not write chunk batch"
                    );
                    has_error = true;
                }
            }

            if has_error {
                self.tracker.vector_document_failed();
            } else {
                self.tracker.vector_document_processed();
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "chunk"
    }
}
