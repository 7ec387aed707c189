//! Inline vector enrichment.
//!
//! Embeds each configured inline field (optionally truncated) and writes
//! the enriched parent document to the primary destination. The document
//! reaches exactly one terminal outcome: processed on a successful write,
//! failed on any embedding or write error.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use indexer_services::EmbeddingService;
use indexer_solr::DocumentWriter;
use indexer_tracker::IndexingTracker;
use indexer_types::{InputDocument, VectorSpecRegistry};

use crate::error::PipelineError;
use crate::listener::{require_contract, DocumentListener};

/// Truncate to a character budget when one is configured.
pub(crate) fn truncate_chars(text: &str, max_chars: Option<usize>) -> String {
    match max_chars {
        Some(max) if max > 0 && text.chars().count() > max => text.chars().take(max).collect(),
        _ => text.to_string(),
    }
}

/// Listener attaching vectors inline on the parent document.
pub struct InlineDocumentListener {
    specs: Arc<VectorSpecRegistry>,
    embedder: Arc<dyn EmbeddingService>,
    writer: Arc<dyn DocumentWriter>,
    tracker: Arc<IndexingTracker>,
    destination_collection: String,
}

impl InlineDocumentListener {
    pub fn new(
        specs: Arc<VectorSpecRegistry>,
        embedder: Arc<dyn EmbeddingService>,
        writer: Arc<dyn DocumentWriter>,
        tracker: Arc<IndexingTracker>,
        destination_collection: &str,
    ) -> Self {
        Self {
            specs,
            embedder,
            writer,
            tracker,
            destination_collection: destination_collection.to_string(),
        }
    }
}

#[async_trait]
impl DocumentListener for InlineDocumentListener {
    async fn process_document(&self, document: &InputDocument) -> Result<(), PipelineError> {
        let required = require_contract(document)?;
        debug!(doc_id = %required.id, "Processing inline vectors");

        let mut enriched = document.clone();
        for spec in self.specs.inline() {
            let field_data = match enriched.get_str(&spec.field_name) {
                Some(data) => data,
                None => {
                    warn!(
                        doc_id = %required.id,
                        field = %spec.field_name,
                        "Field is null, skipping inline embedding"
                    );
                    continue;
                }
            };

            let text = truncate_chars(&field_data, spec.max_chars);
            match self.embedder.embed(&text).await {
                Ok(vector) => {
                    enriched.set(&spec.requested_vector_field_name(), vector);
                }
                Err(e) => {
                    error!(
                        doc_id = %required.id,
                        field = %spec.field_name,
                        error = %e,
                        "Could not embed inline field"
                    );
                    self.tracker.document_failed();
                    return Ok(());
                }
            }
        }

        if let Err(e) = self
            .writer
            .add(&self.destination_collection, std::slice::from_ref(&enriched))
            .await
        {
            error!(
                doc_id = %required.id,
                collection = %self.destination_collection,
                error = %e,
                "Could not write enriched document"
            );
            self.tracker.document_failed();
            return Ok(());
        }

        self.tracker.document_processed();
        Ok(())
    }

    fn name(&self) -> &str {
        "inline"
    }
}
