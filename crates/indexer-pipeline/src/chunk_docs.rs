//! Chunk child-document assembly.
//!
//! One chunking call per field value, then fixed-size batches through the
//! batch embedding call. Child identifiers carry the global chunk index;
//! the batch split is an internal processing detail and never shows up in
//! an id.

use std::sync::Arc;

use tracing::info;

use indexer_services::{ChunkingService, EmbeddingService, ServiceError};
use indexer_types::{schema, InputDocument, VectorFieldSpec};

use crate::error::PipelineError;

/// Identity of the parent document a field's chunks descend from.
#[derive(Debug, Clone)]
pub struct ChunkParent {
    pub id: String,
    pub crawl_id: String,
    pub crawl_date: Option<String>,
}

/// Deterministic child-document id: parent id, field name, then the
/// zero-padded chunk index.
pub fn chunk_document_id(parent_id: &str, field_name: &str, chunk_index: usize) -> String {
    format!("{}{}#{:07}", parent_id, field_name, chunk_index)
}

/// Turns one field's text into vector-bearing chunk documents.
pub struct ChunkBatchProcessor {
    chunker: Arc<dyn ChunkingService>,
    embedder: Arc<dyn EmbeddingService>,
    batch_size: usize,
}

impl ChunkBatchProcessor {
    pub fn new(
        chunker: Arc<dyn ChunkingService>,
        embedder: Arc<dyn EmbeddingService>,
        batch_size: usize,
    ) -> Self {
        Self {
            chunker,
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    /// Chunk `text` and build one child document per chunk.
    ///
    /// Failures propagate to the caller, which records them as a
    /// per-document failure for the field rather than aborting the crawl.
    pub async fn build_chunk_documents(
        &self,
        spec: &VectorFieldSpec,
        parent: &ChunkParent,
        text: &str,
    ) -> Result<Vec<InputDocument>, PipelineError> {
        let chunks = self
            .chunker
            .chunk(text, spec.chunk_size, spec.chunk_overlap)
            .await?;
        info!(
            parent_id = %parent.id,
            field = %spec.field_name,
            chunks = chunks.len(),
            "Chunked field"
        );

        let vector_field_name = spec.requested_vector_field_name();
        let mut documents = Vec::with_capacity(chunks.len());
        for (batch_index, batch) in chunks.chunks(self.batch_size).enumerate() {
            let vectors = self.embedder.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(PipelineError::Service(ServiceError::InvalidResponse(
                    format!(
                        "batch embedding returned {} vectors for {} chunks",
                        vectors.len(),
                        batch.len()
                    ),
                )));
            }
            let batch_start = batch_index * self.batch_size;
            for (offset, (chunk, vector)) in batch.iter().zip(vectors).enumerate() {
                documents.push(build_chunk_document(
                    spec,
                    parent,
                    &vector_field_name,
                    chunk,
                    batch_start + offset,
                    vector,
                ));
            }
        }
        Ok(documents)
    }
}

fn build_chunk_document(
    spec: &VectorFieldSpec,
    parent: &ChunkParent,
    vector_field_name: &str,
    chunk: &str,
    chunk_index: usize,
    vector: Vec<f32>,
) -> InputDocument {
    let doc_id = chunk_document_id(&parent.id, &spec.field_name, chunk_index);

    let mut document = InputDocument::new();
    document.set(schema::ID, doc_id.clone());
    document.set(schema::DOC_ID, doc_id);
    document.set(schema::PARENT_ID, parent.id.clone());
    document.set(schema::CHUNK, chunk);
    document.set(schema::CHUNK_NUMBER, chunk_index as u64);
    document.set(vector_field_name, vector);
    document.set(schema::PARENT_FIELD_NAME, spec.field_name.clone());
    document.set(schema::CRAWL_ID, parent.crawl_id.clone());
    if let Some(date) = &parent.crawl_date {
        document.set(schema::CRAWL_DATE, date.clone());
        document.set(schema::CREATION_DATE, date.clone());
    }
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedChunker {
        chunks: Vec<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChunkingService for FixedChunker {
        async fn chunk(
            &self,
            _text: &str,
            _chunk_length: u32,
            _chunk_overlap: u32,
        ) -> Result<Vec<String>, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.chunks.clone())
        }

        async fn check_health(&self) -> bool {
            true
        }
    }

    struct CountingEmbedder {
        batch_calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingService for CountingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
            Ok(vec![1.0, 2.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
            let call = self.batch_calls.fetch_add(1, Ordering::SeqCst);
            // Vector values encode (batch call, position) so ordering is
            // observable in the output
            Ok(texts
                .iter()
                .enumerate()
                .map(|(i, _)| vec![call as f32, i as f32])
                .collect())
        }

        async fn check_health(&self) -> bool {
            true
        }
    }

    fn parent() -> ChunkParent {
        ChunkParent {
            id: "doc-9".to_string(),
            crawl_id: "crawl-1".to_string(),
            crawl_date: Some("2024-03-15T09:30:05.000Z".to_string()),
        }
    }

    fn chunks(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("chunk {}", i)).collect()
    }

    #[test]
    fn test_chunk_document_id_padding() {
        assert_eq!(chunk_document_id("doc-9", "body", 0), "doc-9body#0000000");
        assert_eq!(chunk_document_id("doc-9", "body", 42), "doc-9body#0000042");
    }

    #[tokio::test]
    async fn test_batch_count_is_ceil_of_chunks_over_batch_size() {
        let embedder = Arc::new(CountingEmbedder {
            batch_calls: AtomicUsize::new(0),
        });
        let processor = ChunkBatchProcessor::new(
            Arc::new(FixedChunker {
                chunks: chunks(7),
                calls: AtomicUsize::new(0),
            }),
            embedder.clone(),
            3,
        );

        let docs = processor
            .build_chunk_documents(&VectorFieldSpec::chunked("body"), &parent(), "text")
            .await
            .unwrap();

        // 7 chunks at batch size 3: 3 embedding calls
        assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 3);
        assert_eq!(docs.len(), 7);
    }

    #[tokio::test]
    async fn test_ids_are_unique_ordered_and_batch_independent() {
        let processor = ChunkBatchProcessor::new(
            Arc::new(FixedChunker {
                chunks: chunks(5),
                calls: AtomicUsize::new(0),
            }),
            Arc::new(CountingEmbedder {
                batch_calls: AtomicUsize::new(0),
            }),
            2,
        );

        let docs = processor
            .build_chunk_documents(&VectorFieldSpec::chunked("body"), &parent(), "text")
            .await
            .unwrap();

        let ids: Vec<_> = docs.iter().map(|d| d.id().unwrap()).collect();
        assert_eq!(
            ids,
            vec![
                "doc-9body#0000000",
                "doc-9body#0000001",
                "doc-9body#0000002",
                "doc-9body#0000003",
                "doc-9body#0000004",
            ]
        );
        // Chunk numbers are the global index, not the batch offset
        let numbers: Vec<_> = docs
            .iter()
            .map(|d| d.get(schema::CHUNK_NUMBER).unwrap().as_u64().unwrap())
            .collect();
        assert_eq!(numbers, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_vectors_are_applied_in_chunk_order() {
        let processor = ChunkBatchProcessor::new(
            Arc::new(FixedChunker {
                chunks: chunks(4),
                calls: AtomicUsize::new(0),
            }),
            Arc::new(CountingEmbedder {
                batch_calls: AtomicUsize::new(0),
            }),
            3,
        );

        let spec = VectorFieldSpec::chunked("body");
        let docs = processor
            .build_chunk_documents(&spec, &parent(), "text")
            .await
            .unwrap();

        let vector_field = spec.requested_vector_field_name();
        let vectors: Vec<Vec<f64>> = docs
            .iter()
            .map(|d| {
                d.get(&vector_field)
                    .unwrap()
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|v| v.as_f64().unwrap())
                    .collect()
            })
            .collect();
        // (batch call, position within batch) for batch size 3
        assert_eq!(
            vectors,
            vec![
                vec![0.0, 0.0],
                vec![0.0, 1.0],
                vec![0.0, 2.0],
                vec![1.0, 0.0],
            ]
        );
    }

    #[tokio::test]
    async fn test_chunk_documents_carry_parentage_and_crawl_tag() {
        let processor = ChunkBatchProcessor::new(
            Arc::new(FixedChunker {
                chunks: chunks(1),
                calls: AtomicUsize::new(0),
            }),
            Arc::new(CountingEmbedder {
                batch_calls: AtomicUsize::new(0),
            }),
            3,
        );

        let docs = processor
            .build_chunk_documents(&VectorFieldSpec::chunked("body"), &parent(), "text")
            .await
            .unwrap();

        let doc = &docs[0];
        assert_eq!(doc.get_str(schema::PARENT_ID).as_deref(), Some("doc-9"));
        assert_eq!(doc.get_str(schema::PARENT_FIELD_NAME).as_deref(), Some("body"));
        assert_eq!(doc.get_str(schema::CRAWL_ID).as_deref(), Some("crawl-1"));
        assert_eq!(doc.get_str(schema::CHUNK).as_deref(), Some("chunk 0"));
        assert_eq!(
            doc.get_str(schema::CRAWL_DATE).as_deref(),
            Some("2024-03-15T09:30:05.000Z")
        );
    }

    struct ShortEmbedder;

    #[async_trait]
    impl EmbeddingService for ShortEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
            Ok(vec![0.0])
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
            Ok(vec![vec![0.0]])
        }

        async fn check_health(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_short_batch_reply_is_an_error() {
        let processor = ChunkBatchProcessor::new(
            Arc::new(FixedChunker {
                chunks: chunks(3),
                calls: AtomicUsize::new(0),
            }),
            Arc::new(ShortEmbedder),
            3,
        );

        let err = processor
            .build_chunk_documents(&VectorFieldSpec::chunked("body"), &parent(), "text")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Service(_)));
    }
}
