//! Per-document enrichment pipeline.
//!
//! Two [`DocumentListener`]s are invoked for every tagged source
//! document:
//!
//! - [`InlineDocumentListener`] embeds configured fields and writes the
//!   enriched parent document to the primary destination
//! - [`ChunkDocumentListener`] chunks configured fields via
//!   [`ChunkBatchProcessor`] and writes vector-bearing child documents to
//!   their side collections
//!
//! Both record terminal per-document outcomes in the shared tracker;
//! a failure in one listener never blocks the other.

pub mod chunk;
pub mod chunk_docs;
pub mod error;
pub mod inline;
pub mod listener;

pub use chunk::ChunkDocumentListener;
pub use chunk_docs::{chunk_document_id, ChunkBatchProcessor, ChunkParent};
pub use error::PipelineError;
pub use inline::InlineDocumentListener;
pub use listener::{build_listeners, DocumentListener};
