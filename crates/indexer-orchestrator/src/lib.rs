//! Crawl orchestration.
//!
//! [`DestinationValidator`] reconciles the destination schema before any
//! data moves: collections are created on demand, vector fields are
//! ensured with the runtime-discovered embedding dimensionality, and
//! resolved names are written back into the shared spec registry.
//!
//! [`SemanticIndexer`] drives a crawl end to end: paginated export from
//! the source, per-document tagging and enrichment, completion waits with
//! stall detection for both lineages, commits, and orphan cleanup.

pub mod error;
pub mod orchestrator;
pub mod validator;

pub use error::{IndexingError, ValidationError};
pub use orchestrator::SemanticIndexer;
pub use validator::DestinationValidator;
