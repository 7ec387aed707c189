//! Shared types for the semantic indexer.
//!
//! This crate holds everything the other crates agree on:
//!
//! - [`InputDocument`]: the loosely-typed document representation moved
//!   between the source collection, the enrichment pipeline, and the
//!   destination collection
//! - [`IndexerSettings`]: layered configuration (defaults -> file -> env)
//! - [`VectorFieldSpec`] / [`VectorSpecRegistry`]: per-field vector
//!   configuration, including the one-time runtime rewrites performed by
//!   destination validation
//! - [`CrawlStatus`] / [`OverallStatus`] / [`Lineage`]: progress reporting
//! - schema field constants and the Solr date format in [`schema`]

pub mod config;
pub mod document;
pub mod error;
pub mod registry;
pub mod schema;
pub mod status;

pub use config::{
    CollectionCreationConfig, DestinationSolrConfig, IndexerSettings, ServiceSettings,
    SourceSolrConfig, VectorFieldSpec,
};
pub use document::InputDocument;
pub use error::ConfigError;
pub use registry::VectorSpecRegistry;
pub use status::{CrawlStatus, Lineage, OverallStatus};
