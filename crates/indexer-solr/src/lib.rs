//! Solr HTTP clients for the semantic indexer.
//!
//! Everything here talks to Solr's JSON APIs through `reqwest`:
//!
//! - [`HttpSolrSelectClient`]: paginated reads from the source collection
//! - [`HttpSolrUpdateClient`]: document writes, commits, deletes, pings
//! - [`HttpSolrAdminActions`]: collection/config-set lifecycle, vector
//!   schema reconciliation, and orphan deletion
//!
//! The seams are traits ([`SourceReader`], [`DocumentWriter`],
//! [`SolrAdmin`]) so the orchestration and pipeline crates can be tested
//! against in-memory fakes.

pub mod admin;
pub mod error;
pub mod fields;
pub mod select;
pub mod update;

pub use admin::{HttpSolrAdminActions, SolrAdmin};
pub use error::SolrError;
pub use fields::VectorFieldRequest;
pub use select::{HttpSolrSelectClient, SelectResponse, SourceReader};
pub use update::{DocumentWriter, HttpSolrUpdateClient};
