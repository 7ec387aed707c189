//! Configuration loading for the semantic indexer.
//!
//! Layered like the rest of the tooling here: built-in defaults, then an
//! optional TOML file, then `INDEXER_*` environment variables. CLI flags
//! are applied by the daemon on top of the loaded settings.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::ConfigError;

/// Connection settings for the source collection being exported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSolrConfig {
    /// Base URL of the source Solr node, e.g. "http://solr7:8983"
    pub url: String,

    /// Source collection name
    pub collection: String,

    /// Documents fetched per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    100
}

/// How to create a collection that does not exist yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionCreationConfig {
    /// Config set name the collection is created against
    pub config_name: String,

    /// Path to the zipped config set, uploaded when the config set is not
    /// already registered on the destination
    #[serde(default)]
    pub config_file: Option<String>,

    #[serde(default = "default_one")]
    pub num_shards: u32,

    #[serde(default = "default_one")]
    pub num_replicas: u32,
}

fn default_one() -> u32 {
    1
}

/// Connection settings for the destination collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationSolrConfig {
    /// Base URL of the destination Solr node
    pub url: String,

    /// Primary destination collection name
    pub collection: String,

    /// Creation settings used when the destination collection is absent
    pub collection_creation: CollectionCreationConfig,
}

/// Endpoints for the external chunking and embedding services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Base URL of the chunking service
    pub chunker_url: String,

    /// Base URL of the embedding service
    pub embedder_url: String,
}

/// Per-field vector enrichment configuration.
///
/// A spec either attaches the vector inline on the parent document
/// (`chunk_field = false`) or emits child chunk documents into a side
/// collection (`chunk_field = true`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorFieldSpec {
    /// Source field whose text is embedded
    pub field_name: String,

    /// Schema field the vector is written to. Defaults to
    /// `<field_name>-vector`; destination validation may rewrite it once
    /// when the resolved schema field differs from the requested name.
    #[serde(default)]
    pub vector_field_name: Option<String>,

    /// True: chunk the field and emit child documents. False: embed the
    /// (possibly truncated) field value inline.
    #[serde(default)]
    pub chunk_field: bool,

    /// Chunk length passed to the chunking service
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Chunk overlap passed to the chunking service
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    /// Inline fields only: truncate the field value to this many characters
    /// before embedding
    #[serde(default)]
    pub max_chars: Option<usize>,

    /// Embedding model hint, recorded but not interpreted here
    #[serde(default)]
    pub model: Option<String>,

    /// Chunked fields only: the side collection chunk documents go to.
    /// Defaults to `<destination>-<field_name>-chunks`; destination
    /// validation records the resolved name here.
    #[serde(default)]
    pub destination_collection: Option<String>,

    /// Similarity function for the vector field
    #[serde(default = "default_similarity")]
    pub similarity_function: String,

    #[serde(default = "default_hnsw_max_connections")]
    pub hnsw_max_connections: u32,

    #[serde(default = "default_hnsw_beam_width")]
    pub hnsw_beam_width: u32,

    /// Creation settings for the side collection, when one must be created
    #[serde(default)]
    pub collection_creation: Option<CollectionCreationConfig>,
}

fn default_chunk_size() -> u32 {
    300
}

fn default_chunk_overlap() -> u32 {
    30
}

fn default_similarity() -> String {
    "cosine".to_string()
}

fn default_hnsw_max_connections() -> u32 {
    16
}

fn default_hnsw_beam_width() -> u32 {
    100
}

impl VectorFieldSpec {
    /// Minimal spec for an inline field, defaults everywhere else.
    pub fn inline(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            vector_field_name: None,
            chunk_field: false,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_chars: None,
            model: None,
            destination_collection: None,
            similarity_function: default_similarity(),
            hnsw_max_connections: default_hnsw_max_connections(),
            hnsw_beam_width: default_hnsw_beam_width(),
            collection_creation: None,
        }
    }

    /// Minimal spec for a chunked field, defaults everywhere else.
    pub fn chunked(field_name: impl Into<String>) -> Self {
        Self {
            chunk_field: true,
            ..Self::inline(field_name)
        }
    }

    /// The vector field name to request from the destination schema.
    pub fn requested_vector_field_name(&self) -> String {
        self.vector_field_name
            .clone()
            .unwrap_or_else(|| format!("{}-vector", self.field_name))
    }

    /// The side collection chunk documents are written to, applying the
    /// `<destination>-<field>-chunks` default when unconfigured.
    pub fn chunk_collection_name(&self, destination_collection: &str) -> String {
        self.destination_collection.clone().unwrap_or_else(|| {
            format!("{}-{}-chunks", destination_collection, self.field_name)
        })
    }
}

/// Complete indexer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerSettings {
    pub source: SourceSolrConfig,
    pub destination: DestinationSolrConfig,
    pub services: ServiceSettings,

    /// Vector enrichment, one entry per source field
    #[serde(default)]
    pub vector_fields: Vec<VectorFieldSpec>,

    /// Chunk documents embedded and written per batch
    #[serde(default = "default_vector_batch_size")]
    pub vector_batch_size: usize,

    /// Consecutive no-progress polls before a lineage is declared stalled
    #[serde(default = "default_loop_max_warnings")]
    pub loop_max_warnings: u32,

    /// Seconds between completion-loop polls
    #[serde(default = "default_loop_check_seconds")]
    pub loop_check_seconds: u64,

    /// Crawl statuses retained in history
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_vector_batch_size() -> usize {
    3
}

fn default_loop_max_warnings() -> u32 {
    3
}

fn default_loop_check_seconds() -> u64 {
    10
}

fn default_history_limit() -> usize {
    20
}

impl IndexerSettings {
    /// Load settings from an optional TOML file plus `INDEXER_*` env vars.
    ///
    /// Environment variables use `__` as the section separator, e.g.
    /// `INDEXER_SOURCE__URL` overrides `source.url`.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        let settings: IndexerSettings = builder
            .add_source(Environment::with_prefix("INDEXER").separator("__"))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate values the type system cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.page_size == 0 {
            return Err(ConfigError::Invalid(
                "source.page_size must be > 0".to_string(),
            ));
        }
        if self.vector_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "vector_batch_size must be > 0".to_string(),
            ));
        }
        if self.loop_max_warnings == 0 {
            return Err(ConfigError::Invalid(
                "loop_max_warnings must be > 0".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for spec in &self.vector_fields {
            if spec.field_name.is_empty() {
                return Err(ConfigError::Invalid(
                    "vector field spec with empty field_name".to_string(),
                ));
            }
            if !seen.insert(spec.field_name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate vector field spec for '{}'",
                    spec.field_name
                )));
            }
            if spec.chunk_field && spec.chunk_size == 0 {
                return Err(ConfigError::Invalid(format!(
                    "chunk_size must be > 0 for chunked field '{}'",
                    spec.field_name
                )));
            }
            if spec.chunk_field && spec.chunk_overlap >= spec.chunk_size {
                return Err(ConfigError::Invalid(format!(
                    "chunk_overlap must be smaller than chunk_size for '{}'",
                    spec.field_name
                )));
            }
        }
        Ok(())
    }
}
