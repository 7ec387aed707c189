//! Destination collection and schema validation.
//!
//! Runs once per job, before any writes. Missing collections are created
//! (uploading their config sets first when necessary); vector fields are
//! ensured with the embedding dimensionality discovered at runtime; when
//! the schema resolves a field under a different name, the in-memory spec
//! registry is rewritten once so every downstream writer uses the
//! resolved name.

use std::sync::Arc;

use tracing::{error, info, warn};

use indexer_services::{
    probe_dimensionality, EmbeddingHealth, EmbeddingService, HealthProbe, HealthProbeConfig,
};
use indexer_solr::{SolrAdmin, VectorFieldRequest};
use indexer_types::{DestinationSolrConfig, VectorFieldSpec, VectorSpecRegistry};

use crate::error::ValidationError;

/// Validates the destination before a crawl and owns the background
/// embedding health probe.
pub struct DestinationValidator {
    admin: Arc<dyn SolrAdmin>,
    embedder: Arc<dyn EmbeddingService>,
    specs: Arc<VectorSpecRegistry>,
    destination: DestinationSolrConfig,
    health: Arc<EmbeddingHealth>,
    _probe: HealthProbe,
}

impl DestinationValidator {
    /// Create the validator, attempt initial dimensionality discovery, and
    /// start the background health probe. The probe stops when the
    /// validator is dropped.
    pub async fn new(
        admin: Arc<dyn SolrAdmin>,
        embedder: Arc<dyn EmbeddingService>,
        specs: Arc<VectorSpecRegistry>,
        destination: DestinationSolrConfig,
        probe_config: HealthProbeConfig,
    ) -> Self {
        let health = Arc::new(EmbeddingHealth::new());
        match probe_dimensionality(embedder.as_ref()).await {
            Ok(dimensionality) => {
                info!(dimensionality, "Initialized embedding dimensionality");
                health.record_available(dimensionality);
            }
            Err(e) => {
                error!(error = %e, "Failed to initialize embedding dimensionality");
                health.record_unavailable();
            }
        }
        let probe = HealthProbe::spawn(embedder.clone(), health.clone(), probe_config);
        Self {
            admin,
            embedder,
            specs,
            destination,
            health,
            _probe: probe,
        }
    }

    /// The discovered embedding dimensionality, if any probe succeeded.
    pub fn dimensionality(&self) -> Option<usize> {
        self.health.dimensionality()
    }

    /// Whether the embedding service answered its last probe.
    pub fn embeddings_available(&self) -> bool {
        self.health.is_available()
    }

    /// Shared health view, for status reporting.
    pub fn health(&self) -> Arc<EmbeddingHealth> {
        self.health.clone()
    }

    /// Side collections receiving vector-bearing documents.
    pub fn vector_destination_collections(&self) -> Vec<String> {
        self.specs
            .vector_destination_collections(&self.destination.collection)
    }

    /// Ensure destination collections and vector fields exist.
    pub async fn validate(&self) -> Result<(), ValidationError> {
        info!("Validating the destination collection");
        self.validate_destination_collection().await?;
        info!("Validating the vector collections");
        self.validate_vector_fields().await?;
        Ok(())
    }

    async fn validate_destination_collection(&self) -> Result<(), ValidationError> {
        let collection = &self.destination.collection;
        if self.admin.collection_exists(collection).await? {
            info!(collection, "Destination collection already exists");
            return Ok(());
        }
        self.admin
            .create_collection(collection, &self.destination.collection_creation)
            .await?;
        Ok(())
    }

    async fn validate_vector_fields(&self) -> Result<(), ValidationError> {
        for spec in self.specs.inline() {
            self.ensure_vector_field(&spec, self.destination.collection.clone())
                .await?;
        }
        for spec in self.specs.chunked() {
            let collection = spec.chunk_collection_name(&self.destination.collection);
            if self.admin.collection_exists(&collection).await? {
                info!(collection = %collection, "Chunk collection already exists");
            } else {
                // A spec without its own creation settings inherits the
                // destination's config set
                let creation = spec
                    .collection_creation
                    .clone()
                    .unwrap_or_else(|| self.destination.collection_creation.clone());
                info!(collection = %collection, "Creating chunk collection");
                self.admin.create_collection(&collection, &creation).await?;
            }
            self.specs
                .set_destination_collection(&spec.field_name, &collection);
            self.ensure_vector_field(&spec, collection).await?;
        }
        Ok(())
    }

    async fn ensure_vector_field(
        &self,
        spec: &VectorFieldSpec,
        collection: String,
    ) -> Result<(), ValidationError> {
        let requested = spec.requested_vector_field_name();
        let dimensionality = self.require_dimensionality(&requested, &collection).await?;

        let request = VectorFieldRequest {
            collection,
            field_name: requested.clone(),
            dimensionality,
            similarity_function: spec.similarity_function.clone(),
            hnsw_max_connections: spec.hnsw_max_connections,
            hnsw_beam_width: spec.hnsw_beam_width,
        };
        let resolved = self.admin.ensure_vector_field(&request).await?;
        if resolved != requested {
            warn!(
                requested = %requested,
                resolved = %resolved,
                field = %spec.field_name,
                "Requested vector field name is not the one in use"
            );
            self.specs.rename_vector_field(&spec.field_name, &resolved);
        }
        info!(field = %spec.field_name, vector_field = %resolved, "Vector field validated");
        Ok(())
    }

    /// The dimensionality needed for field creation: the discovered value,
    /// or one last synchronous probe attempt before failing fast.
    async fn require_dimensionality(
        &self,
        field: &str,
        collection: &str,
    ) -> Result<usize, ValidationError> {
        if let Some(dimensionality) = self.health.dimensionality() {
            return Ok(dimensionality);
        }
        match probe_dimensionality(self.embedder.as_ref()).await {
            Ok(dimensionality) => {
                self.health.record_available(dimensionality);
                Ok(dimensionality)
            }
            Err(e) => {
                self.health.record_unavailable();
                Err(ValidationError::DimensionalityUnavailable(format!(
                    "cannot create vector field '{}' in '{}': {}",
                    field, collection, e
                )))
            }
        }
    }
}
