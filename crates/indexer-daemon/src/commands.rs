//! Command handlers: wiring, export runs, validation, health.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use indexer_orchestrator::{DestinationValidator, SemanticIndexer};
use indexer_pipeline::build_listeners;
use indexer_services::{
    ChunkingService, EmbeddingService, HealthProbeConfig, HttpChunkingService,
    HttpEmbeddingService,
};
use indexer_solr::{
    DocumentWriter, HttpSolrAdminActions, HttpSolrSelectClient, HttpSolrUpdateClient, SolrAdmin,
};
use indexer_tracker::{IndexingTracker, WaitConfig};
use indexer_types::{IndexerSettings, VectorSpecRegistry};

use crate::service::IndexerService;

/// Initialize the tracing subscriber. `RUST_LOG` wins over the CLI flag.
pub fn init_tracing(log_level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.unwrap_or("info")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Load settings from the optional config file plus environment.
pub fn load_settings(config_path: Option<&str>) -> Result<IndexerSettings> {
    IndexerSettings::load(config_path).context("could not load indexer settings")
}

/// Wire clients, tracker, listeners, validator, and orchestrator from
/// settings.
pub async fn build_service(settings: &IndexerSettings) -> Result<IndexerService> {
    let registry = Arc::new(VectorSpecRegistry::new(settings.vector_fields.clone()));

    let source = Arc::new(HttpSolrSelectClient::new(
        &settings.source.url,
        &settings.source.collection,
    )?);
    let writer: Arc<dyn DocumentWriter> =
        Arc::new(HttpSolrUpdateClient::new(&settings.destination.url)?);
    let admin: Arc<dyn SolrAdmin> = Arc::new(HttpSolrAdminActions::new(&settings.destination.url)?);
    let chunker: Arc<dyn ChunkingService> =
        Arc::new(HttpChunkingService::new(&settings.services.chunker_url)?);
    let embedder: Arc<dyn EmbeddingService> =
        Arc::new(HttpEmbeddingService::new(&settings.services.embedder_url)?);

    let tracker = Arc::new(IndexingTracker::new(
        registry.chunk_field_count(),
        settings.history_limit,
    ));
    let listeners = build_listeners(
        registry.clone(),
        chunker.clone(),
        embedder.clone(),
        writer,
        tracker.clone(),
        &settings.destination.collection,
        settings.vector_batch_size,
        settings.vector_batch_size,
    );
    let validator = DestinationValidator::new(
        admin.clone(),
        embedder.clone(),
        registry,
        settings.destination.clone(),
        HealthProbeConfig::default(),
    )
    .await;

    let indexer = SemanticIndexer::new(
        source,
        admin,
        validator,
        tracker,
        listeners,
        &settings.destination.collection,
        settings.source.page_size,
        WaitConfig {
            poll_interval: Duration::from_secs(settings.loop_check_seconds),
            max_warnings: settings.loop_max_warnings,
        },
    );
    Ok(IndexerService::new(Arc::new(indexer), chunker, embedder))
}

/// Run one export job in the foreground and print its final status.
pub async fn run_export(settings: &IndexerSettings, crawl_id: Option<Uuid>) -> Result<()> {
    let service = build_service(settings).await?;
    let crawl_id = crawl_id.unwrap_or_else(Uuid::new_v4);
    info!(crawl_id = %crawl_id, "Starting export job");

    let result = service.indexer().run_export_job(crawl_id).await;
    let status = service.current_status();
    println!("{}", serde_json::to_string_pretty(&status)?);
    result.context("export job failed")?;
    Ok(())
}

/// Validate the destination without moving any data.
pub async fn validate_destination(settings: &IndexerSettings) -> Result<()> {
    let service = build_service(settings).await?;
    service
        .indexer()
        .validator()
        .validate()
        .await
        .context("destination validation failed")?;
    println!("Destination is valid");
    Ok(())
}

/// Print collaborator health as JSON.
pub async fn show_health(settings: &IndexerSettings) -> Result<()> {
    let service = build_service(settings).await?;
    let health = service.health().await;
    println!("{}", serde_json::to_string_pretty(&health)?);
    Ok(())
}
