//! Indexing service guard and status surface.
//!
//! One crawl runs at a time: starting a crawl takes a lock, checks the
//! downstream services are healthy and nothing is already running, then
//! spawns the export job and returns its crawl id immediately. Status
//! queries go through the shared tracker.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use indexer_orchestrator::SemanticIndexer;
use indexer_services::{ChunkingService, EmbeddingService};
use indexer_types::CrawlStatus;

/// Why a crawl could not be started.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(
        "Indexer is not ready; check the chunker and embedder services and whether a crawl is already running"
    )]
    NotReady,
}

/// Reachability of the external collaborators plus crawl state.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub chunker_available: bool,
    pub embedder_available: bool,
    pub embedding_dimensionality: Option<usize>,
    pub indexing_in_progress: bool,
}

/// Entry point for starting crawls and querying their status.
pub struct IndexerService {
    indexer: Arc<SemanticIndexer>,
    chunker: Arc<dyn ChunkingService>,
    embedder: Arc<dyn EmbeddingService>,
    start_lock: tokio::sync::Mutex<()>,
}

impl IndexerService {
    pub fn new(
        indexer: Arc<SemanticIndexer>,
        chunker: Arc<dyn ChunkingService>,
        embedder: Arc<dyn EmbeddingService>,
    ) -> Self {
        Self {
            indexer,
            chunker,
            embedder,
            start_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The underlying orchestrator, for running a job in the foreground.
    pub fn indexer(&self) -> Arc<SemanticIndexer> {
        self.indexer.clone()
    }

    /// Whether a new crawl can start right now.
    pub async fn is_ready(&self) -> bool {
        self.embedder.check_health().await
            && self.chunker.check_health().await
            && !self.is_indexing_in_progress()
    }

    /// Whether a crawl is currently running.
    pub fn is_indexing_in_progress(&self) -> bool {
        self.indexer.tracker().is_running()
    }

    /// Start a crawl in the background and return its id.
    pub async fn start_indexing(&self) -> Result<Uuid, StartError> {
        let _guard = self.start_lock.lock().await;
        if !self.is_ready().await {
            return Err(StartError::NotReady);
        }

        let crawl_id = Uuid::new_v4();
        let indexer = self.indexer.clone();
        info!(crawl_id = %crawl_id, "Starting indexing job");
        tokio::spawn(async move {
            if let Err(e) = indexer.run_export_job(crawl_id).await {
                error!(crawl_id = %crawl_id, error = %e, "Indexing job failed");
            }
        });
        Ok(crawl_id)
    }

    /// Latest known status of the current crawl (NONE_AVAILABLE when no
    /// crawl has ever run).
    pub fn current_status(&self) -> CrawlStatus {
        self.indexer.tracker().current_status()
    }

    /// Status of one crawl by id, live or from history.
    pub fn status_by_crawl_id(&self, crawl_id: &str) -> Option<CrawlStatus> {
        self.indexer.tracker().status_by_crawl_id(crawl_id)
    }

    /// Recent crawl statuses, newest first.
    pub fn history(&self, limit: usize) -> Vec<CrawlStatus> {
        self.indexer.tracker().history(limit)
    }

    /// Current health of the external collaborators.
    pub async fn health(&self) -> ServiceHealth {
        ServiceHealth {
            chunker_available: self.chunker.check_health().await,
            embedder_available: self.embedder.check_health().await,
            embedding_dimensionality: self.indexer.validator().dimensionality(),
            indexing_in_progress: self.is_indexing_in_progress(),
        }
    }
}
