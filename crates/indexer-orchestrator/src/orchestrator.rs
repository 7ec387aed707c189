//! The top-level crawl driver.
//!
//! Pages documents out of the source collection in order, tags each one
//! with the crawl id and normalized timestamps, hands it to both
//! enrichment listeners, then waits on each lineage with stall detection
//! before committing and cleaning up orphans from prior crawls.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use indexer_pipeline::DocumentListener;
use indexer_solr::{SolrAdmin, SourceReader};
use indexer_tracker::{wait_for_completion, IndexingTracker, LineageState, WaitConfig, WaitOutcome};
use indexer_types::{schema, InputDocument, Lineage, OverallStatus};

use crate::error::IndexingError;
use crate::validator::DestinationValidator;

/// Rewrite a conventional creation-date field into the Solr date format.
///
/// Integer epoch millis and parseable date strings are normalized; any
/// other shape is left untouched with a warning.
pub(crate) fn normalize_creation_date(document: &mut InputDocument) {
    let value = match document.get(schema::CREATION_DATE) {
        Some(value) => value.clone(),
        None => return,
    };
    match creation_date_to_solr_string(&value) {
        Some(formatted) => document.set(schema::CREATION_DATE, formatted),
        None => warn!(
            value = %value,
            "creation_date exists but is neither epoch millis nor a date, giving up on conversion"
        ),
    }
}

fn creation_date_to_solr_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_i64().and_then(schema::solr_date_from_epoch_millis),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| schema::format_solr_date(dt.with_timezone(&Utc))),
        _ => None,
    }
}

/// Pages needed to cover `total` documents at `page_size` per page.
///
/// One extra page covers the remainder; an empty page ends the loop
/// early, so the slack costs one fetch at most.
pub(crate) fn page_count(total: i64, page_size: usize) -> u64 {
    (total as u64 / page_size as u64) + 1
}

/// Drives one export job end to end.
pub struct SemanticIndexer {
    source: Arc<dyn SourceReader>,
    admin: Arc<dyn SolrAdmin>,
    validator: DestinationValidator,
    tracker: Arc<IndexingTracker>,
    listeners: Vec<Arc<dyn DocumentListener>>,
    destination_collection: String,
    page_size: usize,
    wait: WaitConfig,
}

impl SemanticIndexer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn SourceReader>,
        admin: Arc<dyn SolrAdmin>,
        validator: DestinationValidator,
        tracker: Arc<IndexingTracker>,
        listeners: Vec<Arc<dyn DocumentListener>>,
        destination_collection: &str,
        page_size: usize,
        wait: WaitConfig,
    ) -> Self {
        Self {
            source,
            admin,
            validator,
            tracker,
            listeners,
            destination_collection: destination_collection.to_string(),
            page_size: page_size.max(1),
            wait,
        }
    }

    /// The shared tracker, for status queries.
    pub fn tracker(&self) -> Arc<IndexingTracker> {
        self.tracker.clone()
    }

    /// The destination validator, for health queries.
    pub fn validator(&self) -> &DestinationValidator {
        &self.validator
    }

    /// Run one export job under the given crawl id.
    ///
    /// Fatal failures (validation, source errors) abort the crawl; a
    /// stalled lineage does not, but a failed primary lineage makes the
    /// whole job report failure after commit and cleanup have run.
    pub async fn run_export_job(&self, crawl_id: Uuid) -> Result<(), IndexingError> {
        let crawl_id = crawl_id.to_string();
        match self.run_inner(&crawl_id).await {
            Ok(()) => {
                self.tracker.update_crawl_status(
                    OverallStatus::Completed,
                    "Indexing completed successfully",
                );
                self.delete_orphans(&crawl_id).await;
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                error!(crawl_id = %crawl_id, error = %message, "Export job failed");
                self.tracker
                    .update_crawl_status(OverallStatus::Failed, &message);
                Err(e)
            }
        }
    }

    async fn run_inner(&self, crawl_id: &str) -> Result<(), IndexingError> {
        self.tracker.reset();
        self.tracker.start_tracking(0, crawl_id);

        // Nothing moves until the destination is known good
        self.validator.validate().await?;

        let total_expected = self
            .source
            .total_count()
            .await
            .map_err(IndexingError::Source)?;
        info!(
            total_expected,
            destination = %self.destination_collection,
            "Source reported document count, starting crawl"
        );
        self.tracker.finalize_expected(total_expected);

        let dispatched = self.process_all_pages(crawl_id, total_expected).await?;
        if total_expected < 0 {
            // Open-ended crawl: the dispatched count becomes the expected
            // total now that the last page has been seen
            self.tracker.finalize_expected(dispatched as i64);
        }
        info!(
            dispatched,
            destination = %self.destination_collection,
            "Publishing complete, waiting for enrichment to settle"
        );

        let primary_outcome =
            wait_for_completion(&self.tracker, Lineage::Primary, &self.wait).await;
        if primary_outcome == WaitOutcome::Stalled {
            warn!("Primary lineage stalled; continuing with commit and cleanup");
        }
        self.admin
            .commit(&self.destination_collection)
            .await
            .map_err(IndexingError::Destination)?;
        self.tracker.finalize_tracking(Lineage::Primary);

        wait_for_completion(&self.tracker, Lineage::Vector, &self.wait).await;
        self.tracker.finalize_tracking(Lineage::Vector);
        for collection in self.validator.vector_destination_collections() {
            self.admin
                .commit(&collection)
                .await
                .map_err(IndexingError::Destination)?;
        }

        if self.tracker.lineage_status(Lineage::Primary).state == LineageState::Failed {
            return Err(IndexingError::JobFailed {
                crawl_id: crawl_id.to_string(),
                status: self.tracker.current_status().to_string(),
            });
        }
        Ok(())
    }

    /// Fetch and enrich every page. Returns how many documents were
    /// dispatched to the listeners.
    async fn process_all_pages(
        &self,
        crawl_id: &str,
        total_expected: i64,
    ) -> Result<u64, IndexingError> {
        let max_pages = if total_expected < 0 {
            None
        } else {
            Some(page_count(total_expected, self.page_size))
        };

        let mut dispatched: u64 = 0;
        let mut page: u64 = 0;
        loop {
            if let Some(max_pages) = max_pages {
                if page >= max_pages {
                    break;
                }
            }
            let response = self
                .source
                .fetch_page(self.page_size, page as usize)
                .await
                .map_err(IndexingError::Source)?;
            if response.is_empty() || response.docs.is_empty() {
                info!(page, "No documents in page, ending pagination");
                break;
            }

            info!(
                page,
                count = response.docs.len(),
                destination = %self.destination_collection,
                "Exporting documents from source to destination"
            );
            for mut document in response.docs {
                self.tag_document(&mut document, crawl_id);
                dispatched += 1;
                for listener in &self.listeners {
                    if let Err(e) = listener.process_document(&document).await {
                        // Contract violations are bugs in the tagging
                        // above, not data problems
                        error!(
                            listener = listener.name(),
                            error = %e,
                            "Listener rejected document"
                        );
                    }
                }
            }
            page += 1;
        }
        Ok(dispatched)
    }

    fn tag_document(&self, document: &mut InputDocument, crawl_id: &str) {
        normalize_creation_date(document);
        document.set(schema::CRAWL_DATE, schema::format_solr_date(Utc::now()));
        document.set(schema::CRAWL_ID, crawl_id);
    }

    /// Remove every document in the destination and vector collections
    /// whose crawl id differs from `crawl_id`.
    ///
    /// Cleanup failures are logged, not propagated: the crawl itself
    /// already finished.
    pub async fn delete_orphans(&self, crawl_id: &str) {
        info!(
            collection = %self.destination_collection,
            crawl_id,
            "Deleting orphans; documents from other crawls will be removed"
        );
        if let Err(e) = self
            .admin
            .delete_orphans(&self.destination_collection, crawl_id)
            .await
        {
            error!(
                collection = %self.destination_collection,
                error = %e,
                "Orphan deletion failed"
            );
        }
        for collection in self.validator.vector_destination_collections() {
            info!(collection = %collection, crawl_id, "Deleting orphans from vector collection");
            if let Err(e) = self.admin.delete_orphans(&collection, crawl_id).await {
                error!(collection = %collection, error = %e, "Orphan deletion failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use indexer_pipeline::PipelineError;
    use indexer_services::{EmbeddingService, HealthProbeConfig, ServiceError};
    use indexer_solr::{SelectResponse, SolrError, VectorFieldRequest};
    use indexer_types::{
        CollectionCreationConfig, CrawlStatus, DestinationSolrConfig, VectorFieldSpec,
        VectorSpecRegistry,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct PagedSource {
        total: i64,
        docs: Vec<InputDocument>,
        fetches: AtomicUsize,
    }

    impl PagedSource {
        fn with_documents(total: i64, count: usize) -> Self {
            let docs = (0..count)
                .map(|i| {
                    let mut doc = InputDocument::new();
                    doc.set(schema::ID, format!("doc-{}", i));
                    doc.set("title", format!("title {}", i));
                    doc
                })
                .collect();
            Self {
                total,
                docs,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SourceReader for PagedSource {
        async fn total_count(&self) -> Result<i64, SolrError> {
            Ok(self.total)
        }

        async fn fetch_page(
            &self,
            page_size: usize,
            page: usize,
        ) -> Result<SelectResponse, SolrError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let start = page * page_size;
            let docs: Vec<_> = self
                .docs
                .iter()
                .skip(start)
                .take(page_size)
                .cloned()
                .collect();
            Ok(SelectResponse {
                num_found: if docs.is_empty() { 0 } else { self.docs.len() as i64 },
                docs,
            })
        }
    }

    #[derive(Default)]
    struct RecordingAdmin {
        commits: Mutex<Vec<String>>,
        orphan_deletes: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SolrAdmin for RecordingAdmin {
        async fn is_alive(&self) -> bool {
            true
        }

        async fn collection_exists(&self, _collection: &str) -> Result<bool, SolrError> {
            Ok(true)
        }

        async fn create_collection(
            &self,
            _collection: &str,
            _creation: &CollectionCreationConfig,
        ) -> Result<(), SolrError> {
            Ok(())
        }

        async fn config_set_exists(&self, _config_name: &str) -> Result<bool, SolrError> {
            Ok(true)
        }

        async fn upload_config_set(
            &self,
            _config_name: &str,
            _zip: Vec<u8>,
        ) -> Result<(), SolrError> {
            Ok(())
        }

        async fn ensure_vector_field(
            &self,
            request: &VectorFieldRequest,
        ) -> Result<String, SolrError> {
            Ok(request.field_name.clone())
        }

        async fn commit(&self, collection: &str) -> Result<(), SolrError> {
            self.commits.lock().unwrap().push(collection.to_string());
            Ok(())
        }

        async fn delete_orphans(&self, collection: &str, crawl_id: &str) -> Result<u64, SolrError> {
            self.orphan_deletes
                .lock()
                .unwrap()
                .push((collection.to_string(), crawl_id.to_string()));
            Ok(0)
        }
    }

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingService for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
            Ok(vec![0.0; 4])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
            Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
        }

        async fn check_health(&self) -> bool {
            true
        }
    }

    /// Listener that settles every document immediately, optionally
    /// checking the tagging the orchestrator applied.
    struct SettlingListener {
        tracker: Arc<IndexingTracker>,
        seen: Mutex<Vec<InputDocument>>,
        settle: bool,
    }

    #[async_trait]
    impl DocumentListener for SettlingListener {
        async fn process_document(&self, document: &InputDocument) -> Result<(), PipelineError> {
            self.seen.lock().unwrap().push(document.clone());
            if self.settle {
                self.tracker.document_processed();
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "settling"
        }
    }

    fn destination() -> DestinationSolrConfig {
        DestinationSolrConfig {
            url: "http://dest:8983".to_string(),
            collection: "dest".to_string(),
            collection_creation: CollectionCreationConfig {
                config_name: "semantic_example".to_string(),
                config_file: None,
                num_shards: 1,
                num_replicas: 1,
            },
        }
    }

    async fn indexer_with(
        source: Arc<PagedSource>,
        admin: Arc<RecordingAdmin>,
        specs: Vec<VectorFieldSpec>,
        settle: bool,
        page_size: usize,
    ) -> (SemanticIndexer, Arc<IndexingTracker>, Arc<SettlingListener>) {
        let registry = Arc::new(VectorSpecRegistry::new(specs));
        let tracker = Arc::new(IndexingTracker::new(registry.chunk_field_count(), 10));
        let validator = DestinationValidator::new(
            admin.clone(),
            Arc::new(FixedEmbedder),
            registry,
            destination(),
            HealthProbeConfig {
                initial_delay: Duration::from_secs(3600),
                interval: Duration::from_secs(3600),
            },
        )
        .await;
        let listener = Arc::new(SettlingListener {
            tracker: tracker.clone(),
            seen: Mutex::new(Vec::new()),
            settle,
        });
        let indexer = SemanticIndexer::new(
            source,
            admin,
            validator,
            tracker.clone(),
            vec![listener.clone()],
            "dest",
            page_size,
            WaitConfig {
                poll_interval: Duration::from_secs(10),
                max_warnings: 3,
            },
        );
        (indexer, tracker, listener)
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_count_pages_are_issued() {
        let source = Arc::new(PagedSource::with_documents(25, 25));
        let admin = Arc::new(RecordingAdmin::default());
        let (indexer, _tracker, listener) =
            indexer_with(source.clone(), admin, Vec::new(), true, 10).await;

        indexer.run_export_job(Uuid::new_v4()).await.unwrap();

        // floor(25/10) + 1 = 3 pages, all with documents
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
        assert_eq!(listener.seen.lock().unwrap().len(), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_page_ends_the_loop_early() {
        // Source claims 50 documents but only has 10: page 2 comes back
        // empty and stops the loop before the computed page count
        let source = Arc::new(PagedSource::with_documents(50, 10));
        let admin = Arc::new(RecordingAdmin::default());
        let (indexer, tracker, _listener) =
            indexer_with(source.clone(), admin, Vec::new(), true, 10).await;

        // Expected never settles down to 10, so the primary lineage
        // stalls and the job reports failure
        let result = indexer.run_export_job(Uuid::new_v4()).await;
        assert!(result.is_err());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.current_status().status, OverallStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_documents_are_tagged_before_enrichment() {
        let source = Arc::new(PagedSource::with_documents(2, 2));
        let admin = Arc::new(RecordingAdmin::default());
        let (indexer, _tracker, listener) =
            indexer_with(source, admin, Vec::new(), true, 10).await;

        let crawl_id = Uuid::new_v4();
        indexer.run_export_job(crawl_id).await.unwrap();

        let seen = listener.seen.lock().unwrap();
        for doc in seen.iter() {
            assert_eq!(
                doc.get_str(schema::CRAWL_ID).as_deref(),
                Some(crawl_id.to_string().as_str())
            );
            assert!(doc.get_str(schema::CRAWL_DATE).is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_job_commits_and_deletes_orphans() {
        let source = Arc::new(PagedSource::with_documents(3, 3));
        let admin = Arc::new(RecordingAdmin::default());
        let (indexer, tracker, _listener) = indexer_with(
            source,
            admin.clone(),
            vec![VectorFieldSpec::chunked("body")],
            true,
            10,
        )
        .await;

        let crawl_id = Uuid::new_v4();
        // The settling listener only settles the primary lineage; settle
        // the vector lineage from here
        let driver_tracker = tracker.clone();
        let driver = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            for _ in 0..3 {
                driver_tracker.vector_document_processed();
            }
        });
        indexer.run_export_job(crawl_id).await.unwrap();
        driver.await.unwrap();

        assert_eq!(tracker.current_status().status, OverallStatus::Completed);
        let commits = admin.commits.lock().unwrap();
        assert!(commits.contains(&"dest".to_string()));
        assert!(commits.contains(&"dest-body-chunks".to_string()));

        let deletes = admin.orphan_deletes.lock().unwrap();
        let collections: Vec<_> = deletes.iter().map(|(c, _)| c.clone()).collect();
        assert!(collections.contains(&"dest".to_string()));
        assert!(collections.contains(&"dest-body-chunks".to_string()));
        assert!(deletes.iter().all(|(_, id)| *id == crawl_id.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_primary_lineage_fails_the_job_after_commit() {
        let source = Arc::new(PagedSource::with_documents(5, 5));
        let admin = Arc::new(RecordingAdmin::default());
        // Listener never settles anything: both lineages stall
        let (indexer, tracker, _listener) =
            indexer_with(source, admin.clone(), Vec::new(), false, 10).await;

        let err = indexer.run_export_job(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, IndexingError::JobFailed { .. }));

        // Commit still ran; partial state is visible
        assert!(admin.commits.lock().unwrap().contains(&"dest".to_string()));
        let status = tracker.current_status();
        assert_eq!(status.status, OverallStatus::Failed);
        assert!(status.message.contains("failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_ended_pagination_when_count_unknown() {
        let source = Arc::new(PagedSource::with_documents(-1, 15));
        let admin = Arc::new(RecordingAdmin::default());
        let (indexer, tracker, listener) =
            indexer_with(source.clone(), admin, Vec::new(), true, 10).await;

        indexer.run_export_job(Uuid::new_v4()).await.unwrap();

        // Pages 0 and 1 have documents; page 2 is empty and ends the loop
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
        assert_eq!(listener.seen.lock().unwrap().len(), 15);
        assert_eq!(tracker.current_status().documents_expected, 15);
        assert_eq!(tracker.current_status().status, OverallStatus::Completed);
    }

    #[test]
    fn test_page_count_formula() {
        assert_eq!(page_count(0, 100), 1);
        assert_eq!(page_count(99, 100), 1);
        assert_eq!(page_count(100, 100), 2);
        assert_eq!(page_count(101, 100), 2);
        assert_eq!(page_count(250, 100), 3);
    }

    #[test]
    fn test_normalize_creation_date_epoch_millis() {
        let mut doc = InputDocument::new();
        doc.set(schema::CREATION_DATE, 1_609_459_200_500_i64);
        normalize_creation_date(&mut doc);
        assert_eq!(
            doc.get_str(schema::CREATION_DATE).as_deref(),
            Some("2021-01-01T00:00:00.500Z")
        );
    }

    #[test]
    fn test_normalize_creation_date_rfc3339() {
        let mut doc = InputDocument::new();
        doc.set(schema::CREATION_DATE, "2021-06-01T12:00:00+02:00");
        normalize_creation_date(&mut doc);
        assert_eq!(
            doc.get_str(schema::CREATION_DATE).as_deref(),
            Some("2021-06-01T10:00:00.000Z")
        );
    }

    #[test]
    fn test_normalize_creation_date_unparseable_left_untouched() {
        let mut doc = InputDocument::new();
        doc.set(schema::CREATION_DATE, json!({"weird": true}));
        normalize_creation_date(&mut doc);
        assert_eq!(doc.get(schema::CREATION_DATE), Some(&json!({"weird": true})));
    }

    #[test]
    fn test_normalize_creation_date_absent_is_noop() {
        let mut doc = InputDocument::new();
        doc.set(schema::ID, "doc-1");
        normalize_creation_date(&mut doc);
        assert!(doc.get(schema::CREATION_DATE).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_retains_failed_and_completed_crawls() {
        let source = Arc::new(PagedSource::with_documents(2, 2));
        let admin = Arc::new(RecordingAdmin::default());
        let (indexer, tracker, _listener) =
            indexer_with(source, admin, Vec::new(), true, 10).await;

        let first = Uuid::new_v4();
        indexer.run_export_job(first).await.unwrap();
        let second = Uuid::new_v4();
        indexer.run_export_job(second).await.unwrap();

        let history: Vec<CrawlStatus> = tracker.history(10);
        let ids: Vec<_> = history.iter().map(|s| s.crawl_id.clone()).collect();
        assert!(ids.contains(&first.to_string()));
        assert!(ids.contains(&second.to_string()));
    }
}
