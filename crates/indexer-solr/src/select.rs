//! Paginated reads from the source collection.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use indexer_types::InputDocument;

use crate::error::SolrError;

/// One page of source documents.
#[derive(Debug, Clone, Default)]
pub struct SelectResponse {
    /// Total matching documents reported by the source; 0 signals
    /// end-of-data
    pub num_found: i64,
    pub docs: Vec<InputDocument>,
}

impl SelectResponse {
    /// Whether the source reported no matching documents at all.
    pub fn is_empty(&self) -> bool {
        self.num_found == 0
    }
}

/// Paginated query interface over the source collection.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Total number of documents in the source collection. A negative
    /// value means the source could not report a count.
    async fn total_count(&self) -> Result<i64, SolrError>;

    /// Fetch one page of documents.
    async fn fetch_page(&self, page_size: usize, page: usize)
        -> Result<SelectResponse, SolrError>;
}

#[derive(Deserialize)]
struct SelectBody {
    response: ResponseBody,
}

#[derive(Deserialize)]
struct ResponseBody {
    #[serde(rename = "numFound")]
    num_found: i64,
    docs: Vec<InputDocument>,
}

pub(crate) fn parse_select_body(body: &str) -> Result<SelectResponse, SolrError> {
    let parsed: SelectBody = serde_json::from_str(body)?;
    Ok(SelectResponse {
        num_found: parsed.response.num_found,
        docs: parsed.response.docs,
    })
}

/// HTTP select client against one source collection.
pub struct HttpSolrSelectClient {
    client: Client,
    base_url: String,
    collection: String,
}

impl HttpSolrSelectClient {
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
    ) -> Result<Self, SolrError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SolrError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            collection: collection.into(),
        })
    }

    async fn select(&self, start: usize, rows: usize) -> Result<SelectResponse, SolrError> {
        let url = format!("{}/solr/{}/select", self.base_url, self.collection);
        let start = start.to_string();
        let rows = rows.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", "*:*"),
                ("wt", "json"),
                ("start", start.as_str()),
                ("rows", rows.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SolrError::Status { status, body });
        }

        let body = response.text().await?;
        parse_select_body(&body)
    }
}

#[async_trait]
impl SourceReader for HttpSolrSelectClient {
    async fn total_count(&self) -> Result<i64, SolrError> {
        let response = self.select(0, 0).await?;
        debug!(
            collection = %self.collection,
            num_found = response.num_found,
            "Queried source document count"
        );
        Ok(response.num_found)
    }

    async fn fetch_page(
        &self,
        page_size: usize,
        page: usize,
    ) -> Result<SelectResponse, SolrError> {
        self.select(page * page_size, page_size).await
    }
}
