//! Document writes against destination collections.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use indexer_types::InputDocument;

use crate::error::SolrError;

/// Write interface over destination collections.
#[async_trait]
pub trait DocumentWriter: Send + Sync {
    /// Add (or replace) documents.
    async fn add(&self, collection: &str, documents: &[InputDocument]) -> Result<(), SolrError>;

    /// Make pending adds/deletes visible.
    async fn commit(&self, collection: &str) -> Result<(), SolrError>;

    /// Delete every document matching a query. Requires a commit to become
    /// visible.
    async fn delete_by_query(&self, collection: &str, query: &str) -> Result<(), SolrError>;

    /// Whether the collection answers a ping.
    async fn ping(&self, collection: &str) -> bool;
}

/// Verify Solr's in-body status code on an update/admin response.
pub(crate) fn check_response_status(body: &Value) -> Result<(), SolrError> {
    match body.pointer("/responseHeader/status").and_then(Value::as_i64) {
        Some(0) => Ok(()),
        Some(code) => Err(SolrError::Admin(format!(
            "response status {}: {}",
            code, body
        ))),
        None => Err(SolrError::Parse(format!(
            "response without responseHeader.status: {}",
            body
        ))),
    }
}

/// HTTP update client against one Solr node.
pub struct HttpSolrUpdateClient {
    client: Client,
    base_url: String,
}

impl HttpSolrUpdateClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SolrError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SolrError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn post_update(&self, collection: &str, body: &Value) -> Result<(), SolrError> {
        let url = format!("{}/solr/{}/update", self.base_url, collection);
        let response = self
            .client
            .post(&url)
            .query(&[("wt", "json")])
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SolrError::Status { status, body });
        }

        let body: Value = response.json().await?;
        check_response_status(&body)
    }
}

#[async_trait]
impl DocumentWriter for HttpSolrUpdateClient {
    async fn add(&self, collection: &str, documents: &[InputDocument]) -> Result<(), SolrError> {
        if documents.is_empty() {
            return Ok(());
        }
        let body = serde_json::to_value(documents)?;
        self.post_update(collection, &body).await?;
        debug!(collection, count = documents.len(), "Added documents");
        Ok(())
    }

    async fn commit(&self, collection: &str) -> Result<(), SolrError> {
        self.post_update(collection, &json!({"commit": {}})).await
    }

    async fn delete_by_query(&self, collection: &str, query: &str) -> Result<(), SolrError> {
        self.post_update(collection, &json!({"delete": {"query": query}}))
            .await
    }

    async fn ping(&self, collection: &str) -> bool {
        let url = format!("{}/solr/{}/admin/ping", self.base_url, collection);
        match self.client.get(&url).query(&[("wt", "json")]).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<Value>().await {
                    Ok(body) => body.get("status").and_then(Value::as_str) == Some("OK"),
                    Err(_) => false,
                }
            }
            _ => false,
        }
    }
}
