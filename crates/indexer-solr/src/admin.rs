//! Collection lifecycle operations and bulk orphan deletion.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use indexer_types::CollectionCreationConfig;

use crate::error::SolrError;
use crate::fields::VectorFieldRequest;
use crate::update::check_response_status;

/// Administrative interface over a destination Solr node.
#[async_trait]
pub trait SolrAdmin: Send + Sync {
    /// Whether the node answers at all.
    async fn is_alive(&self) -> bool;

    /// Whether a collection exists (answers a ping).
    async fn collection_exists(&self, collection: &str) -> Result<bool, SolrError>;

    /// Create a collection, uploading its config set first when the config
    /// set is not already registered. Creating an existing collection is a
    /// no-op.
    async fn create_collection(
        &self,
        collection: &str,
        creation: &CollectionCreationConfig,
    ) -> Result<(), SolrError>;

    /// Whether a config set is registered.
    async fn config_set_exists(&self, config_name: &str) -> Result<bool, SolrError>;

    /// Upload a zipped config set.
    async fn upload_config_set(&self, config_name: &str, zip: Vec<u8>) -> Result<(), SolrError>;

    /// Ensure a dense vector field exists in the collection schema,
    /// returning the resolved field name (which may differ from the
    /// requested one when the requested name is already taken with an
    /// incompatible definition).
    async fn ensure_vector_field(&self, request: &VectorFieldRequest)
        -> Result<String, SolrError>;

    /// Commit a collection.
    async fn commit(&self, collection: &str) -> Result<(), SolrError>;

    /// Delete every document whose crawl id differs from `crawl_id`, then
    /// commit. Returns the number of orphaned documents observed before
    /// the delete.
    async fn delete_orphans(&self, collection: &str, crawl_id: &str) -> Result<u64, SolrError>;
}

/// Parse Solr's alternating name/count facet array for one field.
pub(crate) fn parse_facet_counts(body: &Value, field: &str) -> Vec<(String, u64)> {
    let entries = match body
        .pointer(&format!("/facet_counts/facet_fields/{}", field))
        .and_then(Value::as_array)
    {
        Some(entries) => entries,
        None => return Vec::new(),
    };

    entries
        .chunks(2)
        .filter_map(|pair| match pair {
            [Value::String(name), count] => {
                count.as_u64().map(|count| (name.clone(), count))
            }
            _ => None,
        })
        .collect()
}

/// HTTP implementation of [`SolrAdmin`] against one Solr node.
pub struct HttpSolrAdminActions {
    pub(crate) client: Client,
    pub(crate) base_url: String,
}

impl HttpSolrAdminActions {
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

    pub(crate) async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, SolrError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SolrError::Status { status, body });
        }
        Ok(response.json().await?)
    }

    async fn ping_collection(&self, collection: &str) -> bool {
        let path = format!("/solr/{}/admin/ping", collection);
        match self.get_json(&path, &[("wt", "json")]).await {
            Ok(body) => body.get("status").and_then(Value::as_str) == Some("OK"),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl SolrAdmin for HttpSolrAdminActions {
    async fn is_alive(&self) -> bool {
        match self
            .get_json("/solr/admin/info/system", &[("wt", "json")])
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Solr node did not answer system info");
                false
            }
        }
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, SolrError> {
        let exists = self.ping_collection(collection).await;
        debug!(collection, exists, "Checked collection existence");
        Ok(exists)
    }

    async fn create_collection(
        &self,
        collection: &str,
        creation: &CollectionCreationConfig,
    ) -> Result<(), SolrError> {
        if self.collection_exists(collection).await? {
            info!(collection, "Collection exists, no need to create it");
            return Ok(());
        }

        if !self.config_set_exists(&creation.config_name).await? {
            let path = creation
                .config_file
                .as_deref()
                .ok_or_else(|| SolrError::MissingConfigFile(creation.config_name.clone()))?;
            let zip = tokio::fs::read(path).await?;
            self.upload_config_set(&creation.config_name, zip).await?;
        } else {
            info!(
                config_name = %creation.config_name,
                "Config set exists, creating the collection directly"
            );
        }

        let num_shards = creation.num_shards.to_string();
        let num_replicas = creation.num_replicas.to_string();
        let body = self
            .get_json(
                "/solr/admin/collections",
                &[
                    ("action", "CREATE"),
                    ("name", collection),
                    ("collection.configName", creation.config_name.as_str()),
                    ("numShards", num_shards.as_str()),
                    ("replicationFactor", num_replicas.as_str()),
                    ("wt", "json"),
                ],
            )
            .await?;
        check_response_status(&body)?;
        info!(collection, "Created collection");
        Ok(())
    }

    async fn config_set_exists(&self, config_name: &str) -> Result<bool, SolrError> {
        let body = self
            .get_json("/solr/admin/configs", &[("action", "LIST"), ("wt", "json")])
            .await?;
        let sets = body.get("configSets").and_then(Value::as_array);
        let exists = match sets {
            Some(sets) => sets
                .iter()
                .filter_map(Value::as_str)
                .any(|name| name == config_name),
            None => {
                info!("There are no config sets registered on this node");
                false
            }
        };
        Ok(exists)
    }

    async fn upload_config_set(&self, config_name: &str, zip: Vec<u8>) -> Result<(), SolrError> {
        let url = format!("{}/solr/admin/configs", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("action", "UPLOAD"), ("name", config_name), ("wt", "json")])
            .header("Content-Type", "application/octet-stream")
            .body(zip)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SolrError::Status { status, body });
        }
        let body: Value = response.json().await?;
        check_response_status(&body)?;
        info!(config_name, "Config set uploaded");
        Ok(())
    }

    async fn ensure_vector_field(
        &self,
        request: &VectorFieldRequest,
    ) -> Result<String, SolrError> {
        self.resolve_vector_field(request).await
    }

    async fn commit(&self, collection: &str) -> Result<(), SolrError> {
        let url = format!("{}/solr/{}/update", self.base_url, collection);
        let response = self
            .client
            .post(&url)
            .query(&[("commit", "true"), ("wt", "json")])
            .json(&serde_json::json!({}))
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

    async fn delete_orphans(&self, collection: &str, crawl_id: &str) -> Result<u64, SolrError> {
        let path = format!("/solr/{}/select", collection);
        let body = self
            .get_json(
                &path,
                &[
                    ("q", "*:*"),
                    ("rows", "0"),
                    ("facet", "true"),
                    ("facet.field", indexer_types::schema::CRAWL_ID),
                    ("facet.limit", "-1"),
                    ("wt", "json"),
                ],
            )
            .await?;

        let counts = parse_facet_counts(&body, indexer_types::schema::CRAWL_ID);
        let mut orphaned = 0;
        for (id, count) in &counts {
            info!(collection, crawl_id = %id, count, "Crawl id facet");
            if id != crawl_id {
                orphaned += count;
            }
        }

        let query = format!("-{}:\"{}\"", indexer_types::schema::CRAWL_ID, crawl_id);
        let url = format!("{}/solr/{}/update", self.base_url, collection);
        let response = self
            .client
            .post(&url)
            .query(&[("wt", "json")])
            .json(&serde_json::json!({"delete": {"query": query}}))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SolrError::Status { status, body });
        }
        let delete_body: Value = response.json().await?;
        check_response_status(&delete_body)?;

        self.commit(collection).await?;
        if orphaned > 0 {
            warn!(collection, orphaned, crawl_id, "Deleted orphaned documents");
        }
        Ok(orphaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_facet_counts() {
        let body = json!({
            "facet_counts": {
                "facet_fields": {
                    "crawl_id": ["new-crawl", 120, "old-crawl", 45]
                }
            }
        });
        let counts = parse_facet_counts(&body, "crawl_id");
        assert_eq!(
            counts,
            vec![
                ("new-crawl".to_string(), 120),
                ("old-crawl".to_string(), 45)
            ]
        );
    }

    #[test]
    fn test_parse_facet_counts_missing_field() {
        let body = json!({"facet_counts": {"facet_fields": {}}});
        assert!(parse_facet_counts(&body, "crawl_id").is_empty());
    }

    #[test]
    fn test_parse_facet_counts_no_facets() {
        let body = json!({"response": {"numFound": 0}});
        assert!(parse_facet_counts(&body, "crawl_id").is_empty());
    }
}
