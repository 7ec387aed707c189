//! Dense vector field reconciliation against a collection schema.
//!
//! A requested vector field may already exist with an incompatible
//! dimensionality (schemas outlive embedding models). In that case the
//! field is created under a dimension-suffixed name and the caller is told
//! which name to use; the rewrite back into configuration happens once,
//! in destination validation.

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::admin::HttpSolrAdminActions;
use crate::error::SolrError;
use crate::update::check_response_status;

/// Everything needed to ensure one vector field in one collection.
#[derive(Debug, Clone)]
pub struct VectorFieldRequest {
    pub collection: String,
    pub field_name: String,
    pub dimensionality: usize,
    pub similarity_function: String,
    pub hnsw_max_connections: u32,
    pub hnsw_beam_width: u32,
}

impl VectorFieldRequest {
    /// Field type name shared by all vector fields of one dimensionality.
    pub fn field_type_name(&self) -> String {
        format!("knn_vector_{}", self.dimensionality)
    }

    /// Fallback field name used when the requested name is taken.
    pub fn suffixed_field_name(&self) -> String {
        format!("{}-{}", self.field_name, self.dimensionality)
    }
}

/// Read a `vectorDimension` attribute that Solr may render as a number or
/// a string.
pub(crate) fn parse_vector_dimension(field_type: &Value) -> Option<usize> {
    match field_type.get("vectorDimension") {
        Some(Value::Number(n)) => n.as_u64().map(|n| n as usize),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

impl HttpSolrAdminActions {
    /// Ensure the requested vector field exists with the requested
    /// dimensionality, returning the resolved field name.
    pub(crate) async fn resolve_vector_field(
        &self,
        request: &VectorFieldRequest,
    ) -> Result<String, SolrError> {
        match self.field_type_of(&request.collection, &request.field_name).await? {
            Some(existing_type) => {
                let dimension = self
                    .field_type_dimension(&request.collection, &existing_type)
                    .await?;
                if dimension == Some(request.dimensionality) {
                    debug!(
                        collection = %request.collection,
                        field = %request.field_name,
                        "Vector field already present with matching dimensionality"
                    );
                    return Ok(request.field_name.clone());
                }

                let resolved = request.suffixed_field_name();
                warn!(
                    collection = %request.collection,
                    requested = %request.field_name,
                    resolved = %resolved,
                    existing_dimension = ?dimension,
                    "Requested vector field is taken, creating it under a resolved name"
                );
                if self.field_type_of(&request.collection, &resolved).await?.is_none() {
                    self.create_vector_field(request, &resolved).await?;
                }
                Ok(resolved)
            }
            None => {
                self.create_vector_field(request, &request.field_name).await?;
                Ok(request.field_name.clone())
            }
        }
    }

    /// The declared type of a schema field, or `None` when the field does
    /// not exist.
    async fn field_type_of(
        &self,
        collection: &str,
        field: &str,
    ) -> Result<Option<String>, SolrError> {
        let path = format!("/solr/{}/schema/fields/{}", collection, field);
        match self.get_json(&path, &[("wt", "json")]).await {
            Ok(body) => Ok(body
                .pointer("/field/type")
                .and_then(Value::as_str)
                .map(str::to_string)),
            Err(SolrError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The vector dimensionality of a field type, or `None` when the type
    /// is absent or not a vector type.
    async fn field_type_dimension(
        &self,
        collection: &str,
        type_name: &str,
    ) -> Result<Option<usize>, SolrError> {
        let path = format!("/solr/{}/schema/fieldtypes/{}", collection, type_name);
        match self.get_json(&path, &[("wt", "json")]).await {
            Ok(body) => Ok(body.get("fieldType").and_then(parse_vector_dimension)),
            Err(SolrError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_vector_field(
        &self,
        request: &VectorFieldRequest,
        field_name: &str,
    ) -> Result<(), SolrError> {
        let type_name = request.field_type_name();
        if self
            .field_type_dimension(&request.collection, &type_name)
            .await?
            .is_none()
        {
            let body = json!({
                "add-field-type": {
                    "name": type_name,
                    "class": "solr.DenseVectorField",
                    "vectorDimension": request.dimensionality,
                    "similarityFunction": request.similarity_function,
                    "knnAlgorithm": "hnsw",
                    "hnswMaxConnections": request.hnsw_max_connections,
                    "hnswBeamWidth": request.hnsw_beam_width,
                }
            });
            self.post_schema(&request.collection, &body).await?;
            info!(
                collection = %request.collection,
                field_type = %type_name,
                dimensionality = request.dimensionality,
                "Created vector field type"
            );
        }

        let body = json!({
            "add-field": {
                "name": field_name,
                "type": type_name,
                "indexed": true,
                "stored": true,
            }
        });
        self.post_schema(&request.collection, &body).await?;
        info!(
            collection = %request.collection,
            field = %field_name,
            "Created vector field"
        );
        Ok(())
    }

    async fn post_schema(&self, collection: &str, body: &Value) -> Result<(), SolrError> {
        let url = format!("{}/solr/{}/schema", self.base_url, collection);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_name() {
        let request = VectorFieldRequest {
            collection: "dest".to_string(),
            field_name: "title-vector".to_string(),
            dimensionality: 384,
            similarity_function: "cosine".to_string(),
            hnsw_max_connections: 16,
            hnsw_beam_width: 100,
        };
        assert_eq!(request.field_type_name(), "knn_vector_384");
        assert_eq!(request.suffixed_field_name(), "title-vector-384");
    }

    #[test]
    fn test_parse_vector_dimension_number() {
        let field_type = json!({"name": "knn_vector_384", "vectorDimension": 384});
        assert_eq!(parse_vector_dimension(&field_type), Some(384));
    }

    #[test]
    fn test_parse_vector_dimension_string() {
        let field_type = json!({"name": "knn_vector_768", "vectorDimension": "768"});
        assert_eq!(parse_vector_dimension(&field_type), Some(768));
    }

    #[test]
    fn test_parse_vector_dimension_absent() {
        let field_type = json!({"name": "text_general"});
        assert_eq!(parse_vector_dimension(&field_type), None);
    }
}
