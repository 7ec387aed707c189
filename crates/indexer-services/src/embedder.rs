//! Embedding service client.
//!
//! Two call shapes: a single text returning one vector, and an ordered
//! batch returning one vector per input. The batch reply must be
//! one-to-one with the inputs; anything else is a contract violation, not
//! a retryable failure.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ServiceError;
use crate::retry::{with_retry, RetryPolicy};

/// Produces embedding vectors for text.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;

    /// Embed a batch; the reply is order-preserving and one-to-one with
    /// the inputs.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError>;

    /// Whether the service currently answers its health endpoint.
    async fn check_health(&self) -> bool;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedReply {
    embeddings: Vec<f32>,
}

#[derive(Serialize)]
struct EmbedBatchRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct EmbedBatchReply {
    embeddings: Vec<Vec<f32>>,
}

/// Check the one-vector-per-text contract on a batch reply.
fn ensure_one_vector_per_text(
    expected: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, ServiceError> {
    if vectors.len() != expected {
        return Err(ServiceError::InvalidResponse(format!(
            "batch embedding returned {} vectors for {} texts",
            vectors.len(),
            expected
        )));
    }
    Ok(vectors)
}

/// HTTP client for the embedding service.
pub struct HttpEmbeddingService {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpEmbeddingService {
    /// Create a client against `base_url` with the default retry policy.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            retry: RetryPolicy::default(),
        })
    }

    /// Override the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn post_json<Req: Serialize, Reply: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        request: &Req,
    ) -> Result<Reply, ServiceError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let request = EmbedRequest { text };
        let reply: EmbedReply = with_retry(&self.retry, ServiceError::is_transient, || {
            self.post_json("/embedding", &request)
        })
        .await?;
        Ok(reply.embeddings)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let request = EmbedBatchRequest { texts };
        let reply: EmbedBatchReply = with_retry(&self.retry, ServiceError::is_transient, || {
            self.post_json("/embeddings", &request)
        })
        .await?;
        ensure_one_vector_per_text(texts.len(), reply.embeddings)
    }

    async fn check_health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_reply_count_mismatch_is_contract_violation() {
        let err = ensure_one_vector_per_text(3, vec![vec![0.1], vec![0.2]]).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidResponse(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_batch_reply_count_match_passes_through() {
        let vectors = vec![vec![0.1, 0.2], vec![0.3, 0.4]];
        let passed = ensure_one_vector_per_text(2, vectors.clone()).unwrap();
        assert_eq!(passed, vectors);
    }

    #[test]
    fn test_batch_request_wire_format() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let request = EmbedBatchRequest { texts: &texts };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["texts"], serde_json::json!(["a", "b"]));
    }
}
