//! Chunking service client.
//!
//! One call per field value: the full text goes out with the configured
//! chunk length and overlap, an ordered list of chunk strings comes back.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::ServiceError;
use crate::retry::{with_retry, RetryPolicy};

/// Splits a text field into ordered chunks.
#[async_trait]
pub trait ChunkingService: Send + Sync {
    /// Chunk `text` with the given length and overlap. Chunk order in the
    /// reply is the order of the text.
    async fn chunk(
        &self,
        text: &str,
        chunk_length: u32,
        chunk_overlap: u32,
    ) -> Result<Vec<String>, ServiceError>;

    /// Whether the service currently answers its health endpoint.
    async fn check_health(&self) -> bool;
}

#[derive(Serialize)]
struct ChunkRequest<'a> {
    text: &'a str,
    options: ChunkOptions,
}

#[derive(Serialize)]
struct ChunkOptions {
    length: u32,
    overlap: u32,
}

#[derive(Deserialize)]
struct ChunkReply {
    chunks: Vec<String>,
}

/// HTTP client for the chunking service.
pub struct HttpChunkingService {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpChunkingService {
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

    async fn request_chunks(&self, request: &ChunkRequest<'_>) -> Result<Vec<String>, ServiceError> {
        let url = format!("{}/chunk", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status { status, body });
        }

        let reply: ChunkReply = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
        Ok(reply.chunks)
    }
}

#[async_trait]
impl ChunkingService for HttpChunkingService {
    async fn chunk(
        &self,
        text: &str,
        chunk_length: u32,
        chunk_overlap: u32,
    ) -> Result<Vec<String>, ServiceError> {
        let request = ChunkRequest {
            text,
            options: ChunkOptions {
                length: chunk_length,
                overlap: chunk_overlap,
            },
        };
        let chunks = with_retry(&self.retry, ServiceError::is_transient, || {
            self.request_chunks(&request)
        })
        .await?;
        debug!(chunks = chunks.len(), "Chunking service returned");
        Ok(chunks)
    }

    async fn check_health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
