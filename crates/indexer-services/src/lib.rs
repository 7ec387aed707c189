//! Clients for the external chunking and embedding services.
//!
//! Both services are consumed as black boxes over HTTP JSON. Transient
//! transport failures are retried with bounded exponential backoff via
//! [`with_retry`]; anything that survives the retries propagates to the
//! caller, which records it as a per-document failure instead of aborting
//! the crawl.
//!
//! [`EmbeddingHealth`] and [`HealthProbe`] track embedding-service
//! availability and the runtime-discovered vector dimensionality on a
//! fixed timer, with a lifecycle owned by whoever spawns the probe.

pub mod chunker;
pub mod embedder;
pub mod error;
pub mod health;
pub mod retry;

pub use chunker::{ChunkingService, HttpChunkingService};
pub use embedder::{EmbeddingService, HttpEmbeddingService};
pub use error::ServiceError;
pub use health::{
    probe_dimensionality, EmbeddingHealth, HealthProbe, HealthProbeConfig,
    DIMENSIONALITY_PROBE_TEXT,
};
pub use retry::{with_retry, RetryPolicy};
