//! Embedding service health and dimensionality discovery.
//!
//! Vector fields cannot be created without knowing the embedding
//! dimensionality, and the dimensionality is only discoverable at runtime
//! by asking the service for a probe vector. When the first probe fails,
//! a background task keeps retrying on a fixed timer and maintains an
//! availability flag for health reporting. The task's lifetime is tied to
//! the [`HealthProbe`] handle; dropping the handle stops the task.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::embedder::EmbeddingService;
use crate::error::ServiceError;

/// Fixed text sent on every dimensionality probe.
pub const DIMENSIONALITY_PROBE_TEXT: &str = "Dummy";

/// Issue one probe embedding call and return the vector length.
pub async fn probe_dimensionality(
    embedder: &dyn EmbeddingService,
) -> Result<usize, ServiceError> {
    let vector = embedder.embed(DIMENSIONALITY_PROBE_TEXT).await?;
    if vector.is_empty() {
        return Err(ServiceError::InvalidResponse(
            "dimensionality probe returned an empty vector".to_string(),
        ));
    }
    Ok(vector.len())
}

/// Thread-safe view of embedding availability and discovered
/// dimensionality. Shared between the background probe (writer) and
/// validation/health reporting (readers).
#[derive(Debug, Default)]
pub struct EmbeddingHealth {
    available: AtomicBool,
    // 0 = not yet discovered
    dimensionality: AtomicUsize,
}

impl EmbeddingHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the embedding service answered its last probe.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// The discovered embedding dimensionality, if any probe has succeeded.
    pub fn dimensionality(&self) -> Option<usize> {
        match self.dimensionality.load(Ordering::SeqCst) {
            0 => None,
            d => Some(d),
        }
    }

    /// Record a successful probe.
    pub fn record_available(&self, dimensionality: usize) {
        self.dimensionality.store(dimensionality, Ordering::SeqCst);
        self.available.store(true, Ordering::SeqCst);
    }

    /// Record a failed probe. The discovered dimensionality, if any, is
    /// kept; only availability flips.
    pub fn record_unavailable(&self) {
        self.available.store(false, Ordering::SeqCst);
    }
}

/// Timing for the background probe.
#[derive(Debug, Clone)]
pub struct HealthProbeConfig {
    /// Delay before the first background probe
    pub initial_delay: Duration,
    /// Fixed interval between probes
    pub interval: Duration,
}

impl Default for HealthProbeConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(200),
            interval: Duration::from_secs(20),
        }
    }
}

/// Handle to the background probe task. Cancelling (or dropping) the
/// handle stops the task.
pub struct HealthProbe {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl HealthProbe {
    /// Spawn the background probe on the current runtime.
    pub fn spawn(
        embedder: Arc<dyn EmbeddingService>,
        health: Arc<EmbeddingHealth>,
        config: HealthProbeConfig,
    ) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => return,
                _ = tokio::time::sleep(config.initial_delay) => {}
            }
            loop {
                probe_once(embedder.as_ref(), &health).await;
                tokio::select! {
                    _ = task_token.cancelled() => return,
                    _ = tokio::time::sleep(config.interval) => {}
                }
            }
        });
        Self { token, handle }
    }

    /// Stop the background task.
    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

impl Drop for HealthProbe {
    fn drop(&mut self) {
        self.token.cancel();
        self.handle.abort();
    }
}

async fn probe_once(embedder: &dyn EmbeddingService, health: &EmbeddingHealth) {
    if !embedder.check_health().await {
        health.record_unavailable();
        error!("Embedding service is not available");
        return;
    }
    match health.dimensionality() {
        Some(dimensionality) => {
            health.record_available(dimensionality);
            debug!(dimensionality, "Embedding service healthy");
        }
        None => match probe_dimensionality(embedder).await {
            Ok(dimensionality) => {
                info!(dimensionality, "Discovered embedding dimensionality");
                health.record_available(dimensionality);
            }
            Err(e) => {
                health.record_unavailable();
                error!(error = %e, "Embedding dimensionality probe failed");
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    struct FlakyEmbedder {
        failures_before_success: u32,
        calls: AtomicU32,
        dimensionality: usize,
    }

    #[async_trait]
    impl EmbeddingService for FlakyEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(ServiceError::Transport("connection refused".to_string()))
            } else {
                Ok(vec![0.0; self.dimensionality])
            }
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
            Ok(texts.iter().map(|_| vec![0.0; self.dimensionality]).collect())
        }

        async fn check_health(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_probe_dimensionality() {
        let embedder = FlakyEmbedder {
            failures_before_success: 0,
            calls: AtomicU32::new(0),
            dimensionality: 384,
        };
        assert_eq!(probe_dimensionality(&embedder).await.unwrap(), 384);
    }

    #[tokio::test]
    async fn test_health_starts_unknown() {
        let health = EmbeddingHealth::new();
        assert!(!health.is_available());
        assert!(health.dimensionality().is_none());
    }

    #[tokio::test]
    async fn test_record_unavailable_keeps_dimensionality() {
        let health = EmbeddingHealth::new();
        health.record_available(768);
        health.record_unavailable();

        assert!(!health.is_available());
        assert_eq!(health.dimensionality(), Some(768));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_probe_recovers_dimensionality() {
        let embedder = Arc::new(FlakyEmbedder {
            failures_before_success: 2,
            calls: AtomicU32::new(0),
            dimensionality: 384,
        });
        let health = Arc::new(EmbeddingHealth::new());
        let probe = HealthProbe::spawn(
            embedder,
            health.clone(),
            HealthProbeConfig {
                initial_delay: Duration::from_secs(1),
                interval: Duration::from_secs(1),
            },
        );

        // Two failing probes, then success on the third
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(health.is_available());
        assert_eq!(health.dimensionality(), Some(384));
        probe.shutdown();
    }
}
