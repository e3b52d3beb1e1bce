// Embedding provider abstraction
// The embedding service is the only network dependency of the matcher;
// every call is bounded by a timeout and failures stay item-local.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Embedding errors
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("Embedding service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Embedding request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Source of dense text embeddings
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text into a fixed-dimension vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// The vector dimension this provider produces.
    fn dimension(&self) -> usize;
}

/// L2-normalise a vector in place; zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// HTTP client for an external embedding service
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    endpoint: String,
    dimension: usize,
}

impl HttpEmbeddingClient {
    /// Build a client with a per-request timeout.
    ///
    /// # Errors
    /// `ServiceUnavailable` when the underlying HTTP client cannot be built.
    pub fn new(endpoint: &str, dimension: usize, timeout: Duration) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::ServiceUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest { input: text })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::ServiceUnavailable(format!("timeout: {e}"))
                } else {
                    EmbeddingError::RequestFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(EmbeddingError::RequestFailed(format!(
                "status {}",
                response.status()
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        if body.embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                got: body.embedding.len(),
            });
        }
        Ok(body.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Shared embedding cache with single-flight per missing key.
///
/// Concurrent queries for the same string trigger exactly one upstream
/// call; failed lookups leave the slot empty so a later query can retry.
pub struct CachedEmbedder<P: EmbeddingProvider> {
    inner: Arc<P>,
    cells: Mutex<HashMap<String, Arc<tokio::sync::OnceCell<Vec<f32>>>>>,
}

impl<P: EmbeddingProvider> CachedEmbedder<P> {
    pub fn new(inner: Arc<P>) -> Self {
        Self {
            inner,
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached vectors.
    ///
    /// # Panics
    /// Panics only if the cache lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        let cells = self.cells.lock().expect("embedding cache lock poisoned");
        cells.values().filter(|c| c.get().is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cell_for(&self, text: &str) -> Arc<tokio::sync::OnceCell<Vec<f32>>> {
        let mut cells = self.cells.lock().expect("embedding cache lock poisoned");
        cells.entry(text.to_string()).or_default().clone()
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for CachedEmbedder<P> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let cell = self.cell_for(text);
        let vector = cell
            .get_or_try_init(|| async {
                debug!(text, "embedding cache miss");
                self.inner.embed(text).await
            })
            .await?;
        Ok(vector.clone())
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}
