// Deterministic test doubles for the verification pipeline
// A hashed bag-of-words embedder gives stable, offline vectors whose
// cosine similarity tracks token overlap closely enough for tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::embedding::{EmbeddingError, EmbeddingProvider};

/// Offline embedding provider hashing lowercase tokens into buckets
pub struct HashedBagEmbedder {
    dimension: usize,
    /// Queries containing this marker fail, for failure-path tests
    fail_marker: Option<String>,
}

impl HashedBagEmbedder {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail_marker: None,
        }
    }

    /// Fail any embed whose text contains `marker`.
    #[must_use]
    pub fn failing_on(dimension: usize, marker: &str) -> Self {
        Self {
            dimension,
            fail_marker: Some(marker.to_string()),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HashedBagEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker) {
                return Err(EmbeddingError::ServiceUnavailable(format!(
                    "test failure on marker {marker:?}"
                )));
            }
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dimension;
            vector[bucket] += 1.0;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
