// Semantic index over reference strings
// L2-normalised embeddings with inner-product top-k search and an
// exact-match fast path that skips the embedding service entirely.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::embedding::{l2_normalize, EmbeddingError, EmbeddingProvider};

#[derive(Debug, Clone)]
struct IndexEntry {
    text: String,
    folded: String,
    vector: Vec<f32>,
    /// Position in the original input slice (entries may be sparse when
    /// some embeddings failed)
    key: usize,
}

/// One nearest-neighbour hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub similarity: f64,
    /// Index into the original text slice the index was built from
    pub key: usize,
}

/// Inner-product nearest-neighbour store over normalised embeddings
#[derive(Debug, Clone, Default)]
pub struct SemanticIndex {
    entries: Vec<IndexEntry>,
}

impl SemanticIndex {
    /// Build an index over the given strings.
    ///
    /// Construction is partial by design: a failed embedding drops that
    /// entry with a warning and the rest of the index still serves.
    pub async fn build<P: EmbeddingProvider + ?Sized>(provider: &P, texts: &[String]) -> Self {
        let mut entries = Vec::with_capacity(texts.len());

        for (key, text) in texts.iter().enumerate() {
            match provider.embed(text).await {
                Ok(mut vector) => {
                    l2_normalize(&mut vector);
                    entries.push(IndexEntry {
                        folded: text.trim().to_lowercase(),
                        text: text.clone(),
                        vector,
                        key,
                    });
                }
                Err(e) => {
                    warn!(text, error = %e, "skipping entry, embedding failed");
                }
            }
        }

        Self { entries }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-folded exact match; similarity is exactly 1.0 and no embedding
    /// call is made.
    #[must_use]
    pub fn exact_match(&self, query: &str) -> Option<SearchHit> {
        let folded = query.trim().to_lowercase();
        self.entries
            .iter()
            .find(|e| e.folded == folded)
            .map(|e| SearchHit {
                text: e.text.clone(),
                similarity: 1.0,
                key: e.key,
            })
    }

    /// Top-k inner-product search.
    ///
    /// The exact fast path is consulted first; a hit short-circuits with
    /// similarity 1.0. An empty index returns an empty hit list.
    ///
    /// # Errors
    /// Propagates embedding failures for the query text.
    pub async fn search<P: EmbeddingProvider + ?Sized>(
        &self,
        provider: &P,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, EmbeddingError> {
        if let Some(hit) = self.exact_match(query) {
            return Ok(vec![hit]);
        }
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut query_vector = provider.embed(query).await?;
        l2_normalize(&mut query_vector);

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .map(|e| SearchHit {
                text: e.text.clone(),
                similarity: dot(&e.vector, &query_vector),
                key: e.key,
            })
            .collect();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(k);
        Ok(hits)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}
