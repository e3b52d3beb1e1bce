// Verifier configuration
// Every matching threshold is explicit here; per-category overrides are
// layered over the unified defaults.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Calibration thresholds for one category (or the unified defaults)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CategoryThresholds {
    /// Composite score at or above which a match is accepted outright
    pub hybrid_auto_match: f64,
    /// Composite score at or above which the adjudicator is consulted
    pub llm_verify: f64,
    /// Floor below which candidates are rejected without adjudication
    pub min_similarity: f64,
}

impl Default for CategoryThresholds {
    fn default() -> Self {
        Self {
            hybrid_auto_match: 0.60,
            llm_verify: 0.55,
            min_similarity: 0.50,
        }
    }
}

/// Weights for the hybrid re-rank blend
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HybridWeights {
    pub semantic: f64,
    pub token_overlap: f64,
    pub containment: f64,
    /// Bonus applied when dosage/form/modality/body-part match exactly
    pub metadata_bonus: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            semantic: 0.5,
            token_overlap: 0.3,
            containment: 0.2,
            metadata_bonus: 0.05,
        }
    }
}

/// Configuration for the verification pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Category match threshold for a confident assignment
    pub category_similarity_threshold: f64,
    /// Soft floor: item matching continues below this, but the category
    /// assignment is recorded as weak
    pub category_soft_threshold: f64,
    /// Similarity above which the adjudicator is bypassed entirely
    pub item_similarity_threshold: f64,
    /// Unified calibration defaults
    pub thresholds: CategoryThresholds,
    /// Per-category calibration overrides, keyed by category name
    #[serde(default)]
    pub category_overrides: HashMap<String, CategoryThresholds>,
    /// Hybrid re-rank blend weights
    pub hybrid_weights: HybridWeights,
    /// Candidates retrieved per item from the semantic index
    pub top_k: usize,
    /// Embedding vector dimension
    pub embedding_dim: usize,
    /// Timeout for each embedding call
    #[serde(with = "duration_secs")]
    pub embedding_timeout: Duration,
    /// Timeout for each adjudicator call
    #[serde(with = "duration_secs")]
    pub adjudicator_timeout: Duration,
    /// Optional adjudicator endpoint; absent means borderline matches reject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjudicator_endpoint: Option<String>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            category_similarity_threshold: 0.70,
            category_soft_threshold: 0.50,
            item_similarity_threshold: 0.85,
            thresholds: CategoryThresholds::default(),
            category_overrides: HashMap::new(),
            hybrid_weights: HybridWeights::default(),
            top_k: 5,
            embedding_dim: 384,
            embedding_timeout: Duration::from_secs(10),
            adjudicator_timeout: Duration::from_secs(30),
            adjudicator_endpoint: None,
        }
    }
}

impl VerifierConfig {
    /// Thresholds for a category, falling back to the unified defaults.
    #[must_use]
    pub fn thresholds_for(&self, category: &str) -> CategoryThresholds {
        self.category_overrides
            .get(category)
            .copied()
            .unwrap_or(self.thresholds)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
