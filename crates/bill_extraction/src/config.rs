// Extraction configuration
// Tunables applied across the three parsing stages

use serde::{Deserialize, Serialize};

/// Configuration for the bill extraction pipeline.
///
/// Amount caps are not configurable; they live as constants next to the
/// numeric guards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Tolerance when comparing a printed amount against qty × rate
    pub amount_tolerance: f64,

    /// Vertical distance within which lines are clustered into one row block
    pub y_cluster_threshold: f32,

    /// Keep detected payment events on the document for diagnostics
    pub retain_payments: bool,

    /// Length of the raw OCR excerpt stored on the document (0 = none)
    pub raw_excerpt_len: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            amount_tolerance: 0.02,
            y_cluster_threshold: 18.0,
            retain_payments: true,
            raw_excerpt_len: 2000,
        }
    }
}
