//! Verification report types
//!
//! The financial semantics here are deliberate: `allowed_amount` is a policy
//! ceiling, never money spent. An item's bill amount always equals the sum
//! of its three contribution buckets unless the item is excluded outright.

use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, ModelResult};

/// Verification status for a single bill item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    /// Within the policy limit
    Green,
    /// Over the policy limit
    Red,
    /// No policy match; needs manual review. Accepts the legacy
    /// `MISMATCH` wire name.
    #[serde(alias = "MISMATCH")]
    Unclassified,
    /// Legitimate charge with no comparable reference (admin fees)
    AllowedNotComparable,
    /// OCR artifact; excluded from all totals
    IgnoredArtifact,
}

impl VerificationStatus {
    /// Excluded statuses contribute nothing to any financial bucket.
    #[must_use]
    pub const fn is_excluded(self) -> bool {
        matches!(self, Self::AllowedNotComparable | Self::IgnoredArtifact)
    }

    /// Priority used when resolving a status for a grouped display row.
    #[must_use]
    pub const fn group_priority(self) -> u8 {
        match self {
            Self::Red => 0,
            Self::Unclassified => 1,
            Self::Green => 2,
            Self::AllowedNotComparable => 3,
            Self::IgnoredArtifact => 4,
        }
    }
}

/// Why an item failed to match a reference, by priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    AdminCharge,
    PackageOnly,
    WrongCategory,
    DosageMismatch,
    FormMismatch,
    ModalityMismatch,
    BodypartMismatch,
    CategoryConflict,
    LowSimilarity,
    NotInTieup,
}

/// Hybrid score breakdown retained for diagnostics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchDiagnostics {
    pub semantic_similarity: f64,
    pub token_overlap: f64,
    pub containment: f64,
    pub metadata_bonus: f64,
    pub hybrid_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
    /// Adjudicator model consulted, when any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjudicator_model: Option<String>,
}

/// Verification outcome for a single bill item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemVerificationResult {
    pub bill_item: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_item: Option<String>,
    pub status: VerificationStatus,
    pub bill_amount: f64,
    pub allowed_amount: f64,
    pub extra_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<MatchDiagnostics>,
}

/// How a single item contributes to the report's financial totals.
///
/// Invariant for non-excluded items:
/// `bill = allowed_contribution + extra_contribution + unclassified_contribution`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialContribution {
    pub bill_amount: f64,
    /// Policy ceiling, for reference only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_limit: Option<f64>,
    pub allowed_contribution: f64,
    pub extra_contribution: f64,
    pub unclassified_contribution: f64,
    pub is_excluded: bool,
}

impl FinancialContribution {
    const TOLERANCE: f64 = 0.01;

    /// Check the contribution invariant.
    pub fn validate(&self) -> ModelResult<()> {
        if self.is_excluded {
            if self.allowed_contribution != 0.0
                || self.extra_contribution != 0.0
                || self.unclassified_contribution != 0.0
            {
                return Err(ModelError::InvariantViolation(format!(
                    "excluded item has non-zero contributions: ({}, {}, {})",
                    self.allowed_contribution, self.extra_contribution, self.unclassified_contribution
                )));
            }
            return Ok(());
        }

        let total =
            self.allowed_contribution + self.extra_contribution + self.unclassified_contribution;
        let diff = (self.bill_amount - total).abs();
        if diff >= Self::TOLERANCE {
            return Err(ModelError::InvariantViolation(format!(
                "contribution imbalance: bill={:.2}, allowed={:.2}, extra={:.2}, unclassified={:.2}",
                self.bill_amount,
                self.allowed_contribution,
                self.extra_contribution,
                self.unclassified_contribution
            )));
        }
        if self.allowed_contribution > self.bill_amount + Self::TOLERANCE {
            return Err(ModelError::InvariantViolation(format!(
                "allowed contribution {:.2} exceeds bill {:.2}",
                self.allowed_contribution, self.bill_amount
            )));
        }
        if let Some(limit) = self.allowed_limit {
            if self.allowed_contribution > limit + Self::TOLERANCE {
                return Err(ModelError::InvariantViolation(format!(
                    "allowed contribution {:.2} exceeds limit {limit:.2}",
                    self.allowed_contribution
                )));
            }
        }
        Ok(())
    }
}

/// Per-status item counts on the report
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VerificationCounts {
    pub green: u32,
    pub red: u32,
    pub unclassified: u32,
    /// Legacy alias for `unclassified`, kept on the wire
    pub mismatch: u32,
    pub ignored: u32,
    pub allowed_not_comparable: u32,
}

impl VerificationCounts {
    pub fn record(&mut self, status: VerificationStatus) {
        match status {
            VerificationStatus::Green => self.green += 1,
            VerificationStatus::Red => self.red += 1,
            VerificationStatus::Unclassified => {
                self.unclassified += 1;
                self.mismatch += 1;
            }
            VerificationStatus::AllowedNotComparable => self.allowed_not_comparable += 1,
            VerificationStatus::IgnoredArtifact => self.ignored += 1,
        }
    }

    /// Total items counted, every item exactly once.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.green + self.red + self.unclassified + self.ignored + self.allowed_not_comparable
    }
}

/// Verification outcome for one bill category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryVerificationResult {
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_similarity: Option<f64>,
    pub items: Vec<ItemVerificationResult>,
}

/// Full verification report for one bill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub hospital: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_hospital: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_similarity: Option<f64>,
    pub results: Vec<CategoryVerificationResult>,
    pub total_bill_amount: f64,
    pub total_allowed_amount: f64,
    pub total_extra_amount: f64,
    pub total_unclassified_amount: f64,
    pub total_allowed_not_comparable: f64,
    pub counts: VerificationCounts,
    pub financials_balanced: bool,
}

impl VerificationReport {
    /// All item results across categories.
    pub fn all_items(&self) -> impl Iterator<Item = &ItemVerificationResult> {
        self.results.iter().flat_map(|c| c.items.iter())
    }
}
