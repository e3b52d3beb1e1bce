// Semantic matcher
// Six layers per bill item: prefilter, medical-core extraction, hard
// constraints, top-k retrieval, hybrid re-rank, calibrated decision with
// optional adjudication. Failures never escape as panics; an embedding
// outage degrades to a rejected item with the error carried through.

use std::collections::HashSet;

use tracing::{debug, warn};

use bill_core_models::{FailureReason, MatchDiagnostics, TieUpItem};

use crate::adjudicator::AdjudicatorRouter;
use crate::config::VerifierConfig;
use crate::embedding::EmbeddingProvider;
use crate::medical_core::{extract_medical_core, MedicalCore, MedicalItemType};
use crate::prefilter::{prefilter_item, PrefilterVerdict};
use crate::semantic_index::{SearchHit, SemanticIndex};

/// Calibrated decision for one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    AutoMatch,
    LlmVerify,
    Reject,
}

/// Full outcome of matching one bill item
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// The accepted reference item; `None` means no allowed amount applies
    pub matched_item: Option<TieUpItem>,
    /// Best candidate name, kept for diagnostics even on rejection
    pub matched_name: Option<String>,
    /// Semantic similarity of the best candidate
    pub similarity: Option<f64>,
    pub decision: MatchDecision,
    pub failure_reason: Option<FailureReason>,
    pub diagnostics: MatchDiagnostics,
    pub normalized_name: String,
    /// Set when an infrastructure failure forced the rejection
    pub error: Option<String>,
}

impl MatchOutcome {
    fn rejected(normalized_name: String, reason: Option<FailureReason>) -> Self {
        Self {
            matched_item: None,
            matched_name: None,
            similarity: None,
            decision: MatchDecision::Reject,
            failure_reason: reason,
            diagnostics: MatchDiagnostics {
                failure_reason: reason,
                ..MatchDiagnostics::default()
            },
            normalized_name,
            error: None,
        }
    }
}

/// Constraint flags accumulated while candidates are screened
#[derive(Debug, Default)]
struct ConstraintFlags {
    wrong_category: bool,
    dosage_mismatch: bool,
    form_mismatch: bool,
    modality_mismatch: bool,
    bodypart_mismatch: bool,
    category_conflict: bool,
    low_similarity: bool,
    package_only: bool,
}

impl ConstraintFlags {
    /// Resolve the highest-priority failure reason.
    fn resolve(&self, saw_candidates: bool) -> FailureReason {
        if self.package_only {
            FailureReason::PackageOnly
        } else if self.wrong_category {
            FailureReason::WrongCategory
        } else if self.dosage_mismatch {
            FailureReason::DosageMismatch
        } else if self.form_mismatch {
            FailureReason::FormMismatch
        } else if self.modality_mismatch {
            FailureReason::ModalityMismatch
        } else if self.bodypart_mismatch {
            FailureReason::BodypartMismatch
        } else if self.category_conflict {
            FailureReason::CategoryConflict
        } else if self.low_similarity || saw_candidates {
            FailureReason::LowSimilarity
        } else {
            FailureReason::NotInTieup
        }
    }
}

/// Category-boundary verdict for a pair of medical types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundaryVerdict {
    Allowed,
    /// Unconditionally rejected
    Hard,
    /// Allowed only above the given similarity
    Soft(u32),
}

/// Soft-boundary thresholds, stored as hundredths to stay `Eq`.
const SOFT_CONSUMABLE_DRUG: u32 = 90;
const SOFT_PROCEDURE_DIAGNOSTIC: u32 = 75;

fn category_boundary(a: MedicalItemType, b: MedicalItemType) -> BoundaryVerdict {
    use MedicalItemType as T;
    if a == b || a == T::Unknown || b == T::Unknown {
        return BoundaryVerdict::Allowed;
    }
    let pair = if (a as u8) <= (b as u8) { (a, b) } else { (b, a) };
    match pair {
        (T::Drug, T::Diagnostic)
        | (T::Drug, T::Procedure)
        | (T::Drug, T::Implant)
        | (T::Diagnostic, T::Implant) => BoundaryVerdict::Hard,
        (T::Drug, T::Consumable) => BoundaryVerdict::Soft(SOFT_CONSUMABLE_DRUG),
        (T::Procedure, T::Diagnostic) => BoundaryVerdict::Soft(SOFT_PROCEDURE_DIAGNOSTIC),
        _ => BoundaryVerdict::Allowed,
    }
}

/// Jaccard overlap of lowercase token sets.
fn token_overlap(a: &str, b: &str) -> f64 {
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Max of subset coverage in either direction.
fn containment(a: &str, b: &str) -> f64 {
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count() as f64;
    (intersection / set_a.len() as f64).max(intersection / set_b.len() as f64)
}

struct RankedCandidate {
    hit: SearchHit,
    hybrid: f64,
    breakdown: MatchDiagnostics,
}

/// The per-item matching pipeline
pub struct Matcher {
    config: VerifierConfig,
}

impl Matcher {
    #[must_use]
    pub const fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Match one bill item against a `(hospital, category)` item index.
    ///
    /// `items` must be the slice the index was built from; hit keys point
    /// into it.
    pub async fn match_item<P: EmbeddingProvider + ?Sized>(
        &self,
        provider: &P,
        router: &AdjudicatorRouter,
        index: &SemanticIndex,
        items: &[TieUpItem],
        category: &str,
        bill_item: &str,
    ) -> MatchOutcome {
        let bill_core = extract_medical_core(bill_item);
        let normalized_name = bill_core.core_text.clone();

        // Layer 0: prefilter
        let mut flags = ConstraintFlags::default();
        match prefilter_item(bill_item) {
            PrefilterVerdict::Artifact(reason) => {
                return MatchOutcome::rejected(normalized_name, Some(reason));
            }
            PrefilterVerdict::AdminCharge => {
                return MatchOutcome::rejected(normalized_name, Some(FailureReason::AdminCharge));
            }
            PrefilterVerdict::PackageOnly => flags.package_only = true,
            PrefilterVerdict::Pass => {}
        }

        if index.is_empty() {
            debug!(bill_item, "empty item index, nothing to match");
            return MatchOutcome::rejected(normalized_name, Some(FailureReason::NotInTieup));
        }

        // Layer 3: exact fast path then semantic top-k
        let hits = match index.search(provider, bill_item, self.config.top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(bill_item, error = %e, "embedding failure, rejecting item");
                let mut outcome =
                    MatchOutcome::rejected(normalized_name, Some(FailureReason::LowSimilarity));
                outcome.error = Some(e.to_string());
                return outcome;
            }
        };
        if hits.is_empty() {
            return MatchOutcome::rejected(normalized_name, Some(FailureReason::NotInTieup));
        }

        // Layers 2+4: constraints then hybrid re-rank
        let survivors = self.screen_and_rank(&bill_core, &hits, category, &mut flags);

        let Some(best) = survivors.into_iter().next() else {
            let reason = flags.resolve(true);
            let mut outcome = MatchOutcome::rejected(normalized_name, Some(reason));
            // Keep the nearest candidate visible for diagnostics
            outcome.matched_name = hits.first().map(|h| h.text.clone());
            outcome.similarity = hits.first().map(|h| h.similarity);
            return outcome;
        };

        // Layer 5: calibrated decision
        let thresholds = self.config.thresholds_for(category);
        let semantic = best.hit.similarity;

        if best.hybrid >= thresholds.hybrid_auto_match {
            return Self::accepted(
                items,
                &best,
                MatchDecision::AutoMatch,
                normalized_name,
                None,
            );
        }

        if best.hybrid >= thresholds.llm_verify {
            let adjudication = router
                .match_with_llm(bill_item, &best.hit.text, semantic)
                .await;
            if adjudication.matched {
                return Self::accepted(
                    items,
                    &best,
                    MatchDecision::LlmVerify,
                    normalized_name,
                    Some(adjudication.model_used),
                );
            }
            let mut outcome = MatchOutcome::rejected(
                normalized_name,
                Some(flags.resolve(true)),
            );
            outcome.matched_name = Some(best.hit.text.clone());
            outcome.similarity = Some(semantic);
            outcome.diagnostics = best.breakdown;
            outcome.diagnostics.adjudicator_model = Some(adjudication.model_used);
            outcome.diagnostics.failure_reason = outcome.failure_reason;
            outcome.error = adjudication.error;
            return outcome;
        }

        flags.low_similarity = true;
        let mut outcome = MatchOutcome::rejected(normalized_name, Some(flags.resolve(true)));
        outcome.matched_name = Some(best.hit.text.clone());
        outcome.similarity = Some(semantic);
        outcome.diagnostics = best.breakdown;
        outcome.diagnostics.failure_reason = outcome.failure_reason;
        outcome
    }

    fn accepted(
        items: &[TieUpItem],
        best: &RankedCandidate,
        decision: MatchDecision,
        normalized_name: String,
        adjudicator_model: Option<String>,
    ) -> MatchOutcome {
        let mut diagnostics = best.breakdown.clone();
        diagnostics.adjudicator_model = adjudicator_model;
        MatchOutcome {
            matched_item: items.get(best.hit.key).cloned(),
            matched_name: Some(best.hit.text.clone()),
            similarity: Some(best.hit.similarity),
            decision,
            failure_reason: None,
            diagnostics,
            normalized_name,
            error: None,
        }
    }

    /// Apply hard constraints to each hit, then rank survivors by the
    /// hybrid blend, best first. The similarity floor honours the same
    /// per-category overrides as the decision thresholds.
    fn screen_and_rank(
        &self,
        bill_core: &MedicalCore,
        hits: &[SearchHit],
        category: &str,
        flags: &mut ConstraintFlags,
    ) -> Vec<RankedCandidate> {
        let weights = self.config.hybrid_weights;
        let min_similarity = self.config.thresholds_for(category).min_similarity;
        let mut survivors = Vec::new();

        for hit in hits {
            if hit.similarity < min_similarity {
                flags.low_similarity = true;
                continue;
            }

            let candidate_core = extract_medical_core(&hit.text);

            match category_boundary(bill_core.item_type, candidate_core.item_type) {
                BoundaryVerdict::Hard => {
                    flags.wrong_category = true;
                    continue;
                }
                BoundaryVerdict::Soft(threshold_hundredths) => {
                    if hit.similarity < f64::from(threshold_hundredths) / 100.0 {
                        flags.category_conflict = true;
                        continue;
                    }
                }
                BoundaryVerdict::Allowed => {}
            }

            if bill_core.dosage_conflicts_with(&candidate_core) {
                flags.dosage_mismatch = true;
                continue;
            }
            if bill_core.form_conflicts_with(&candidate_core) {
                flags.form_mismatch = true;
                continue;
            }
            if bill_core.modality_conflicts_with(&candidate_core) {
                flags.modality_mismatch = true;
                continue;
            }
            if bill_core.body_part_conflicts_with(&candidate_core) {
                flags.bodypart_mismatch = true;
                continue;
            }

            let overlap = token_overlap(&bill_core.core_text, &candidate_core.core_text);
            let contain = containment(&bill_core.core_text, &candidate_core.core_text);
            let bonus = if bill_core.metadata_matches(&candidate_core) {
                weights.metadata_bonus
            } else {
                0.0
            };
            let hybrid = (weights.semantic * hit.similarity
                + weights.token_overlap * overlap
                + weights.containment * contain
                + bonus)
                .min(1.0);

            survivors.push(RankedCandidate {
                breakdown: MatchDiagnostics {
                    semantic_similarity: hit.similarity,
                    token_overlap: overlap,
                    containment: contain,
                    metadata_bonus: bonus,
                    hybrid_score: hybrid,
                    failure_reason: None,
                    adjudicator_model: None,
                },
                hit: hit.clone(),
                hybrid,
            });
        }

        survivors.sort_by(|a, b| b.hybrid.total_cmp(&a.hybrid));
        survivors
    }
}
