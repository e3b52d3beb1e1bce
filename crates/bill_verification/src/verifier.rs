// Verification orchestrator
// Bill → hospital match → per-category narrowing → per-item matching and
// price checking → aggregation through the financial-contribution source
// of truth. Completeness and counter reconciliation are checked at the end
// and logged, never raised.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use bill_core_models::{
    round2, BillInput, BillInputItem, CategoryVerificationResult, ItemVerificationResult,
    VerificationCounts, VerificationReport, VerificationStatus,
};

use crate::adjudicator::{Adjudicator, AdjudicatorError, AdjudicatorRouter, HttpAdjudicator};
use crate::config::VerifierConfig;
use crate::embedding::EmbeddingProvider;
use crate::financial::calculate_financial_contribution;
use crate::matcher::Matcher;
use crate::prefilter::{prefilter_item, PrefilterVerdict};
use crate::price_checker::check_price;
use crate::rate_sheets::RateSheetCatalog;
use crate::renderer::{validate_completeness, validate_summary_counters};
use crate::semantic_index::SemanticIndex;

/// Bill categories with no meaningful reference counterpart; item matching
/// still runs, category-level matching is skipped.
const PSEUDO_CATEGORIES: [&str; 2] = ["other", "administrative"];

/// Verification errors
#[derive(Debug, Error)]
pub enum VerificationError {
    /// The bill input cannot be verified at all
    #[error("Invalid bill input: {0}")]
    InvalidInput(String),
}

/// The verification pipeline for whole bills
pub struct Verifier {
    matcher: Matcher,
    router: AdjudicatorRouter,
}

impl Verifier {
    /// Build a verifier; the adjudicator is optional and borderline
    /// matches reject without one.
    #[must_use]
    pub fn new(config: VerifierConfig, adjudicator: Option<Arc<dyn Adjudicator>>) -> Self {
        let router = AdjudicatorRouter::new(
            config.item_similarity_threshold,
            config.thresholds.min_similarity,
            adjudicator,
        );
        Self {
            matcher: Matcher::new(config),
            router,
        }
    }

    /// Build a verifier wired from configuration alone; a configured
    /// adjudicator endpoint turns on HTTP adjudication.
    ///
    /// # Errors
    /// Propagates HTTP client construction failures.
    pub fn from_config(config: VerifierConfig) -> Result<Self, AdjudicatorError> {
        let adjudicator: Option<Arc<dyn Adjudicator>> = match &config.adjudicator_endpoint {
            Some(endpoint) => Some(Arc::new(HttpAdjudicator::new(
                endpoint,
                config.adjudicator_timeout,
            )?)),
            None => None,
        };
        Ok(Self::new(config, adjudicator))
    }

    /// Verify one bill against the current rate-sheet catalog.
    ///
    /// # Errors
    /// `InvalidInput` when the bill carries no categories at all.
    pub async fn verify<P: EmbeddingProvider + ?Sized>(
        &self,
        provider: &P,
        catalog: &RateSheetCatalog,
        bill: &BillInput,
    ) -> Result<VerificationReport, VerificationError> {
        if bill.categories.is_empty() {
            return Err(VerificationError::InvalidInput(
                "bill has no categories".to_string(),
            ));
        }

        let config = self.matcher.config();

        // 1. Hospital match: best similarity, no threshold, always recorded
        let hospital_hit = match catalog
            .hospital_index
            .search(provider, &bill.hospital_name, 1)
            .await
        {
            Ok(hits) => hits.into_iter().next(),
            Err(e) => {
                warn!(error = %e, "hospital matching failed, continuing without a sheet");
                None
            }
        };
        let matched_hospital = hospital_hit.as_ref().map(|h| h.text.clone());
        let hospital_similarity = hospital_hit.as_ref().map(|h| h.similarity);

        let empty_index = SemanticIndex::default();
        let mut results = Vec::with_capacity(bill.categories.len());
        // Match outcomes are cached per bill: repeated lines of the same
        // item skip re-matching, only the price check reruns
        let mut match_cache: HashMap<(String, String), crate::matcher::MatchOutcome> =
            HashMap::new();

        for category in &bill.categories {
            let is_pseudo = PSEUDO_CATEGORIES.contains(&category.category_name.as_str());

            // 2. Category match narrows the item index; a weak match still
            // proceeds to item-level matching
            let (matched_category, category_similarity) = if is_pseudo {
                (None, None)
            } else if let Some(hospital) = &matched_hospital {
                match catalog.category_indexes.get(hospital) {
                    Some(index) => {
                        match index.search(provider, &category.category_name, 1).await {
                            Ok(hits) => {
                                let best = hits.into_iter().next();
                                let similarity = best.as_ref().map(|h| h.similarity);
                                let name = best.and_then(|h| {
                                    (h.similarity >= config.category_soft_threshold)
                                        .then_some(h.text)
                                });
                                (name, similarity)
                            }
                            Err(e) => {
                                warn!(category = %category.category_name, error = %e, "category matching failed");
                                (None, None)
                            }
                        }
                    }
                    None => (None, None),
                }
            } else {
                (None, None)
            };

            let item_index = matched_hospital
                .as_ref()
                .zip(matched_category.as_ref())
                .and_then(|(hospital, cat)| {
                    catalog
                        .item_indexes
                        .get(&(hospital.clone(), cat.clone()))
                })
                .unwrap_or(&empty_index);
            let reference_items = matched_hospital
                .as_ref()
                .and_then(|h| catalog.sheet_by_name(h))
                .zip(matched_category.as_ref())
                .and_then(|(sheet, cat)| {
                    sheet
                        .categories
                        .iter()
                        .find(|c| &c.category_name == cat)
                        .map(|c| c.items.as_slice())
                })
                .unwrap_or(&[]);

            // 3. Per-item verification
            let mut items = Vec::with_capacity(category.items.len());
            for item in &category.items {
                items.push(
                    self.verify_item(
                        provider,
                        item,
                        item_index,
                        reference_items,
                        &category.category_name,
                        &mut match_cache,
                    )
                    .await,
                );
            }

            results.push(CategoryVerificationResult {
                category: category.category_name.clone(),
                matched_category,
                category_similarity,
                items,
            });
        }

        let report = Self::aggregate(bill, matched_hospital, hospital_similarity, results);

        // 5. Post-conditions: logged, never raised
        if let Err(msg) = validate_completeness(bill, &report) {
            warn!("completeness check failed: {msg}");
        }
        if let Err(msg) = validate_summary_counters(&report) {
            warn!("counter reconciliation failed: {msg}");
        }

        info!(
            hospital = %report.hospital,
            items = report.counts.total(),
            total_bill = report.total_bill_amount,
            balanced = report.financials_balanced,
            "bill verified"
        );
        Ok(report)
    }

    async fn verify_item<P: EmbeddingProvider + ?Sized>(
        &self,
        provider: &P,
        item: &BillInputItem,
        index: &SemanticIndex,
        reference_items: &[bill_core_models::TieUpItem],
        category_name: &str,
        match_cache: &mut HashMap<(String, String), crate::matcher::MatchOutcome>,
    ) -> ItemVerificationResult {
        // Administrative charges and artefacts never reach the matcher
        match prefilter_item(&item.item_name) {
            PrefilterVerdict::AdminCharge => {
                return Self::excluded_result(item, VerificationStatus::AllowedNotComparable);
            }
            PrefilterVerdict::Artifact(_) => {
                return Self::excluded_result(item, VerificationStatus::IgnoredArtifact);
            }
            _ => {}
        }

        let cache_key = (category_name.to_string(), item.item_name.trim().to_lowercase());
        let outcome = if let Some(cached) = match_cache.get(&cache_key) {
            debug!(item = %item.item_name, "match cache hit");
            cached.clone()
        } else {
            let outcome = self
                .matcher
                .match_item(
                    provider,
                    &self.router,
                    index,
                    reference_items,
                    category_name,
                    &item.item_name,
                )
                .await;
            match_cache.insert(cache_key, outcome.clone());
            outcome
        };

        let price = check_price(item.amount, outcome.matched_item.as_ref(), item.quantity);

        let mut diagnostics = outcome.diagnostics;
        diagnostics.failure_reason = outcome.failure_reason;

        ItemVerificationResult {
            bill_item: item.item_name.clone(),
            matched_item: outcome.matched_name,
            status: price.status,
            bill_amount: price.bill_amount,
            allowed_amount: price.allowed_amount,
            extra_amount: price.extra_amount,
            similarity: outcome.similarity,
            normalized_name: Some(outcome.normalized_name),
            diagnostics: Some(diagnostics),
        }
    }

    fn excluded_result(item: &BillInputItem, status: VerificationStatus) -> ItemVerificationResult {
        ItemVerificationResult {
            bill_item: item.item_name.clone(),
            matched_item: None,
            status,
            bill_amount: round2(item.amount),
            allowed_amount: 0.0,
            extra_amount: 0.0,
            similarity: None,
            normalized_name: None,
            diagnostics: None,
        }
    }

    /// 4. Aggregate counts and totals through the single financial source
    /// of truth.
    fn aggregate(
        bill: &BillInput,
        matched_hospital: Option<String>,
        hospital_similarity: Option<f64>,
        results: Vec<CategoryVerificationResult>,
    ) -> VerificationReport {
        let mut counts = VerificationCounts::default();
        let mut total_bill = 0.0;
        let mut total_allowed = 0.0;
        let mut total_extra = 0.0;
        let mut total_unclassified = 0.0;
        let mut total_not_comparable = 0.0;

        for item in results.iter().flat_map(|c| c.items.iter()) {
            counts.record(item.status);
            if item.status == VerificationStatus::AllowedNotComparable {
                total_not_comparable += item.bill_amount;
            }
            match calculate_financial_contribution(item) {
                Ok(contribution) if !contribution.is_excluded => {
                    total_bill += contribution.bill_amount;
                    total_allowed += contribution.allowed_contribution;
                    total_extra += contribution.extra_contribution;
                    total_unclassified += contribution.unclassified_contribution;
                }
                Ok(_) => {}
                Err(e) => warn!(item = %item.bill_item, error = %e, "contribution invariant failed"),
            }
        }

        let total_bill = round2(total_bill);
        let total_allowed = round2(total_allowed);
        let total_extra = round2(total_extra);
        let total_unclassified = round2(total_unclassified);
        let financials_balanced =
            (total_bill - (total_allowed + total_extra + total_unclassified)).abs() < 0.01;

        VerificationReport {
            hospital: bill.hospital_name.clone(),
            matched_hospital,
            hospital_similarity,
            results,
            total_bill_amount: total_bill,
            total_allowed_amount: total_allowed,
            total_extra_amount: total_extra,
            total_unclassified_amount: total_unclassified,
            total_allowed_not_comparable: round2(total_not_comparable),
            counts,
            financials_balanced,
        }
    }
}
