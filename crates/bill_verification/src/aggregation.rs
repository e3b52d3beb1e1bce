// Display-row aggregation
// Identical (normalized_name, matched_reference, category) tuples collapse
// into one row that keeps the underlying line items. Non-destructive: the
// report itself is never mutated.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use bill_core_models::{round2, ItemVerificationResult, VerificationReport, VerificationStatus};

/// One aggregated display row with its line-item breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedRow {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_reference: Option<String>,
    pub category: String,
    /// Worst status across the group, by fixed priority
    pub status: VerificationStatus,
    pub occurrence_count: usize,
    pub total_bill_amount: f64,
    pub total_allowed_amount: f64,
    pub total_extra_amount: f64,
    /// The unmerged results backing this row
    pub line_items: Vec<ItemVerificationResult>,
}

/// Group a report's items into display rows.
///
/// Rows keep first-seen order; status resolves by priority
/// RED > UNCLASSIFIED > GREEN > ALLOWED_NOT_COMPARABLE > IGNORED_ARTIFACT.
#[must_use]
pub fn group_results(report: &VerificationReport) -> Vec<AggregatedRow> {
    let mut order: Vec<(String, Option<String>, String)> = Vec::new();
    let mut groups: HashMap<(String, Option<String>, String), Vec<&ItemVerificationResult>> =
        HashMap::new();

    for category in &report.results {
        for item in &category.items {
            let display_name = item
                .normalized_name
                .clone()
                .unwrap_or_else(|| item.bill_item.to_lowercase());
            let key = (
                display_name,
                item.matched_item.clone(),
                category.category.clone(),
            );
            let entry = groups.entry(key.clone()).or_default();
            if entry.is_empty() {
                order.push(key);
            }
            entry.push(item);
        }
    }

    order
        .into_iter()
        .filter_map(|key| {
            let items = groups.remove(&key)?;
            let (display_name, matched_reference, category) = key;
            let status = items
                .iter()
                .map(|i| i.status)
                .min_by_key(|s| s.group_priority())?;
            Some(AggregatedRow {
                display_name,
                matched_reference,
                category,
                status,
                occurrence_count: items.len(),
                total_bill_amount: round2(items.iter().map(|i| i.bill_amount).sum()),
                total_allowed_amount: round2(items.iter().map(|i| i.allowed_amount).sum()),
                total_extra_amount: round2(items.iter().map(|i| i.extra_amount).sum()),
                line_items: items.into_iter().cloned().collect(),
            })
        })
        .collect()
}
