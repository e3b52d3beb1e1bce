// Report rendering and end-of-run validation
// The two validators back the orchestrator's logged post-conditions:
// completeness (every input item appears exactly once) and counter
// reconciliation (counts and totals agree with the item lists).

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use bill_core_models::{round2, BillInput, VerificationReport, VerificationStatus};

/// Rendering options for the final text view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderingOptions {
    pub show_normalized_names: bool,
    pub show_similarity_scores: bool,
}

impl Default for RenderingOptions {
    fn default() -> Self {
        Self {
            show_normalized_names: false,
            show_similarity_scores: true,
        }
    }
}

/// Every input item must appear exactly once in the report.
///
/// # Errors
/// A human-readable description of the first discrepancy found.
pub fn validate_completeness(bill: &BillInput, report: &VerificationReport) -> Result<(), String> {
    let input_count = bill.item_count();
    let output_count = report.all_items().count();
    if input_count != output_count {
        return Err(format!(
            "item count mismatch: {input_count} in bill, {output_count} in report"
        ));
    }

    for category in &bill.categories {
        let Some(result) = report.results.iter().find(|r| r.category == category.category_name)
        else {
            return Err(format!("category {} missing from report", category.category_name));
        };
        if result.items.len() != category.items.len() {
            return Err(format!(
                "category {}: {} items in bill, {} in report",
                category.category_name,
                category.items.len(),
                result.items.len()
            ));
        }
    }
    Ok(())
}

/// Per-status counts and grand totals must agree with the item lists.
///
/// # Errors
/// A human-readable description of the first mismatch found.
pub fn validate_summary_counters(report: &VerificationReport) -> Result<(), String> {
    let item_total = report.all_items().count() as u32;
    if report.counts.total() != item_total {
        return Err(format!(
            "status counts sum to {}, report has {item_total} items",
            report.counts.total()
        ));
    }

    let mut bill_sum = 0.0;
    for item in report.all_items() {
        if !item.status.is_excluded() {
            bill_sum += item.bill_amount;
        }
    }
    if (round2(bill_sum) - report.total_bill_amount).abs() >= 0.01 {
        return Err(format!(
            "total bill {} disagrees with item sum {:.2}",
            report.total_bill_amount, bill_sum
        ));
    }
    Ok(())
}

const fn status_symbol(status: VerificationStatus) -> &'static str {
    match status {
        VerificationStatus::Green => "OK",
        VerificationStatus::Red => "OVER",
        VerificationStatus::Unclassified => "REVIEW",
        VerificationStatus::AllowedNotComparable => "ADMIN",
        VerificationStatus::IgnoredArtifact => "SKIP",
    }
}

/// Render the final human-readable view of a report.
#[must_use]
pub fn render_final_view(report: &VerificationReport, options: &RenderingOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "VERIFICATION RESULTS (FINAL VIEW)");
    let _ = writeln!(out, "Hospital: {}", report.hospital);
    if let Some(matched) = &report.matched_hospital {
        match report.hospital_similarity {
            Some(similarity) => {
                let _ = writeln!(out, "Matched sheet: {matched} (similarity {similarity:.2})");
            }
            None => {
                let _ = writeln!(out, "Matched sheet: {matched}");
            }
        }
    }
    let _ = writeln!(out);

    for category in &report.results {
        let _ = writeln!(out, "[{}]", category.category);
        for item in &category.items {
            let mut line = format!(
                "  {:6} {} - bill {:.2}",
                status_symbol(item.status),
                item.bill_item,
                item.bill_amount
            );
            if item.allowed_amount > 0.0 {
                let _ = write!(line, ", allowed {:.2}", item.allowed_amount);
            }
            if item.extra_amount > 0.0 {
                let _ = write!(line, ", extra {:.2}", item.extra_amount);
            }
            if options.show_similarity_scores {
                if let Some(similarity) = item.similarity {
                    let _ = write!(line, " [sim {similarity:.2}]");
                }
            }
            if options.show_normalized_names {
                if let Some(name) = &item.normalized_name {
                    let _ = write!(line, " ({name})");
                }
            }
            let _ = writeln!(out, "{line}");
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Total bill:         {:.2}", report.total_bill_amount);
    let _ = writeln!(out, "Total allowed:      {:.2}", report.total_allowed_amount);
    let _ = writeln!(out, "Total extra:        {:.2}", report.total_extra_amount);
    let _ = writeln!(out, "Total unclassified: {:.2}", report.total_unclassified_amount);
    let _ = writeln!(
        out,
        "Financials balanced: {}",
        if report.financials_balanced { "yes" } else { "NO" }
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bill_core_models::{
        BillInputCategory, BillInputItem, CategoryVerificationResult, ItemVerificationResult,
        VerificationCounts,
    };

    fn sample_report() -> VerificationReport {
        let mut counts = VerificationCounts::default();
        counts.record(VerificationStatus::Green);
        VerificationReport {
            hospital: "Test Hospital".to_string(),
            matched_hospital: Some("Test Hospital".to_string()),
            hospital_similarity: Some(0.95),
            results: vec![CategoryVerificationResult {
                category: "medicines".to_string(),
                matched_category: Some("Medicines".to_string()),
                category_similarity: Some(0.90),
                items: vec![ItemVerificationResult {
                    bill_item: "PARACETAMOL 500MG".to_string(),
                    matched_item: Some("Paracetamol 500mg".to_string()),
                    status: VerificationStatus::Green,
                    bill_amount: 100.0,
                    allowed_amount: 100.0,
                    extra_amount: 0.0,
                    similarity: Some(0.98),
                    normalized_name: Some("paracetamol 500mg".to_string()),
                    diagnostics: None,
                }],
            }],
            total_bill_amount: 100.0,
            total_allowed_amount: 100.0,
            total_extra_amount: 0.0,
            total_unclassified_amount: 0.0,
            total_allowed_not_comparable: 0.0,
            counts,
            financials_balanced: true,
        }
    }

    fn sample_bill() -> BillInput {
        BillInput {
            hospital_name: "Test Hospital".to_string(),
            categories: vec![BillInputCategory {
                category_name: "medicines".to_string(),
                items: vec![BillInputItem {
                    item_name: "PARACETAMOL 500MG".to_string(),
                    quantity: 1.0,
                    amount: 100.0,
                }],
            }],
        }
    }

    #[test]
    fn test_completeness_passes_on_matching_report() {
        assert!(validate_completeness(&sample_bill(), &sample_report()).is_ok());
    }

    #[test]
    fn test_completeness_catches_dropped_items() {
        let mut report = sample_report();
        report.results[0].items.clear();
        assert!(validate_completeness(&sample_bill(), &report).is_err());
    }

    #[test]
    fn test_counter_validation() {
        assert!(validate_summary_counters(&sample_report()).is_ok());

        let mut report = sample_report();
        report.total_bill_amount = 999.0;
        assert!(validate_summary_counters(&report).is_err());
    }

    #[test]
    fn test_render_final_view_contains_key_facts() {
        let options = RenderingOptions {
            show_normalized_names: true,
            show_similarity_scores: true,
        };
        let output = render_final_view(&sample_report(), &options);

        assert!(output.contains("VERIFICATION RESULTS (FINAL VIEW)"));
        assert!(output.contains("Test Hospital"));
        assert!(output.contains("PARACETAMOL 500MG"));
        assert!(output.contains("paracetamol 500mg"));
        assert!(output.contains("Financials balanced: yes"));
    }
}
