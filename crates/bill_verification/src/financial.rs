// Financial contribution calculation
// Single source of truth for how each verified item lands in the report's
// totals. The allowed amount is a policy ceiling, never money spent:
// allowed_contribution = min(bill, limit), extra = max(0, bill - limit),
// and unmatched bills go whole into the unclassified bucket.

use tracing::debug;

use bill_core_models::{
    FinancialContribution, ItemVerificationResult, ModelResult, VerificationStatus,
};

/// Compute the contribution of one verified item.
///
/// Every aggregation step must go through here so the reconciliation
/// invariant `bill = allowed + extra + unclassified` holds for all
/// non-excluded items.
///
/// # Errors
/// Propagates the invariant check, which cannot fail for the values
/// produced here unless the inputs are non-finite.
pub fn calculate_financial_contribution(
    item: &ItemVerificationResult,
) -> ModelResult<FinancialContribution> {
    let bill = item.bill_amount;

    let contribution = match item.status {
        VerificationStatus::IgnoredArtifact | VerificationStatus::AllowedNotComparable => {
            debug!(item = %item.bill_item, status = ?item.status, "excluded from financials");
            FinancialContribution {
                bill_amount: bill,
                allowed_limit: None,
                allowed_contribution: 0.0,
                extra_contribution: 0.0,
                unclassified_contribution: 0.0,
                is_excluded: true,
            }
        }
        VerificationStatus::Green => FinancialContribution {
            bill_amount: bill,
            allowed_limit: Some(item.allowed_amount),
            // GREEN means bill <= limit, so the whole bill is covered
            allowed_contribution: bill,
            extra_contribution: 0.0,
            unclassified_contribution: 0.0,
            is_excluded: false,
        },
        VerificationStatus::Red => FinancialContribution {
            bill_amount: bill,
            allowed_limit: Some(item.allowed_amount),
            allowed_contribution: item.allowed_amount,
            extra_contribution: bill - item.allowed_amount,
            unclassified_contribution: 0.0,
            is_excluded: false,
        },
        VerificationStatus::Unclassified => FinancialContribution {
            bill_amount: bill,
            allowed_limit: None,
            allowed_contribution: 0.0,
            extra_contribution: 0.0,
            unclassified_contribution: bill,
            is_excluded: false,
        },
    };

    contribution.validate()?;
    Ok(contribution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bill_core_models::VerificationStatus;

    fn item(name: &str, status: VerificationStatus, bill: f64, allowed: f64) -> ItemVerificationResult {
        ItemVerificationResult {
            bill_item: name.to_string(),
            matched_item: None,
            status,
            bill_amount: bill,
            allowed_amount: allowed,
            extra_amount: 0.0,
            similarity: None,
            normalized_name: None,
            diagnostics: None,
        }
    }

    #[test]
    fn test_green_contributes_full_bill() {
        let contrib = calculate_financial_contribution(&item(
            "X-Ray Chest PA",
            VerificationStatus::Green,
            450.0,
            800.0,
        ))
        .expect("valid contribution");

        assert_eq!(contrib.allowed_limit, Some(800.0));
        assert_eq!(contrib.allowed_contribution, 450.0);
        assert_eq!(contrib.extra_contribution, 0.0);
        assert_eq!(contrib.unclassified_contribution, 0.0);
        assert!(!contrib.is_excluded);
    }

    #[test]
    fn test_red_splits_at_the_limit() {
        let contrib = calculate_financial_contribution(&item(
            "CT Scan Abdomen",
            VerificationStatus::Red,
            1200.0,
            800.0,
        ))
        .expect("valid contribution");

        assert_eq!(contrib.allowed_contribution, 800.0);
        assert_eq!(contrib.extra_contribution, 400.0);
        assert_eq!(contrib.unclassified_contribution, 0.0);
    }

    #[test]
    fn test_unclassified_goes_whole_to_review() {
        let contrib = calculate_financial_contribution(&item(
            "Custom Health Package",
            VerificationStatus::Unclassified,
            5000.0,
            0.0,
        ))
        .expect("valid contribution");

        assert_eq!(contrib.allowed_contribution, 0.0);
        assert_eq!(contrib.unclassified_contribution, 5000.0);
    }

    #[test]
    fn test_excluded_statuses_contribute_nothing() {
        for status in [
            VerificationStatus::IgnoredArtifact,
            VerificationStatus::AllowedNotComparable,
        ] {
            let contrib = calculate_financial_contribution(&item("Registration Fee", status, 50.0, 0.0))
                .expect("valid contribution");
            assert!(contrib.is_excluded);
            assert_eq!(contrib.allowed_contribution, 0.0);
            assert_eq!(contrib.extra_contribution, 0.0);
            assert_eq!(contrib.unclassified_contribution, 0.0);
        }
    }

    #[test]
    fn test_zero_bill_amount() {
        let contrib =
            calculate_financial_contribution(&item("Free Service", VerificationStatus::Green, 0.0, 100.0))
                .expect("valid contribution");
        assert_eq!(contrib.allowed_contribution, 0.0);
    }

    #[test]
    fn test_mixed_bill_reconciliation() {
        let items = vec![
            item("X-Ray", VerificationStatus::Green, 450.0, 800.0),
            item("CT Scan", VerificationStatus::Red, 1200.0, 800.0),
            item("Package", VerificationStatus::Unclassified, 5000.0, 0.0),
            item("UNKNOWN", VerificationStatus::IgnoredArtifact, 100.0, 0.0),
            item("Registration", VerificationStatus::AllowedNotComparable, 50.0, 0.0),
        ];

        let contributions: Vec<_> = items
            .iter()
            .map(|i| calculate_financial_contribution(i).expect("valid contribution"))
            .collect();

        let included = || contributions.iter().filter(|c| !c.is_excluded);
        let total_bill: f64 = included().map(|c| c.bill_amount).sum();
        let total_allowed: f64 = included().map(|c| c.allowed_contribution).sum();
        let total_extra: f64 = included().map(|c| c.extra_contribution).sum();
        let total_unclassified: f64 = included().map(|c| c.unclassified_contribution).sum();

        assert_eq!(total_bill, 6650.0);
        assert_eq!(total_allowed, 1250.0);
        assert_eq!(total_extra, 400.0);
        assert_eq!(total_unclassified, 5000.0);
        assert!((total_bill - (total_allowed + total_extra + total_unclassified)).abs() < 0.01);
    }
}
