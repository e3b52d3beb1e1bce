// Property-based tests for the financial contribution logic
// For any status and any non-negative amounts, the reconciliation
// invariant must hold and excluded items must contribute nothing.

use proptest::prelude::*;

use bill_core_models::{ItemVerificationResult, VerificationStatus};
use bill_verification::financial::calculate_financial_contribution;

fn result_with(status: VerificationStatus, bill: f64, allowed: f64) -> ItemVerificationResult {
    ItemVerificationResult {
        bill_item: "Item".to_string(),
        matched_item: None,
        status,
        bill_amount: bill,
        allowed_amount: allowed,
        extra_amount: (bill - allowed).max(0.0),
        similarity: None,
        normalized_name: None,
        diagnostics: None,
    }
}

fn any_status() -> impl Strategy<Value = VerificationStatus> {
    prop_oneof![
        Just(VerificationStatus::Green),
        Just(VerificationStatus::Red),
        Just(VerificationStatus::Unclassified),
        Just(VerificationStatus::AllowedNotComparable),
        Just(VerificationStatus::IgnoredArtifact),
    ]
}

proptest! {
    #[test]
    fn contribution_reconciles_for_all_statuses(
        status in any_status(),
        bill in 0.0f64..100_000.0,
        allowed_delta in 0.0f64..10_000.0,
    ) {
        let bill = (bill * 100.0).round() / 100.0;
        // Keep the status semantically consistent with the amounts
        let allowed = match status {
            VerificationStatus::Green => bill + allowed_delta,
            VerificationStatus::Red => (bill - allowed_delta).max(0.0),
            _ => 0.0,
        };
        let allowed = (allowed * 100.0).round() / 100.0;

        let contribution = calculate_financial_contribution(&result_with(status, bill, allowed))
            .expect("contribution is valid");

        if status.is_excluded() {
            prop_assert!(contribution.is_excluded);
            prop_assert_eq!(contribution.allowed_contribution, 0.0);
            prop_assert_eq!(contribution.extra_contribution, 0.0);
            prop_assert_eq!(contribution.unclassified_contribution, 0.0);
        } else {
            let total = contribution.allowed_contribution
                + contribution.extra_contribution
                + contribution.unclassified_contribution;
            prop_assert!((contribution.bill_amount - total).abs() < 0.01);
            prop_assert!(contribution.allowed_contribution <= contribution.bill_amount + 0.01);
        }
    }

    #[test]
    fn allowed_contribution_never_exceeds_limit(
        bill in 0.0f64..100_000.0,
        allowed in 0.0f64..100_000.0,
    ) {
        let bill = (bill * 100.0).round() / 100.0;
        let allowed = (allowed * 100.0).round() / 100.0;
        let status = if bill <= allowed {
            VerificationStatus::Green
        } else {
            VerificationStatus::Red
        };

        let contribution = calculate_financial_contribution(&result_with(status, bill, allowed))
            .expect("contribution is valid");

        prop_assert!(contribution.allowed_contribution <= allowed + 0.01);
        prop_assert!(contribution.allowed_contribution <= bill + 0.01);
        prop_assert!(contribution.extra_contribution >= 0.0);
    }
}
