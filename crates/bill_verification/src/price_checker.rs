// Price checking against tie-up rates
// unit: allowed = rate × quantity; service/bundle: allowed = rate.
// GREEN means within the allowed limit, RED means overcharged.

use serde::{Deserialize, Serialize};
use tracing::debug;

use bill_core_models::{round2, PricingType, TieUpItem, VerificationStatus};

/// Result of one price comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceCheckResult {
    pub status: VerificationStatus,
    pub bill_amount: f64,
    pub allowed_amount: f64,
    /// 0 when GREEN, positive when RED
    pub extra_amount: f64,
}

impl PriceCheckResult {
    #[must_use]
    pub fn is_overcharged(&self) -> bool {
        self.status == VerificationStatus::Red
    }
}

/// The policy ceiling for a matched reference item.
#[must_use]
pub fn calculate_allowed_amount(tieup_item: &TieUpItem, quantity: f64) -> f64 {
    let allowed = match tieup_item.pricing {
        PricingType::Unit => tieup_item.rate * quantity,
        PricingType::Service | PricingType::Bundle => tieup_item.rate,
    };
    round2(allowed)
}

/// Compare a bill amount against the allowed amount.
///
/// No matched reference means UNCLASSIFIED: the full amount lands in the
/// manual-review bucket downstream.
#[must_use]
pub fn check_price(
    bill_amount: f64,
    tieup_item: Option<&TieUpItem>,
    quantity: f64,
) -> PriceCheckResult {
    let bill_amount = round2(bill_amount);

    let Some(tieup_item) = tieup_item else {
        return PriceCheckResult {
            status: VerificationStatus::Unclassified,
            bill_amount,
            allowed_amount: 0.0,
            extra_amount: 0.0,
        };
    };

    let allowed_amount = calculate_allowed_amount(tieup_item, quantity);
    let (status, extra_amount) = if bill_amount <= allowed_amount {
        (VerificationStatus::Green, 0.0)
    } else {
        (VerificationStatus::Red, round2(bill_amount - allowed_amount))
    };

    debug!(bill_amount, allowed_amount, extra_amount, ?status, "price check");
    PriceCheckResult {
        status,
        bill_amount,
        allowed_amount,
        extra_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tieup(rate: f64, pricing: PricingType) -> TieUpItem {
        TieUpItem {
            item_name: "X-Ray Chest PA".to_string(),
            rate,
            pricing,
        }
    }

    #[test]
    fn test_unit_pricing_scales_by_quantity() {
        assert_eq!(
            calculate_allowed_amount(&tieup(100.0, PricingType::Unit), 3.0),
            300.0
        );
    }

    #[test]
    fn test_service_and_bundle_ignore_quantity() {
        assert_eq!(
            calculate_allowed_amount(&tieup(800.0, PricingType::Service), 3.0),
            800.0
        );
        assert_eq!(
            calculate_allowed_amount(&tieup(5000.0, PricingType::Bundle), 2.0),
            5000.0
        );
    }

    #[test]
    fn test_green_within_limit() {
        let result = check_price(450.0, Some(&tieup(800.0, PricingType::Service)), 1.0);
        assert_eq!(result.status, VerificationStatus::Green);
        assert_eq!(result.extra_amount, 0.0);
        assert!(!result.is_overcharged());
    }

    #[test]
    fn test_red_over_limit() {
        let result = check_price(1200.0, Some(&tieup(800.0, PricingType::Service)), 1.0);
        assert_eq!(result.status, VerificationStatus::Red);
        assert_eq!(result.allowed_amount, 800.0);
        assert_eq!(result.extra_amount, 400.0);
        assert!(result.is_overcharged());
    }

    #[test]
    fn test_equal_amounts_are_green() {
        let result = check_price(800.0, Some(&tieup(800.0, PricingType::Service)), 1.0);
        assert_eq!(result.status, VerificationStatus::Green);
    }

    #[test]
    fn test_no_match_is_unclassified() {
        let result = check_price(5000.0, None, 1.0);
        assert_eq!(result.status, VerificationStatus::Unclassified);
        assert_eq!(result.allowed_amount, 0.0);
    }
}
