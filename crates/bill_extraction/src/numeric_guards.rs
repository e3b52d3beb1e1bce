// Numeric guardrails for OCR amount extraction
// Rejects identifiers (phone numbers, MRNs, dates) masquerading as amounts

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum plausible amount for a single line item.
pub const MAX_LINE_ITEM_AMOUNT: f64 = 1e7;

/// Maximum plausible grand total for one bill.
pub const MAX_GRAND_TOTAL: f64 = 1e8;

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static regex"));
static SLASH_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}[/-]\d{1,2}[/-]\d{2,4}$").expect("static regex"));
static IDENTIFIER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(mrn|uhid|bill|inv|reg|ipd|opd|visit)[-:]?\d+$").expect("static regex"));
static CURRENCY_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[₹$,\s]|(?i:rs\.?)|(?i:inr)").expect("static regex"));

/// Why a numeric string was rejected as an amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspectKind {
    /// 10-13 bare digits, optionally prefixed with `+`
    Phone,
    /// 11+ bare digits, typical of medical record numbers
    MrnLike,
    /// ISO or DD/MM/YYYY date
    Date,
    /// Labeled identifier such as MRN1234567890
    Identifier,
}

/// Classify a numeric-looking string as suspect, if it is one.
#[must_use]
pub fn classify_suspect_numeric(text: &str) -> Option<SuspectKind> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if ISO_DATE.is_match(trimmed) || SLASH_DATE.is_match(trimmed) {
        return Some(SuspectKind::Date);
    }
    if IDENTIFIER_PREFIX.is_match(trimmed) {
        return Some(SuspectKind::Identifier);
    }

    // Bare digit runs: anything phone- or MRN-sized is an identifier, not
    // money. Amounts carry separators or decimals.
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        if digits.len() >= 11 {
            return Some(SuspectKind::MrnLike);
        }
        if digits.len() == 10 {
            return Some(SuspectKind::Phone);
        }
    }

    None
}

/// True when the string must not be interpreted as an amount.
#[must_use]
pub fn is_suspect_numeric(text: &str) -> bool {
    classify_suspect_numeric(text).is_some()
}

/// Parse a currency-ish token into a value, applying the guardrails.
///
/// Strips currency symbols and thousand separators. Returns `None` for
/// suspect strings, non-numbers, and values beyond the line-item cap.
#[must_use]
pub fn extract_numeric_value(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() || is_suspect_numeric(trimmed) {
        return None;
    }

    let cleaned = CURRENCY_NOISE.replace_all(trimmed, "");
    if cleaned.is_empty() {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() || value < 0.0 || value > MAX_LINE_ITEM_AMOUNT {
        return None;
    }
    Some(value)
}

/// Validate a candidate line-item amount.
#[must_use]
pub fn validate_amount(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value <= MAX_LINE_ITEM_AMOUNT
}

/// Validate a grand total against the document-level cap.
///
/// # Errors
/// Returns the reason when the total exceeds the cap.
pub fn validate_grand_total(total: f64) -> Result<(), String> {
    if total > MAX_GRAND_TOTAL {
        return Err(format!(
            "grand total {total:.2} exceeds cap {MAX_GRAND_TOTAL:.0}"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_numbers_are_suspect() {
        assert_eq!(classify_suspect_numeric("9876543210"), Some(SuspectKind::Phone));
        assert!(is_suspect_numeric("+919876543210"));
    }

    #[test]
    fn test_mrn_like_numbers_are_suspect() {
        assert_eq!(
            classify_suspect_numeric("10010001143682"),
            Some(SuspectKind::MrnLike)
        );
        assert_eq!(
            classify_suspect_numeric("MRN1234567890"),
            Some(SuspectKind::Identifier)
        );
    }

    #[test]
    fn test_dates_are_suspect() {
        assert_eq!(classify_suspect_numeric("17/01/2026"), Some(SuspectKind::Date));
        assert_eq!(classify_suspect_numeric("2026-01-17"), Some(SuspectKind::Date));
    }

    #[test]
    fn test_valid_amounts_are_not_suspect() {
        assert!(!is_suspect_numeric("1234.56"));
        assert!(!is_suspect_numeric("10,000.00"));
        assert!(!is_suspect_numeric("5000"));
    }

    #[test]
    fn test_extract_rejects_suspects_and_caps() {
        assert_eq!(extract_numeric_value("9876543210"), None);
        assert_eq!(extract_numeric_value("10010001143682"), None);
        assert_eq!(extract_numeric_value("₹5,000.00"), Some(5000.0));
        assert_eq!(extract_numeric_value("Rs. 1,234.56"), Some(1234.56));
        assert_eq!(extract_numeric_value("99999999999"), None);
    }

    #[test]
    fn test_grand_total_cap() {
        assert!(validate_grand_total(95_000.0).is_ok());
        assert!(validate_grand_total(2e8).is_err());
    }
}
