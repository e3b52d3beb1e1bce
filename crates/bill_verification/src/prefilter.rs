// Pre-filter for bill items entering the matcher
// Artefacts (page numbers, contact lines, metadata echoes) and
// administrative charges never reach semantic matching.

use once_cell::sync::Lazy;
use regex::Regex;

use bill_core_models::FailureReason;

static PAGE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*page\s*\d+(\s*(of|/)\s*\d+)?\s*$").expect("static regex"));
static CONTACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\bwww\.|https?://|@[a-z0-9.\-]+\.[a-z]{2,}|\b(phone|tel|mobile|fax)\b|\+?\d{10,13}\b)")
        .expect("static regex")
});
static COURTESY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(thank\s*you|get\s*well|wishing\s*you)\b").expect("static regex"));
static BILL_METADATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(bill\s*no|invoice\s*no|mrn|uhid|gstin|policy\s*(no|id)|authori[sz]ation|claim\s*(no|id))\b")
        .expect("static regex")
});
static PACKAGE_ONLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(package|pkg|health\s*checkup|master\s*health|executive\s*checkup|combo)\b")
        .expect("static regex")
});
static ADMIN_CHARGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(registration|admission\s*(fee|charge)|admin(istrative)?\s*(fee|charge)|processing\s*(fee|charge)|documentation|medical\s*record|discharge\s*summary|certificate)\b",
    )
    .expect("static regex")
});

/// Verdict of the pre-filter layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefilterVerdict {
    /// Proceed to matching
    Pass,
    /// Not a medical service at all; drop with the given reason
    Artifact(FailureReason),
    /// A package line that only a package rate can answer
    PackageOnly,
    /// A legitimate administrative charge with no comparable reference
    AdminCharge,
}

/// Classify a bill item name before any matching work.
#[must_use]
pub fn prefilter_item(item_name: &str) -> PrefilterVerdict {
    let trimmed = item_name.trim();
    if trimmed.is_empty() || trimmed.chars().filter(|c| c.is_alphabetic()).count() < 2 {
        return PrefilterVerdict::Artifact(FailureReason::AdminCharge);
    }
    if trimmed.eq_ignore_ascii_case("unknown") {
        return PrefilterVerdict::Artifact(FailureReason::AdminCharge);
    }
    if PAGE_NUMBER.is_match(trimmed)
        || CONTACT.is_match(trimmed)
        || COURTESY.is_match(trimmed)
        || BILL_METADATA.is_match(trimmed)
    {
        return PrefilterVerdict::Artifact(FailureReason::AdminCharge);
    }
    if ADMIN_CHARGE.is_match(trimmed) {
        return PrefilterVerdict::AdminCharge;
    }
    if PACKAGE_ONLY.is_match(trimmed) {
        return PrefilterVerdict::PackageOnly;
    }
    PrefilterVerdict::Pass
}
