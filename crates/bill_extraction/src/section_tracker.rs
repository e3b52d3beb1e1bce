// Stateful section tracking for bill item categorisation
// Section context persists across pages until a new header overrides it;
// items without context fall back to description-keyword classification.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use bill_core_models::ItemCategory;

/// Anchored patterns recognising standalone section header lines.
/// Order matters: the first hit wins.
static SECTION_RULES: Lazy<Vec<(Regex, ItemCategory, bool)>> = Lazy::new(|| {
    [
        (r"^(dpco|nlem|regulated\s+pricing(\s+drugs?)?)$", ItemCategory::Medicines, true),
        (r"^(pharmacy|medicines?|drugs?)(\s+(charges|services))?$", ItemCategory::Medicines, false),
        (r"^((surgical\s+)?consumables?|surgicals?)(\s+charges)?$", ItemCategory::SurgicalConsumables, false),
        (r"^(implants?((\s+(and|&)\s+)devices?)?|devices?)$", ItemCategory::ImplantsDevices, false),
        (
            r"^(diagnostics?|laboratory(\s+services)?|lab(\s+(services|charges))?|pathology|investigations?)$",
            ItemCategory::DiagnosticsTests,
            false,
        ),
        (r"^(radiology|imaging)(\s+(services|charges))?$", ItemCategory::Radiology, false),
        (
            r"^(consultations?(\s+charges)?|professional\s+(fees?|charges))$",
            ItemCategory::Consultation,
            false,
        ),
        (
            r"^((room|ward|bed)(\s+(rent|charges))?|hospitali[sz]ation(\s+charges)?|nursing(\s+charges)?)$",
            ItemCategory::Hospitalization,
            false,
        ),
        (r"^(packages?|package\s+(charges|details))$", ItemCategory::Packages, false),
        (
            r"^(administrative|admin|registration)(\s+(charges|fees?))?$",
            ItemCategory::Administrative,
            false,
        ),
    ]
    .iter()
    .map(|(p, c, reg)| {
        (
            Regex::new(&format!("(?i){p}")).expect("static regex"),
            *c,
            *reg,
        )
    })
    .collect()
});

/// Keyword rules for classifying an item from its description alone.
/// Ordered by priority; regulated and package wording first, radiology
/// before the generic diagnostics words so "CT SCAN" never lands in lab.
static DESCRIPTION_RULES: Lazy<Vec<(Regex, ItemCategory)>> = Lazy::new(|| {
    [
        (
            r"\b(dpco|nlem|contrast|iohexol|omnipaque|heparin|insulin)\b",
            ItemCategory::Medicines,
        ),
        (
            r"\b(package|pkg|combo|health\s*checkup|master\s*health|executive\s*checkup)\b",
            ItemCategory::Packages,
        ),
        (
            r"\b(mri|ct\s*scan|x-?ray|pet\s*scan|ultrasound|usg|sonography|mammogra\w*|doppler|scan)\b",
            ItemCategory::Radiology,
        ),
        (
            r"\b(stent|implant|pacemaker|defibrillator|guide\s*wire|guidewire|ptca|balloon|angioplasty|prosthesis|mesh)\b|\d+fr\b",
            ItemCategory::ImplantsDevices,
        ),
        (
            r"\b(tablet|tab|capsule|cap|syrup|injection|inj|infusion|ointment|cream|drops|inhaler|spray|suspension|vaccine|vitamin|antibiotic|analgesic|antacid)\b|\d+\s*(mg|mcg|ml|iu)\b|\d+\s*%",
            ItemCategory::Medicines,
        ),
        (
            r"\b(gloves?|syringe|needle|catheter|cannula|bandage|gauze|drape|dressing|swab|mask|gown|electrode|blade|iv\s*set|stop\s*cock)\b",
            ItemCategory::SurgicalConsumables,
        ),
        (
            r"\b(consultation|consult|revisit|follow\s*-?up|second\s*opinion|doctor\s*fee|physician\s*fee)\b|\bdr\.?\s+[a-z]+",
            ItemCategory::Consultation,
        ),
        (
            r"\b(room|ward|bed|icu|nicu|picu|ccu|nursing|accommodation|stay)\b",
            ItemCategory::Hospitalization,
        ),
        (
            r"\b(test|lab|laboratory|pathology|ecg|ekg|echo|blood|urine|culture|biopsy|screening|investigation|hemoglobin|cbc|lipid|thyroid|glucose|creatinine|urea|hba1c)\b",
            ItemCategory::DiagnosticsTests,
        ),
        (
            r"\b(registration|admission|processing|documentation|discharge|certificate|admin)\b",
            ItemCategory::Administrative,
        ),
    ]
    .iter()
    .map(|(p, c)| (Regex::new(&format!("(?i){p}")).expect("static regex"), *c))
    .collect()
});

static REGULATED_PRICING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(dpco|nlem|regulated\s+pricing|contrast|iohexol|omnipaque|heparin|insulin)\b")
        .expect("static regex")
});

static DECORATIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\s\-–—=*•:_]+|[\s\-–—=*•:_]+$").expect("static regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

const MAX_SECTION_HEADER_LEN: usize = 40;

/// Detect a standalone section header line.
///
/// Headers are short, carry no digits (amounts disqualify a line), and
/// match one of the section phrases after decoration stripping.
#[must_use]
pub fn detect_section_header(text: &str) -> Option<(ItemCategory, bool)> {
    let cleaned = DECORATIONS.replace_all(text.trim(), "");
    let cleaned = WHITESPACE.replace_all(&cleaned, " ");
    if cleaned.is_empty() || cleaned.len() > MAX_SECTION_HEADER_LEN {
        return None;
    }
    if cleaned.chars().any(|c| c.is_ascii_digit()) || cleaned.contains('₹') {
        return None;
    }
    SECTION_RULES
        .iter()
        .find(|(pattern, _, _)| pattern.is_match(&cleaned))
        .map(|(_, category, regulated)| (*category, *regulated))
}

/// Classify an item from its description; `Other` when nothing matches.
#[must_use]
pub fn classify_item_by_description(description: &str) -> ItemCategory {
    DESCRIPTION_RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(description))
        .map_or(ItemCategory::Other, |(_, category)| *category)
}

/// True for DPCO/NLEM price-regulated wording.
#[must_use]
pub fn is_regulated_pricing_text(description: &str) -> bool {
    REGULATED_PRICING.is_match(description)
}

/// A section header occurrence at a document position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionEvent {
    pub page: u32,
    pub y: f32,
    pub category: ItemCategory,
    pub regulated: bool,
    pub raw_text: String,
}

/// Ordered section context over the whole document.
///
/// Events are kept sorted by `(page, y)`; a query returns the last event at
/// or before the position, so context persists across page boundaries until
/// a new header overrides it.
#[derive(Debug, Clone, Default)]
pub struct SectionTracker {
    events: Vec<SectionEvent>,
}

impl SectionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a section header. Ties at the same `(page, y)` keep input order.
    pub fn add_event(&mut self, page: u32, y: f32, category: ItemCategory, regulated: bool, raw_text: &str) {
        let idx = self
            .events
            .partition_point(|e| e.page < page || (e.page == page && e.y <= y));
        self.events.insert(
            idx,
            SectionEvent {
                page,
                y,
                category,
                regulated,
                raw_text: raw_text.to_string(),
            },
        );
    }

    /// The section event governing `(page, y)`, if any.
    #[must_use]
    pub fn event_at(&self, page: u32, y: f32) -> Option<&SectionEvent> {
        let idx = self
            .events
            .partition_point(|e| e.page < page || (e.page == page && e.y <= y));
        idx.checked_sub(1).map(|i| &self.events[i])
    }

    /// The active category at `(page, y)`, if any.
    #[must_use]
    pub fn section_at(&self, page: u32, y: f32) -> Option<ItemCategory> {
        self.event_at(page, y).map(|e| e.category)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_header_detection() {
        assert_eq!(
            detect_section_header("DIAGNOSTICS"),
            Some((ItemCategory::DiagnosticsTests, false))
        );
        assert_eq!(
            detect_section_header("--- RADIOLOGY ---"),
            Some((ItemCategory::Radiology, false))
        );
        assert_eq!(
            detect_section_header("CONSULTATION"),
            Some((ItemCategory::Consultation, false))
        );
        assert_eq!(
            detect_section_header("Medicines"),
            Some((ItemCategory::Medicines, false))
        );
        assert_eq!(
            detect_section_header("Laboratory Services"),
            Some((ItemCategory::DiagnosticsTests, false))
        );
        assert_eq!(
            detect_section_header("DPCO"),
            Some((ItemCategory::Medicines, true))
        );

        // Lines with amounts are items, not section headers
        assert_eq!(detect_section_header("TILT TABLE TEST ₹5,000.00"), None);
        assert_eq!(detect_section_header("TILT TABLE TEST"), None);
    }

    #[test]
    fn test_item_classification() {
        assert_eq!(
            classify_item_by_description("TILT TABLE TEST"),
            ItemCategory::DiagnosticsTests
        );
        assert_eq!(classify_item_by_description("MRI BRAIN"), ItemCategory::Radiology);
        assert_eq!(classify_item_by_description("CT SCAN CHEST"), ItemCategory::Radiology);
        assert_eq!(
            classify_item_by_description("CONSULTATION DR SMITH"),
            ItemCategory::Consultation
        );
        assert_eq!(
            classify_item_by_description("TABLET PARACETAMOL 500MG"),
            ItemCategory::Medicines
        );
        assert_eq!(
            classify_item_by_description("ROOM CHARGES - DELUXE"),
            ItemCategory::Hospitalization
        );
        assert_eq!(classify_item_by_description("ZZZZZ"), ItemCategory::Other);
    }

    #[test]
    fn test_section_persistence_across_pages() {
        let mut tracker = SectionTracker::new();
        tracker.add_event(0, 100.0, ItemCategory::DiagnosticsTests, false, "DIAGNOSTICS");

        assert_eq!(tracker.section_at(0, 150.0), Some(ItemCategory::DiagnosticsTests));
        // No new header on page 1: context persists
        assert_eq!(tracker.section_at(1, 50.0), Some(ItemCategory::DiagnosticsTests));

        tracker.add_event(1, 200.0, ItemCategory::Radiology, false, "RADIOLOGY");
        assert_eq!(tracker.section_at(1, 250.0), Some(ItemCategory::Radiology));
        assert_eq!(tracker.section_at(2, 50.0), Some(ItemCategory::Radiology));
        // Positions before the first event have no context
        assert_eq!(tracker.section_at(0, 50.0), None);
    }

    #[test]
    fn test_query_returns_greatest_key_at_or_before() {
        let mut tracker = SectionTracker::new();
        tracker.add_event(0, 100.0, ItemCategory::Medicines, false, "PHARMACY");
        tracker.add_event(0, 200.0, ItemCategory::Radiology, false, "RADIOLOGY");

        assert_eq!(tracker.section_at(0, 100.0), Some(ItemCategory::Medicines));
        assert_eq!(tracker.section_at(0, 199.9), Some(ItemCategory::Medicines));
        assert_eq!(tracker.section_at(0, 200.0), Some(ItemCategory::Radiology));
    }
}
