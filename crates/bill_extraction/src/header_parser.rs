// Stage 1: header field extraction with first-valid-wins locking
// Labelled fields are extracted same-line first, then from the next line
// when the label stands alone. Once a field locks it is never overwritten,
// even by a later page with a higher score.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use bill_core_models::bill::{clean_patient_name, BillHeader, PatientInfo};
use bill_core_models::OcrLine;

use crate::regex_utils::{extract_from_next_line, is_label_only, try_extract_labeled_field};
use crate::zone_detector::{is_header_label, DocumentZones, Zone};

/// Locked header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderField {
    PatientName,
    PatientMrn,
    BillNumber,
    BillingDate,
    HospitalName,
    PatientPhone,
    Gstin,
}

/// A validated value offered to the aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderCandidate {
    pub field: HeaderField,
    pub value: String,
    pub score: f64,
    pub page: u32,
}

static FIELD_PATTERNS: Lazy<Vec<(HeaderField, Vec<Regex>)>> = Lazy::new(|| {
    let compile = |patterns: &[&str]| -> Vec<Regex> {
        patterns
            .iter()
            .map(|p| Regex::new(p).expect("static regex"))
            .collect()
    };
    vec![
        (
            HeaderField::PatientName,
            compile(&[
                r"(?i)patient\s*name\s*[:.]?",
                r"(?i)name\s*of\s*patient\s*[:.]?",
                r"(?i)^name\s*[:.]",
            ]),
        ),
        (
            HeaderField::PatientMrn,
            compile(&[
                r"(?i)(patient\s*)?mrn\s*(no\.?)?\s*[:.]?",
                r"(?i)uhid\s*(no\.?)?\s*[:.]?",
            ]),
        ),
        (
            HeaderField::BillNumber,
            compile(&[
                r"(?i)bill\s*(no|number)\s*[:.#]?",
                r"(?i)invoice\s*(no|number)\s*[:.#]?",
            ]),
        ),
        (
            HeaderField::BillingDate,
            compile(&[
                r"(?i)bill(ing)?\s*date\s*[:.]?",
                r"(?i)date\s*of\s*bill\s*[:.]?",
            ]),
        ),
        (
            HeaderField::HospitalName,
            compile(&[r"(?i)hospital\s*name\s*[:.]?"]),
        ),
        (
            HeaderField::PatientPhone,
            compile(&[r"(?i)(phone|mobile|contact)\s*(no\.?)?\s*[:.]?"]),
        ),
        (HeaderField::Gstin, compile(&[r"(?i)gstin\s*(no\.?)?\s*[:.]?"])),
    ]
});

static BILL_NUMBER_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9/\-]{3,24}$").expect("static regex"));
static DATE_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\d{4}-\d{2}-\d{2}|\d{1,2}\s+[A-Za-z]{3,9}\s+\d{2,4})$")
        .expect("static regex")
});
static MRN_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{0,4}\d{6,20}$").expect("static regex"));
static PHONE_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?\d{10,13}$").expect("static regex"));
static GSTIN_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{2}[A-Z0-9]{13}$").expect("static regex"));
static SALUTATION_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(mr|mrs|ms|miss|master|baby|dr)\.?\s+[A-Za-z][A-Za-z. ]{2,50}$")
        .expect("static regex")
});
static ALL_CAPS_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z][A-Z.]*(?:\s+[A-Z][A-Z.]*){1,3}$").expect("static regex")
});
static NON_NAME_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(hospital|clinic|centre|center|lab|laboratory|pharmacy|receipt|total|invoice|bill|payment|ward|room|department|services?|multispecial(i)?ty|medical)\b",
    )
    .expect("static regex")
});

/// Validate a candidate value for its field.
#[must_use]
pub fn validate_field(field: HeaderField, value: &str) -> bool {
    let value = value.trim();
    match field {
        HeaderField::PatientName => {
            let cleaned = clean_patient_name(value);
            cleaned.len() >= 2
                && cleaned.len() <= 60
                && cleaned.chars().filter(|c| c.is_alphabetic()).count() >= 2
                && !cleaned.chars().any(|c| c.is_ascii_digit())
                && !NON_NAME_WORDS.is_match(&cleaned)
        }
        HeaderField::PatientMrn => MRN_SHAPE.is_match(value),
        HeaderField::BillNumber => {
            BILL_NUMBER_SHAPE.is_match(value)
                && value.chars().any(|c| c.is_ascii_digit())
                && !DATE_SHAPE.is_match(value)
        }
        HeaderField::BillingDate => DATE_SHAPE.is_match(value),
        HeaderField::HospitalName => {
            value.len() >= 4
                && value.len() <= 80
                && value.chars().filter(|c| c.is_alphabetic()).count() >= 2
        }
        HeaderField::PatientPhone => PHONE_SHAPE.is_match(value),
        HeaderField::Gstin => GSTIN_SHAPE.is_match(&value.to_uppercase()),
    }
}

/// First-valid-wins header field store.
///
/// Offering the same field twice accepts once and rejects once; a lock is
/// permanent for the document.
#[derive(Debug, Default)]
pub struct HeaderAggregator {
    locked: HashMap<HeaderField, HeaderCandidate>,
}

impl HeaderAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a candidate. Returns whether the field locked on this offer.
    pub fn offer(&mut self, candidate: HeaderCandidate) -> bool {
        if self.locked.contains_key(&candidate.field) {
            return false;
        }
        if !validate_field(candidate.field, &candidate.value) {
            return false;
        }
        debug!(field = ?candidate.field, page = candidate.page, "header field locked");
        self.locked.insert(candidate.field, candidate);
        true
    }

    #[must_use]
    pub fn get(&self, field: HeaderField) -> Option<&str> {
        self.locked.get(&field).map(|c| c.value.as_str())
    }

    #[must_use]
    pub fn is_locked(&self, field: HeaderField) -> bool {
        self.locked.contains_key(&field)
    }
}

/// Stage-1 parser over all non-payment lines
pub struct HeaderParser;

impl HeaderParser {
    /// Extract header metadata and patient identity.
    ///
    /// `lines` must already be sorted by `(page, y)`; ties keep input order,
    /// which makes locking deterministic.
    #[must_use]
    pub fn parse(lines: &[OcrLine], zones: &DocumentZones) -> (BillHeader, PatientInfo) {
        let mut aggregator = HeaderAggregator::new();
        let mut header = BillHeader::default();

        let candidate_lines: Vec<&OcrLine> = lines
            .iter()
            .filter(|l| zones.zone_for_line(l) != Zone::Payment)
            .collect();

        for (idx, line) in candidate_lines.iter().enumerate() {
            for (field, patterns) in FIELD_PATTERNS.iter() {
                let mut extracted = try_extract_labeled_field(&line.text, patterns, 1);

                if extracted.is_none() && is_label_only(&line.text, patterns) {
                    if let Some(next) = candidate_lines.get(idx + 1) {
                        if next.page == line.page {
                            extracted = extract_from_next_line(&line.text, &next.text, patterns);
                        }
                    }
                }

                let Some(value) = extracted else { continue };

                // Bill numbers are collected beyond the primary lock.
                if *field == HeaderField::BillNumber && validate_field(*field, &value) {
                    header.add_bill_number(&value);
                }

                aggregator.offer(HeaderCandidate {
                    field: *field,
                    value,
                    score: 0.9,
                    page: line.page,
                });
            }
        }

        if !aggregator.is_locked(HeaderField::PatientName) {
            Self::fallback_patient_name(&candidate_lines, &mut aggregator);
        }

        header.billing_date = aggregator.get(HeaderField::BillingDate).map(String::from);
        header.hospital_name = aggregator.get(HeaderField::HospitalName).map(String::from);
        header.gstin = aggregator
            .get(HeaderField::Gstin)
            .map(|g| g.to_uppercase());
        if header.primary_bill_number.is_none() {
            if let Some(number) = aggregator.get(HeaderField::BillNumber) {
                header.add_bill_number(number);
            }
        }

        let patient = PatientInfo {
            name: aggregator
                .get(HeaderField::PatientName)
                .map_or_else(|| "UNKNOWN".to_string(), clean_patient_name),
            mrn: aggregator.get(HeaderField::PatientMrn).map(String::from),
            gender: None,
            age: None,
            phone: aggregator.get(HeaderField::PatientPhone).map(String::from),
        };

        (header, patient)
    }

    /// Last-resort patient name scan: salutation-prefixed or all-caps 2-4
    /// word lines on the first two pages.
    fn fallback_patient_name(lines: &[&OcrLine], aggregator: &mut HeaderAggregator) {
        for line in lines.iter().filter(|l| l.page <= 1) {
            let text = line.text.trim();
            if is_header_label(text) || NON_NAME_WORDS.is_match(text) {
                continue;
            }
            if !SALUTATION_NAME.is_match(text) && !ALL_CAPS_NAME.is_match(text) {
                continue;
            }
            if aggregator.offer(HeaderCandidate {
                field: HeaderField::PatientName,
                value: text.to_string(),
                score: 0.5,
                page: line.page,
            }) {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str, page: u32, y: f32) -> OcrLine {
        OcrLine {
            text: text.to_string(),
            confidence: 0.9,
            bbox: [(0.0, y), (100.0, y), (100.0, y + 10.0), (0.0, y + 10.0)],
            page,
        }
    }

    #[test]
    fn test_first_valid_wins_locking() {
        let mut aggregator = HeaderAggregator::new();
        let first = aggregator.offer(HeaderCandidate {
            field: HeaderField::BillNumber,
            value: "BL123456".to_string(),
            score: 0.9,
            page: 0,
        });
        let second = aggregator.offer(HeaderCandidate {
            field: HeaderField::BillNumber,
            value: "BL999999".to_string(),
            score: 1.0,
            page: 1,
        });
        assert!(first);
        assert!(!second);
        assert_eq!(aggregator.get(HeaderField::BillNumber), Some("BL123456"));
    }

    #[test]
    fn test_offer_same_value_twice_accepts_once() {
        let mut aggregator = HeaderAggregator::new();
        let candidate = HeaderCandidate {
            field: HeaderField::PatientName,
            value: "John Doe".to_string(),
            score: 0.9,
            page: 0,
        };
        assert!(aggregator.offer(candidate.clone()));
        assert!(!aggregator.offer(candidate));
    }

    #[test]
    fn test_field_validation() {
        assert!(validate_field(HeaderField::PatientName, "John Doe"));
        assert!(validate_field(HeaderField::PatientName, "John Doe (10010001143682)"));
        assert!(!validate_field(HeaderField::PatientName, "BL123456"));
        assert!(!validate_field(HeaderField::PatientName, "City Care Hospital"));
        assert!(validate_field(HeaderField::PatientMrn, "10010001143682"));
        assert!(!validate_field(HeaderField::PatientMrn, "John"));
        assert!(validate_field(HeaderField::BillNumber, "BL123456"));
        assert!(!validate_field(HeaderField::BillNumber, "17/01/2026"));
        assert!(validate_field(HeaderField::BillingDate, "17/01/2026"));
        assert!(validate_field(HeaderField::PatientPhone, "9876543210"));
    }

    #[test]
    fn test_same_line_and_next_line_extraction() {
        let lines = vec![
            line("Patient Name:", 0, 10.0),
            line("John Doe", 0, 20.0),
            line("Patient MRN: 10010001143682", 0, 30.0),
            line("Bill No: BL123456", 0, 50.0),
        ];
        let zones = DocumentZones::detect(&lines);
        let (header, patient) = HeaderParser::parse(&lines, &zones);

        assert_eq!(patient.name, "John Doe");
        assert_eq!(patient.mrn.as_deref(), Some("10010001143682"));
        assert_eq!(header.primary_bill_number.as_deref(), Some("BL123456"));
        assert_eq!(header.bill_numbers, vec!["BL123456"]);
    }

    #[test]
    fn test_fallback_name_skips_payment_zone() {
        let lines = vec![
            line("Total Paid", 0, 100.0),
            line("MR. JOHN DOE", 0, 120.0),
        ];
        let zones = DocumentZones::detect(&lines);
        let (_, patient) = HeaderParser::parse(&lines, &zones);
        // The salutation line sits below payment_start_y, so it is never read
        assert_eq!(patient.name, "UNKNOWN");
    }

    #[test]
    fn test_phone_never_becomes_a_name() {
        let lines = vec![line("Patient Phone: 9876543210", 0, 10.0)];
        let zones = DocumentZones::detect(&lines);
        let (_, patient) = HeaderParser::parse(&lines, &zones);
        assert_eq!(patient.name, "UNKNOWN");
        assert_eq!(patient.phone.as_deref(), Some("9876543210"));
    }

    #[test]
    fn test_all_caps_fallback_name() {
        let lines = vec![
            line("SUNRISE MULTISPECIALITY", 0, 5.0),
            line("JOHN A DOE", 0, 20.0),
        ];
        let zones = DocumentZones::detect(&lines);
        let (_, patient) = HeaderParser::parse(&lines, &zones);
        assert_eq!(patient.name, "JOHN A DOE");
    }
}
