// Zone detection for bill documents
// Labels each positioned line as Header / Items / Payment from per-page
// boundaries. Only page 0 treats the pre-table area as header-by-position;
// later pages require an explicit header label.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use bill_core_models::{ItemCategory, OcrLine};

use crate::section_tracker::detect_section_header;

static HEADER_LABEL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^\s*patient\s*(name|mrn|id|no)\b",
        r"(?i)^\s*name\s*of\s*patient\b",
        r"(?i)^\s*(uhid|mrn|ipd|opd)\s*(no\.?)?\s*[:#]?",
        r"(?i)^\s*gender\s*[/|]?\s*age\b",
        r"(?i)\bgender\s*\|\s*age\b",
        r"(?i)^\s*(dob|date\s*of\s*birth)\b",
        r"(?i)^\s*address\s*[:.]?",
        r"(?i)^\s*(bill|invoice)\s*(no|number|date)\b",
        r"(?i)^\s*visit\s*(no|number)\b",
        r"(?i)^\s*(phone|mobile|contact)\s*(no\.?)?\s*[:.]?",
        r"(?i)^\s*consultant\b",
        r"(?i)^\s*ref(erring)?\.?\s*(doctor|dr)\b",
        r"(?i)^\s*gstin\b",
        r"(?i)^\s*hospital\s*name\b",
        r"(?i)^\s*admission\s*date\b",
        r"(?i)^\s*discharge\s*date\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

static PAYMENT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bRCPO-?\w*",
        r"(?i)\breceipt\s*(no|number|#)\b",
        r"(?i)\b(utr|txn|rrn)\b",
        r"(?i)\btotal\s*paid\b",
        r"(?i)\bamount\s*paid\b",
        r"(?i)\bbalance\s*(due|to\s*pay)\b",
        r"(?i)\bmode\s*of\s*payment\b",
        r"(?i)\bpayment\s*(mode|received|details)\b",
        r"(?i)\b(cash|card|upi|neft|rtgs|imps|cheque)\s*payment\b",
        r"(?i)\bpaid\s*by\s*(cash|card|upi|neft|rtgs|cheque)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

static TABLE_START_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^\s*(s|sl|sr)\.?\s*no\.?\b",
        r"(?i)\b(description|particulars|service\s*details?)\b",
        r"(?i)\bqty\b.*\b(rate|amount)\b",
        r"(?i)\bquantity\b.*\bamount\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

/// Zone classification for one line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Header,
    Items,
    Payment,
}

/// A section header found inside the item zone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionHeaderMark {
    pub y: f32,
    pub category: ItemCategory,
    pub regulated: bool,
    pub raw_text: String,
}

/// Zone boundaries for one page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageZones {
    pub page: u32,
    /// Smallest y whose text looks like the item-table header row
    pub header_end_y: Option<f32>,
    /// Smallest y whose text looks like the payment block
    pub payment_start_y: Option<f32>,
    /// Section headers in y order
    pub section_headers: Vec<SectionHeaderMark>,
}

/// Zone boundaries for the whole document
#[derive(Debug, Clone, Default)]
pub struct DocumentZones {
    pages: BTreeMap<u32, PageZones>,
}

/// True when the text is a patient/bill metadata label.
#[must_use]
pub fn is_header_label(text: &str) -> bool {
    HEADER_LABEL_PATTERNS.iter().any(|p| p.is_match(text))
}

/// True when the text belongs to the payment/receipt block.
#[must_use]
pub fn is_payment_zone_text(text: &str) -> bool {
    PAYMENT_PATTERNS.iter().any(|p| p.is_match(text))
}

/// True when the text looks like the item-table header row.
#[must_use]
pub fn is_table_start(text: &str) -> bool {
    TABLE_START_PATTERNS.iter().any(|p| p.is_match(text))
}

impl DocumentZones {
    /// Scan all lines and derive per-page boundaries.
    #[must_use]
    pub fn detect(lines: &[OcrLine]) -> Self {
        let mut pages: BTreeMap<u32, PageZones> = BTreeMap::new();

        for line in lines {
            let y = line.top_y();
            let entry = pages.entry(line.page).or_insert_with(|| PageZones {
                page: line.page,
                header_end_y: None,
                payment_start_y: None,
                section_headers: Vec::new(),
            });

            if is_table_start(&line.text) {
                entry.header_end_y = Some(match entry.header_end_y {
                    Some(existing) => existing.min(y),
                    None => y,
                });
            }
            if is_payment_zone_text(&line.text) {
                entry.payment_start_y = Some(match entry.payment_start_y {
                    Some(existing) => existing.min(y),
                    None => y,
                });
            }
            if let Some((category, regulated)) = detect_section_header(&line.text) {
                entry.section_headers.push(SectionHeaderMark {
                    y,
                    category,
                    regulated,
                    raw_text: line.text.trim().to_string(),
                });
            }
        }

        for zones in pages.values_mut() {
            zones
                .section_headers
                .sort_by(|a, b| a.y.total_cmp(&b.y));
        }

        Self { pages }
    }

    /// Boundaries for one page, if any line landed there.
    #[must_use]
    pub fn page(&self, page: u32) -> Option<&PageZones> {
        self.pages.get(&page)
    }

    /// All pages in order.
    pub fn pages(&self) -> impl Iterator<Item = &PageZones> {
        self.pages.values()
    }

    /// Classify a line against its page's boundaries.
    ///
    /// Pure in the line and the detected boundaries: header labels always
    /// win, payment text always beats position, and only page 0 uses the
    /// pre-table region as an implicit header zone.
    #[must_use]
    pub fn zone_for_line(&self, line: &OcrLine) -> Zone {
        self.zone_for_position(line.page, line.top_y(), &line.text)
    }

    /// Same classification for an arbitrary positioned text (row blocks).
    #[must_use]
    pub fn zone_for_position(&self, page: u32, y: f32, text: &str) -> Zone {
        if is_header_label(text) {
            return Zone::Header;
        }
        if is_payment_zone_text(text) {
            return Zone::Payment;
        }

        if let Some(zones) = self.pages.get(&page) {
            if page == 0 {
                if let Some(header_end) = zones.header_end_y {
                    if y < header_end {
                        return Zone::Header;
                    }
                }
            }
            if let Some(payment_start) = zones.payment_start_y {
                if y >= payment_start {
                    return Zone::Payment;
                }
            }
        }
        Zone::Items
    }
}
