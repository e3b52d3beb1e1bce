//! Structured bill document types
//!
//! One uploaded document produces exactly one `BillDocument`. Payments and
//! receipts are not medical services and are kept apart from the item map;
//! discounts are summarised separately and never contribute to the grand
//! total.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::category::ItemCategory;
use crate::ids;
use crate::round2;

static LEADING_ITEM_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[?\d+\.?\s*").expect("static regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static TRAILING_MRN_PARENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([0-9]{6,}\)\s*$").expect("static regex"));

/// Normalise a line-item description: strip a leading serial number and
/// collapse runs of whitespace.
#[must_use]
pub fn clean_description(raw: &str) -> String {
    let stripped = LEADING_ITEM_NUMBER.replace(raw, "");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

/// Normalise a patient name: drop a trailing parenthesised MRN.
#[must_use]
pub fn clean_patient_name(raw: &str) -> String {
    let stripped = TRAILING_MRN_PARENS.replace(raw, "");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

/// A single billable medical service extracted from the document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Content-derived stable id
    pub item_id: String,
    pub description: String,
    pub qty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_rate: Option<f64>,
    /// Amount as printed in the document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_amount: Option<f64>,
    /// qty × unit_rate when both are present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed_amount: Option<f64>,
    /// The amount carried into subtotals
    pub final_amount: f64,
    /// True when pdf and computed amounts disagree beyond tolerance
    pub discrepancy: bool,
    pub category: ItemCategory,
    pub confidence: f64,
    pub page: u32,
    /// Raw section header text this item was filed under, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_raw: Option<String>,
    /// DPCO/NLEM price-regulated item
    pub is_regulated_pricing: bool,
}

impl LineItem {
    /// Build a line item, cleaning the description, rounding the amount and
    /// deriving the stable id.
    #[must_use]
    pub fn new(
        description: &str,
        qty: f64,
        unit_rate: Option<f64>,
        pdf_amount: Option<f64>,
        computed_amount: Option<f64>,
        final_amount: f64,
        discrepancy: bool,
        category: ItemCategory,
        page: u32,
    ) -> Self {
        let description = clean_description(description);
        let final_amount = round2(final_amount);
        let item_id = ids::line_item_id(category, final_amount, &description, page);
        Self {
            item_id,
            description,
            qty,
            unit_rate,
            pdf_amount,
            computed_amount,
            final_amount,
            discrepancy,
            category,
            confidence: 1.0,
            page,
            section_raw: None,
            is_regulated_pricing: false,
        }
    }
}

/// Kind of discount row found in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    Patient,
    Sponsor,
    General,
}

/// A discount row; tracked in the summary, never a billable item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discount {
    pub discount_id: String,
    pub description: String,
    pub amount: f64,
    pub kind: DiscountKind,
    pub page: u32,
}

impl Discount {
    #[must_use]
    pub fn new(description: &str, amount: f64, kind: DiscountKind, page: u32) -> Self {
        let amount = round2(amount);
        Self {
            discount_id: ids::discount_id(description, amount, page),
            description: clean_description(description),
            amount,
            kind,
            page,
        }
    }
}

/// A payment/receipt entry detected in the document.
///
/// Emitted for diagnostics only; excluded from all totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub payment_id: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// e.g. RCPO-..., UTR, TXN
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// e.g. CASH/CARD/UPI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    pub page: u32,
}

/// Patient information extracted from the header zone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Default for PatientInfo {
    fn default() -> Self {
        Self {
            name: "UNKNOWN".to_string(),
            mrn: None,
            gender: None,
            age: None,
            phone: None,
        }
    }
}

/// Bill header / metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillHeader {
    /// First locked bill number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_bill_number: Option<String>,
    /// All distinct bill numbers in document order
    #[serde(default)]
    pub bill_numbers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gstin: Option<String>,
}

impl BillHeader {
    /// Record a bill number, keeping order and dropping duplicates.
    pub fn add_bill_number(&mut self, number: &str) {
        let number = number.trim();
        if number.is_empty() {
            return;
        }
        if self.primary_bill_number.is_none() {
            self.primary_bill_number = Some(number.to_string());
        }
        if !self.bill_numbers.iter().any(|n| n == number) {
            self.bill_numbers.push(number.to_string());
        }
    }
}

/// Per-kind discount totals with the underlying rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscountSummary {
    pub patient: f64,
    pub sponsor: f64,
    pub general: f64,
    pub total: f64,
    #[serde(default)]
    pub details: Vec<Discount>,
}

impl DiscountSummary {
    pub fn add(&mut self, discount: Discount) {
        match discount.kind {
            DiscountKind::Patient => self.patient = round2(self.patient + discount.amount),
            DiscountKind::Sponsor => self.sponsor = round2(self.sponsor + discount.amount),
            DiscountKind::General => self.general = round2(self.general + discount.amount),
        }
        self.total = round2(self.patient + self.sponsor + self.general);
        self.details.push(discount);
    }
}

/// Financial summary attached to the document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillSummary {
    pub discounts: DiscountSummary,
}

/// One uploaded document = one structured bill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillDocument {
    pub upload_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub page_count: u32,
    pub extraction_date: DateTime<Utc>,
    pub header: BillHeader,
    pub patient: PatientInfo,
    /// Billable items grouped by category
    pub items: BTreeMap<ItemCategory, Vec<LineItem>>,
    /// Payments kept apart from medical services
    #[serde(default)]
    pub payments: Vec<PaymentEvent>,
    pub subtotals: BTreeMap<ItemCategory, f64>,
    pub summary: BillSummary,
    pub grand_total: f64,
    #[serde(default)]
    pub extraction_warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_excerpt: Option<String>,
}

impl BillDocument {
    /// Create an empty document shell for the given upload.
    #[must_use]
    pub fn new(upload_id: String, source: Option<String>, page_count: u32) -> Self {
        Self {
            upload_id,
            source,
            page_count,
            extraction_date: Utc::now(),
            header: BillHeader::default(),
            patient: PatientInfo::default(),
            items: BTreeMap::new(),
            payments: Vec::new(),
            subtotals: BTreeMap::new(),
            summary: BillSummary::default(),
            grand_total: 0.0,
            extraction_warnings: Vec::new(),
            raw_excerpt: None,
        }
    }

    /// File an item under its category.
    pub fn push_item(&mut self, item: LineItem) {
        self.items.entry(item.category).or_default().push(item);
    }

    /// Recompute per-category subtotals from `final_amount`.
    pub fn calculate_subtotals(&mut self) {
        self.subtotals = self
            .items
            .iter()
            .map(|(category, items)| {
                (
                    *category,
                    round2(items.iter().map(|i| i.final_amount).sum()),
                )
            })
            .collect();
    }

    /// Recompute the grand total as the sum of subtotals.
    pub fn calculate_grand_total(&mut self) -> f64 {
        if self.subtotals.is_empty() && !self.items.is_empty() {
            self.calculate_subtotals();
        }
        self.grand_total = round2(self.subtotals.values().sum());
        self.grand_total
    }

    /// Every billable item across all categories, in category order.
    pub fn all_items(&self) -> impl Iterator<Item = &LineItem> {
        self.items.values().flatten()
    }
}
