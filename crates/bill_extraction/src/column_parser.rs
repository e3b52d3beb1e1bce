// Column parsing for bill item rows
// Parses qty / unit-rate / amount out of row fragments with semantic
// context filtering, so identifiers (MRN, bill no, age, phone) never
// contaminate amounts.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use bill_core_models::round2;

use crate::numeric_guards::{extract_numeric_value, is_suspect_numeric, validate_amount};

static IDENTIFIER_CONTEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(bill\s*no|invoice\s*no|receipt\s*no|mrn|uhid|ipd|opd|visit\s*no|phone|mobile|contact|age|dob|date\s*of\s*birth|gstin|reg\s*no|pin\s*code)\b",
    )
    .expect("static regex")
});

static NON_BILLABLE_SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(sub\s*-?\s*total|grand\s*total|total\s*amount|net\s*amount|balance|payable|payment|received|rounded?\s*off|amount\s*in\s*words)\b|^\s*total\b",
    )
    .expect("static regex")
});

/// Threshold under which a leading number reads as a quantity, not a rate.
const QTY_UPPER_BOUND: f64 = 100.0;

/// Amount fields parsed out of one row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedAmounts {
    pub qty: f64,
    pub unit_rate: Option<f64>,
    pub pdf_amount: Option<f64>,
    pub computed_amount: Option<f64>,
    pub final_amount: f64,
    pub discrepancy: bool,
}

/// True for summary/footer rows that must never become items.
#[must_use]
pub fn is_non_billable_section(description: &str) -> bool {
    NON_BILLABLE_SECTION.is_match(description)
}

/// An item description needs at least two alphabetic characters.
#[must_use]
pub fn has_valid_description(description: &str) -> bool {
    description.chars().filter(|c| c.is_alphabetic()).count() >= 2
}

/// Parse the numeric columns of one row into qty / rate / amount.
///
/// Columns are rejected when the accumulated row context carries an
/// identifier keyword, or when the column itself is a suspect numeric.
/// The survivors are assigned by arity: a single number is the amount, a
/// pair is qty+amount or rate+amount depending on magnitude, and with
/// three or more the last three are qty, rate, amount.
#[must_use]
pub fn parse_columns(description: &str, columns: &[String], tolerance: f64) -> Option<ParsedAmounts> {
    let mut context = description.to_lowercase();
    let mut values: Vec<f64> = Vec::new();

    for column in columns {
        let rejected = IDENTIFIER_CONTEXT.is_match(&context)
            || is_suspect_numeric(column);
        if !rejected {
            if let Some(value) = extract_numeric_value(column) {
                values.push(value);
            }
        }
        context.push(' ');
        context.push_str(&column.to_lowercase());
    }

    let (qty, unit_rate, pdf_amount) = match values.len() {
        0 => return None,
        1 => (1.0, None, Some(values[0])),
        2 => {
            if values[0] < QTY_UPPER_BOUND {
                (values[0], None, Some(values[1]))
            } else {
                (1.0, Some(values[0]), Some(values[1]))
            }
        }
        n => (values[n - 3], Some(values[n - 2]), Some(values[n - 1])),
    };

    Some(resolve_amounts(qty, unit_rate, pdf_amount, tolerance))
}

/// Derive computed/final amounts and the discrepancy flag.
#[must_use]
pub fn resolve_amounts(
    qty: f64,
    unit_rate: Option<f64>,
    pdf_amount: Option<f64>,
    tolerance: f64,
) -> ParsedAmounts {
    let computed_amount = unit_rate.map(|rate| round2(qty * rate));

    let (final_amount, discrepancy) = match (pdf_amount, computed_amount) {
        (Some(pdf), Some(computed)) => {
            if (pdf - computed).abs() > tolerance {
                (pdf, true)
            } else {
                (computed, false)
            }
        }
        (Some(pdf), None) => (pdf, false),
        (None, Some(computed)) => (computed, false),
        (None, None) => (0.0, false),
    };

    ParsedAmounts {
        qty,
        unit_rate,
        pdf_amount,
        computed_amount,
        final_amount: round2(final_amount),
        discrepancy,
    }
}

/// Full row validity: a positive in-range amount and a real description.
#[must_use]
pub fn is_valid_item(description: &str, amounts: &ParsedAmounts) -> bool {
    validate_amount(amounts.final_amount)
        && has_valid_description(description)
        && !is_non_billable_section(description)
}
