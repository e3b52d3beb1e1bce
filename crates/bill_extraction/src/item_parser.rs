// Stage 2: line item and discount extraction
// Each row block in the item zone is either a discount (split into the
// summary) or a billable item categorised through the section tracker.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use bill_core_models::{
    Discount, DiscountKind, ItemBlock, ItemCategory, LineItem,
};

use crate::column_parser::{is_non_billable_section, is_valid_item, parse_columns, ParsedAmounts};
use crate::config::ExtractionConfig;
use crate::numeric_guards::extract_numeric_value;
use crate::payment_parser::is_paymentish;
use crate::section_tracker::{
    classify_item_by_description, is_regulated_pricing_text, SectionTracker,
};
use crate::zone_detector::{is_header_label, DocumentZones, Zone};

static DISCOUNT_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(discount|concession|waiver|rebate)\b").expect("static regex"));
static SPONSOR_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(sponsor|tpa|corporate|insurance|employer)\b").expect("static regex"));
static PATIENT_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(patient|self)\b").expect("static regex"));
static TRAILING_LABELED_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[:\-]\s*₹?\s*([\d,]+\.?\d*)\s*$").expect("static regex"));
static INLINE_RUPEE_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"₹\s*([\d,]+\.?\d*)").expect("static regex"));
static TRAILING_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(₹?\s*[\d,]+\.\d{2})\s*$").expect("static regex"));

/// Items and discounts produced by stage 2
#[derive(Debug, Default)]
pub struct ItemParserOutput {
    pub items: Vec<LineItem>,
    pub discounts: Vec<Discount>,
    pub warnings: Vec<String>,
}

/// Stage-2 parser over row blocks
pub struct ItemParser;

impl ItemParser {
    /// Walk the blocks in `(page, y)` order and emit items and discounts.
    #[must_use]
    pub fn parse(
        blocks: &[ItemBlock],
        zones: &DocumentZones,
        config: &ExtractionConfig,
    ) -> ItemParserOutput {
        let tracker = Self::build_tracker(zones);
        let mut output = ItemParserOutput::default();

        for block in blocks {
            let description = block
                .description
                .clone()
                .unwrap_or_else(|| block.text.clone());

            if zones.zone_for_position(block.page, block.y, &block.text) != Zone::Items {
                continue;
            }
            if is_paymentish(&block.text) || is_header_label(&description) {
                continue;
            }
            if is_non_billable_section(&description) {
                continue;
            }

            if DISCOUNT_ROW.is_match(&description) {
                if let Some(discount) = Self::parse_discount(block, &description) {
                    debug!(page = block.page, kind = ?discount.kind, "discount row split out");
                    output.discounts.push(discount);
                } else {
                    warn!(page = block.page, "discount row without an amount: {description}");
                    output
                        .warnings
                        .push(format!("discount row without an amount: {description}"));
                }
                continue;
            }

            let Some(amounts) = Self::parse_amounts(block, &description, config) else {
                continue;
            };
            if !is_valid_item(&description, &amounts) {
                continue;
            }

            output
                .items
                .push(Self::build_item(block, &description, amounts, &tracker));
        }

        output
    }

    /// Seed the tracker with every page's section headers.
    fn build_tracker(zones: &DocumentZones) -> SectionTracker {
        let mut tracker = SectionTracker::new();
        for page in zones.pages() {
            for mark in &page.section_headers {
                tracker.add_event(page.page, mark.y, mark.category, mark.regulated, &mark.raw_text);
            }
        }
        tracker
    }

    fn parse_amounts(
        block: &ItemBlock,
        description: &str,
        config: &ExtractionConfig,
    ) -> Option<ParsedAmounts> {
        if !block.columns.is_empty() {
            return parse_columns(description, &block.columns, config.amount_tolerance);
        }
        // Line-based fallback: a trailing printed amount with unit quantity.
        let amount = TRAILING_AMOUNT
            .captures(&block.text)
            .and_then(|c| extract_numeric_value(&c[1]))?;
        Some(crate::column_parser::resolve_amounts(
            1.0,
            None,
            Some(amount),
            config.amount_tolerance,
        ))
    }

    fn build_item(
        block: &ItemBlock,
        description: &str,
        amounts: ParsedAmounts,
        tracker: &SectionTracker,
    ) -> LineItem {
        let section_event = tracker.event_at(block.page, block.y);
        let mut regulated = is_regulated_pricing_text(description);
        let (category, section_raw) = match section_event {
            Some(event) => {
                regulated |= event.regulated;
                (event.category, Some(event.raw_text.clone()))
            }
            None => (classify_item_by_description(description), None),
        };
        let category = if regulated { ItemCategory::Medicines } else { category };

        let mut item = LineItem::new(
            description,
            amounts.qty,
            amounts.unit_rate,
            amounts.pdf_amount,
            amounts.computed_amount,
            amounts.final_amount,
            amounts.discrepancy,
            category,
            block.page,
        );
        item.section_raw = section_raw;
        item.is_regulated_pricing = regulated;
        item
    }

    /// Classify and price a discount row.
    ///
    /// Amount preference: trailing labelled amount, inline rupee amount,
    /// last numeric column.
    fn parse_discount(block: &ItemBlock, description: &str) -> Option<Discount> {
        let amount = TRAILING_LABELED_AMOUNT
            .captures(&block.text)
            .and_then(|c| extract_numeric_value(&c[1]))
            .or_else(|| {
                INLINE_RUPEE_AMOUNT
                    .captures(&block.text)
                    .and_then(|c| extract_numeric_value(&c[1]))
            })
            .or_else(|| {
                block
                    .columns
                    .iter()
                    .rev()
                    .find_map(|c| extract_numeric_value(c))
            })?;

        if amount <= 0.0 {
            return None;
        }

        let kind = if PATIENT_WORDS.is_match(description) {
            DiscountKind::Patient
        } else if SPONSOR_WORDS.is_match(description) {
            DiscountKind::Sponsor
        } else {
            DiscountKind::General
        };

        Some(Discount::new(description, amount, kind, block.page))
    }
}
