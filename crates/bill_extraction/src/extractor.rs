// Bill extraction orchestrator
// Drives the three stages over sorted lines, computes subtotals and the
// grand total, and enforces the payment-isolation invariant before the
// document leaves the extractor.

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use bill_core_models::{BillDocument, ItemBlock, OcrLine, OcrResult};

use crate::block_builder::build_blocks;
use crate::config::ExtractionConfig;
use crate::header_parser::HeaderParser;
use crate::item_parser::ItemParser;
use crate::numeric_guards::{validate_grand_total, MAX_GRAND_TOTAL};
use crate::payment_parser::{is_paymentish, PaymentParser};
use crate::zone_detector::DocumentZones;

/// Extraction errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// A hard invariant was violated; the bill is aborted
    #[error("Structural invariant violation: {0}")]
    StructuralInvariantViolation(String),

    /// The OCR input cannot be processed at all
    #[error("Invalid OCR input: {0}")]
    InvalidInput(String),
}

/// Three-stage bill extractor
pub struct BillExtractor {
    config: ExtractionConfig,
}

impl Default for BillExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl BillExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ExtractionConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_config(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Extract a structured bill from positioned OCR output.
    ///
    /// Produces a complete document (possibly with warnings) or no document
    /// at all: soft problems are recorded as warnings, a payment reference
    /// leaking into the item map aborts the bill.
    ///
    /// # Errors
    /// `StructuralInvariantViolation` when a payment-like description
    /// survives into the items; `InvalidInput` when the OCR result carries
    /// neither lines nor blocks.
    pub fn extract(
        &self,
        ocr: &OcrResult,
        upload_id: Option<String>,
        source: Option<String>,
    ) -> Result<BillDocument, ExtractionError> {
        if ocr.lines.is_empty() && ocr.item_blocks.as_ref().map_or(true, Vec::is_empty) {
            return Err(ExtractionError::InvalidInput(
                "OCR result has neither lines nor item blocks".to_string(),
            ));
        }

        let mut lines: Vec<OcrLine> = ocr.lines.clone();
        lines.sort_by(|a, b| {
            a.page
                .cmp(&b.page)
                .then_with(|| a.top_y().total_cmp(&b.top_y()))
        });

        let zones = DocumentZones::detect(&lines);
        let (header, patient) = HeaderParser::parse(&lines, &zones);

        let blocks = self.resolve_blocks(ocr, &lines);
        let stage2 = ItemParser::parse(&blocks, &zones, &self.config);
        let payments = PaymentParser::parse(&blocks, &zones);

        let upload_id = upload_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut doc = BillDocument::new(upload_id, source, ocr.page_count());
        doc.header = header;
        doc.patient = patient;
        doc.extraction_warnings = stage2.warnings;

        let discrepancies = stage2.items.iter().filter(|i| i.discrepancy).count();
        for item in stage2.items {
            doc.push_item(item);
        }
        for discount in stage2.discounts {
            doc.summary.discounts.add(discount);
        }
        if self.config.retain_payments {
            doc.payments = payments;
        }

        doc.calculate_subtotals();
        doc.calculate_grand_total();
        if let Err(reason) = validate_grand_total(doc.grand_total) {
            warn!(grand_total = doc.grand_total, "grand total exceeds cap");
            doc.extraction_warnings.push(format!("{reason}; capped"));
            doc.grand_total = MAX_GRAND_TOTAL;
        }

        if discrepancies > 0 {
            doc.extraction_warnings
                .push(format!("{discrepancies} item(s) with qty x rate discrepancy"));
        }
        if doc.patient.name == "UNKNOWN" {
            doc.extraction_warnings
                .push("patient identification missing".to_string());
        }
        if doc.header.primary_bill_number.is_none() {
            doc.extraction_warnings.push("bill number missing".to_string());
        }

        if let Some(raw) = &ocr.raw_text {
            if self.config.raw_excerpt_len > 0 {
                doc.raw_excerpt = Some(raw.chars().take(self.config.raw_excerpt_len).collect());
            }
        }

        Self::post_validate(&doc)?;

        info!(
            upload_id = %doc.upload_id,
            items = doc.all_items().count(),
            payments = doc.payments.len(),
            grand_total = doc.grand_total,
            "bill extracted"
        );
        Ok(doc)
    }

    /// Prefer pre-grouped blocks; otherwise reconstruct rows by y-clustering.
    fn resolve_blocks(&self, ocr: &OcrResult, sorted_lines: &[OcrLine]) -> Vec<ItemBlock> {
        match &ocr.item_blocks {
            Some(blocks) if !blocks.is_empty() => {
                let mut blocks = blocks.clone();
                blocks.sort_by(|a, b| a.page.cmp(&b.page).then_with(|| a.y.total_cmp(&b.y)));
                blocks
            }
            _ => build_blocks(sorted_lines, self.config.y_cluster_threshold),
        }
    }

    /// Hard invariant: no payment reference may survive into the items.
    fn post_validate(doc: &BillDocument) -> Result<(), ExtractionError> {
        for item in doc.all_items() {
            let upper = item.description.to_uppercase();
            if upper.contains("RCPO") || upper.contains("RCP-") || is_paymentish(&item.description) {
                return Err(ExtractionError::StructuralInvariantViolation(format!(
                    "payment reference leaked into items: {}",
                    item.description
                )));
            }
        }
        Ok(())
    }
}

/// Convenience wrapper with default configuration.
///
/// # Errors
/// See [`BillExtractor::extract`].
pub fn extract_bill_data(ocr: &OcrResult) -> Result<BillDocument, ExtractionError> {
    BillExtractor::new().extract(ocr, None, None)
}
