// Stage 3: payment and receipt extraction
// Payment events are emitted for diagnostics only and are never merged
// into items or totals.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use bill_core_models::{ids, ItemBlock, PaymentEvent};

use crate::numeric_guards::extract_numeric_value;
use crate::zone_detector::{is_payment_zone_text, DocumentZones, Zone};

static RECEIPT_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(RCPO-?[A-Z0-9\-]*)").expect("static regex"));
static TXN_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:utr|rrn|txn)\s*(?:no\.?)?\s*[:#]?\s*([A-Za-z0-9]{6,22})")
        .expect("static regex")
});
static PAYMENT_MODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(cash|credit\s*card|debit\s*card|card|upi|neft|rtgs|imps|cheque|net\s*banking)\b")
        .expect("static regex")
});
static INLINE_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"₹\s*([\d,]+\.?\d*)").expect("static regex"));

/// True for text that belongs to the payment/receipt block.
#[must_use]
pub fn is_paymentish(text: &str) -> bool {
    is_payment_zone_text(text)
}

/// Stage-3 parser over row blocks
pub struct PaymentParser;

impl PaymentParser {
    /// Emit a payment event for every block in the payment zone or with
    /// payment-like text.
    #[must_use]
    pub fn parse(blocks: &[ItemBlock], zones: &DocumentZones) -> Vec<PaymentEvent> {
        let mut events = Vec::new();

        for block in blocks {
            let zone = zones.zone_for_position(block.page, block.y, &block.text);
            if zone != Zone::Payment && !is_paymentish(&block.text) {
                continue;
            }

            let reference = Self::extract_reference(&block.text);
            let mode = PAYMENT_MODE
                .captures(&block.text)
                .map(|c| c[1].to_uppercase());
            let amount = Self::extract_amount(block);

            debug!(page = block.page, ?reference, "payment event detected");
            events.push(PaymentEvent {
                payment_id: ids::payment_id(&block.text, block.page),
                description: block.text.trim().to_string(),
                amount,
                reference,
                mode,
                page: block.page,
            });
        }

        events
    }

    fn extract_reference(text: &str) -> Option<String> {
        if let Some(caps) = RECEIPT_REFERENCE.captures(text) {
            return Some(caps[1].to_uppercase());
        }
        TXN_REFERENCE.captures(text).map(|c| c[1].to_uppercase())
    }

    /// Guarded amount extraction: last parseable column, else an inline
    /// rupee amount in the text.
    fn extract_amount(block: &ItemBlock) -> Option<f64> {
        if let Some(value) = block
            .columns
            .iter()
            .rev()
            .find_map(|c| extract_numeric_value(c))
        {
            return Some(value);
        }
        INLINE_AMOUNT
            .captures(&block.text)
            .and_then(|c| extract_numeric_value(&c[1]))
    }
}
