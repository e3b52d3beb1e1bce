//! Stable identifier derivation for extracted records
//!
//! Line items carry a content-derived id so repeated extractions of the
//! same document produce the same ids regardless of iteration order.

use sha1::{Digest, Sha1};

use crate::category::ItemCategory;

/// Deterministic line-item id.
///
/// Derived from category, 2-dp amount, lower-cased description and page, so
/// an identical row on a re-upload hashes to the same id.
#[must_use]
pub fn line_item_id(category: ItemCategory, amount: f64, description: &str, page: u32) -> String {
    let payload = format!(
        "item|{}|{:.2}|{}|{}",
        category.as_str(),
        amount,
        description.to_lowercase(),
        page
    );
    sha1_hex(&payload)
}

/// Deterministic discount id.
#[must_use]
pub fn discount_id(description: &str, amount: f64, page: u32) -> String {
    sha1_hex(&format!("discount|{:.2}|{}|{}", amount, description.to_lowercase(), page))
}

/// Deterministic payment id.
#[must_use]
pub fn payment_id(description: &str, page: u32) -> String {
    sha1_hex(&format!("payment|{}|{}", description.to_lowercase(), page))
}

fn sha1_hex(payload: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}
