//! Tie-up rate sheet types and the verifier's bill-input view

use serde::{Deserialize, Serialize};

use crate::bill::BillDocument;
use crate::round2;

/// Pricing model for a tie-up reference item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingType {
    /// Per-unit pricing: allowed = rate × quantity
    Unit,
    /// Fixed service price, quantity ignored
    Service,
    /// Package price, quantity ignored
    Bundle,
}

/// A single reference item on a hospital rate sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieUpItem {
    pub item_name: String,
    pub rate: f64,
    #[serde(rename = "type")]
    pub pricing: PricingType,
}

/// A category of reference items on a rate sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieUpCategory {
    pub category_name: String,
    #[serde(default)]
    pub items: Vec<TieUpItem>,
}

/// One hospital's negotiated rate sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieUpRateSheet {
    pub hospital_name: String,
    #[serde(default)]
    pub categories: Vec<TieUpCategory>,
}

/// A bill item as seen by the verifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillInputItem {
    pub item_name: String,
    pub quantity: f64,
    pub amount: f64,
}

/// A bill category as seen by the verifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillInputCategory {
    pub category_name: String,
    #[serde(default)]
    pub items: Vec<BillInputItem>,
}

/// Item-level view of a bill, fed to the verification pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillInput {
    pub hospital_name: String,
    #[serde(default)]
    pub categories: Vec<BillInputCategory>,
}

impl BillInput {
    /// Total item count across all categories.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.categories.iter().map(|c| c.items.len()).sum()
    }
}

impl From<&BillDocument> for BillInput {
    /// Flatten a structured document into the verifier's view. Payments and
    /// discounts are already outside the item map, so nothing is filtered.
    fn from(doc: &BillDocument) -> Self {
        let categories = doc
            .items
            .iter()
            .filter(|(_, items)| !items.is_empty())
            .map(|(category, items)| BillInputCategory {
                category_name: category.as_str().to_string(),
                items: items
                    .iter()
                    .map(|i| BillInputItem {
                        item_name: i.description.clone(),
                        quantity: i.qty,
                        amount: round2(i.final_amount),
                    })
                    .collect(),
            })
            .collect();
        Self {
            hospital_name: doc.header.hospital_name.clone().unwrap_or_default(),
            categories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bill::LineItem;
    use crate::category::ItemCategory;

    #[test]
    fn test_bill_input_from_document() {
        let mut doc = BillDocument::new("u1".to_string(), None, 1);
        doc.header.hospital_name = Some("City Care Hospital".to_string());
        doc.push_item(LineItem::new(
            "X-RAY CHEST PA",
            1.0,
            None,
            Some(450.0),
            None,
            450.0,
            false,
            ItemCategory::Radiology,
            0,
        ));
        let input = BillInput::from(&doc);
        assert_eq!(input.hospital_name, "City Care Hospital");
        assert_eq!(input.item_count(), 1);
        assert_eq!(input.categories[0].category_name, "radiology");
        assert_eq!(input.categories[0].items[0].amount, 450.0);
    }

    #[test]
    fn test_pricing_type_serde_names() {
        let json = serde_json::to_string(&PricingType::Bundle).unwrap();
        assert_eq!(json, "\"bundle\"");
        let item: TieUpItem =
            serde_json::from_str(r#"{"item_name":"MRI Brain","rate":7000.0,"type":"service"}"#)
                .unwrap();
        assert_eq!(item.pricing, PricingType::Service);
    }
}
