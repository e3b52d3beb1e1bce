//! Closed category set for bill line items

use serde::{Deserialize, Serialize};
use std::fmt;

/// Medical bill item category
///
/// The set is closed: anything the section tracker and the description
/// classifier cannot place lands in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Medicines,
    SurgicalConsumables,
    ImplantsDevices,
    DiagnosticsTests,
    Radiology,
    Consultation,
    Hospitalization,
    Packages,
    Administrative,
    Other,
}

impl ItemCategory {
    /// All categories in stable display order.
    pub const ALL: [Self; 10] = [
        Self::Medicines,
        Self::SurgicalConsumables,
        Self::ImplantsDevices,
        Self::DiagnosticsTests,
        Self::Radiology,
        Self::Consultation,
        Self::Hospitalization,
        Self::Packages,
        Self::Administrative,
        Self::Other,
    ];

    /// Snake-case name as stored on documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Medicines => "medicines",
            Self::SurgicalConsumables => "surgical_consumables",
            Self::ImplantsDevices => "implants_devices",
            Self::DiagnosticsTests => "diagnostics_tests",
            Self::Radiology => "radiology",
            Self::Consultation => "consultation",
            Self::Hospitalization => "hospitalization",
            Self::Packages => "packages",
            Self::Administrative => "administrative",
            Self::Other => "other",
        }
    }

    /// Parse a stored category name, folding unknown and legacy names.
    ///
    /// The retired `regulated_pricing_drugs` category migrates to
    /// `Medicines`; anything unrecognised becomes `Other`.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "medicines" | "regulated_pricing_drugs" => Self::Medicines,
            "surgical_consumables" => Self::SurgicalConsumables,
            "implants_devices" => Self::ImplantsDevices,
            "diagnostics_tests" => Self::DiagnosticsTests,
            "radiology" => Self::Radiology,
            "consultation" => Self::Consultation,
            "hospitalization" | "hospitalisation" => Self::Hospitalization,
            "packages" => Self::Packages,
            "administrative" => Self::Administrative,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_names() {
        assert_eq!(ItemCategory::parse("medicines"), ItemCategory::Medicines);
        assert_eq!(
            ItemCategory::parse("diagnostics_tests"),
            ItemCategory::DiagnosticsTests
        );
    }

    #[test]
    fn test_parse_legacy_regulated_category() {
        assert_eq!(
            ItemCategory::parse("regulated_pricing_drugs"),
            ItemCategory::Medicines
        );
    }

    #[test]
    fn test_parse_unknown_falls_back_to_other() {
        assert_eq!(ItemCategory::parse("miscellaneous"), ItemCategory::Other);
        assert_eq!(ItemCategory::parse(""), ItemCategory::Other);
    }

    #[test]
    fn test_serde_round_trip_is_snake_case() {
        let json = serde_json::to_string(&ItemCategory::SurgicalConsumables).unwrap();
        assert_eq!(json, "\"surgical_consumables\"");
    }
}
