// Medical core extraction
// Strips inventory noise from raw bill text and pulls out the medically
// meaningful metadata: dosage, form, route, modality, body part.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PAREN_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*[A-Z0-9/\-]{4,}\s*\)").expect("static regex"));
static LOT_BATCH_EXP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(lot|batch|exp(iry)?)\s*[:#]?\s*[A-Za-z0-9/\-]+").expect("static regex")
});
static PIPE_BRAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"\|[^|]*$").expect("static regex"));
static HYPHEN_BRAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<head>\S{4,})-(?P<brand>[A-Z]{3,})\s*$").expect("static regex"));
static DOSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(mcg|µg|mg|gm|g|ml|iu|%)(?:\b|$)").expect("static regex")
});
static FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(tablets?|tabs?|capsules?|caps?|syrup|injections?|inj|infusion|drops|ointment|cream|gel|spray|inhaler|suspension|suppository|patch)\b",
    )
    .expect("static regex")
});
static ROUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(iv|im|sc|oral|topical|nasal)\b").expect("static regex"));
static MODALITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(mri|ct|x-?ray|usg|ultrasound|sonography|ecg|ekg|echo|pet|eeg|emg|mammography|doppler)\b")
        .expect("static regex")
});
static BODY_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(brain|head|neck|chest|thorax|abdomen|pelvis|spine|lumbar|cervical|knee|shoulder|elbow|wrist|ankle|hip|heart|liver|kidney|kub|sinus|whole\s*body)\b",
    )
    .expect("static regex")
});
static IMPLANT_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(stent|implant|pacemaker|prosthesis|guidewire|guide\s*wire|mesh)\b")
        .expect("static regex")
});
static CONSUMABLE_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(suture|gauze|syringe|gloves?|cannula|catheter|bandage|swab|drape)\b")
        .expect("static regex")
});
static PROCEDURE_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(consultation|surgery|procedure|angiography|angioplasty|endoscopy|dialysis|biopsy)\b")
        .expect("static regex")
});
static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));

/// Broad medical type of a bill item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MedicalItemType {
    Drug,
    Procedure,
    Diagnostic,
    Implant,
    Consumable,
    Unknown,
}

/// The normalised medical term of an item with its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalCore {
    pub core_text: String,
    pub item_type: MedicalItemType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dosage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_part: Option<String>,
}

impl MedicalCore {
    /// Dosages are a hard constraint when both sides carry one.
    #[must_use]
    pub fn dosage_conflicts_with(&self, other: &Self) -> bool {
        matches!(
            (&self.dosage, &other.dosage),
            (Some(a), Some(b)) if a != b
        )
    }

    /// Forms differ in a medically significant way (tablet vs injection).
    #[must_use]
    pub fn form_conflicts_with(&self, other: &Self) -> bool {
        matches!(
            (&self.form, &other.form),
            (Some(a), Some(b)) if a != b
        )
    }

    #[must_use]
    pub fn modality_conflicts_with(&self, other: &Self) -> bool {
        matches!(
            (&self.modality, &other.modality),
            (Some(a), Some(b)) if a != b
        )
    }

    #[must_use]
    pub fn body_part_conflicts_with(&self, other: &Self) -> bool {
        matches!(
            (&self.body_part, &other.body_part),
            (Some(a), Some(b)) if a != b
        )
    }

    /// All present metadata fields agree exactly with the other side.
    #[must_use]
    pub fn metadata_matches(&self, other: &Self) -> bool {
        fn agree(a: &Option<String>, b: &Option<String>) -> bool {
            match (a, b) {
                (Some(x), Some(y)) => x == y,
                _ => true,
            }
        }
        (self.dosage.is_some() || self.form.is_some() || self.modality.is_some())
            && agree(&self.dosage, &other.dosage)
            && agree(&self.form, &other.form)
            && agree(&self.modality, &other.modality)
            && agree(&self.body_part, &other.body_part)
    }
}

/// Normalise a dosage unit: µg becomes mcg, gm becomes g.
fn normalize_dosage_unit(unit: &str) -> String {
    match unit.to_lowercase().as_str() {
        "µg" | "mcg" => "mcg".to_string(),
        "gm" | "g" => "g".to_string(),
        other => other.to_string(),
    }
}

/// Normalise a form word to its canonical singular.
fn normalize_form(form: &str) -> String {
    match form.to_lowercase().as_str() {
        "tablets" | "tablet" | "tabs" | "tab" => "tablet".to_string(),
        "capsules" | "capsule" | "caps" | "cap" => "capsule".to_string(),
        "injections" | "injection" | "inj" => "injection".to_string(),
        other => other.to_string(),
    }
}

fn normalize_modality(modality: &str) -> String {
    match modality.to_lowercase().as_str() {
        "xray" | "x-ray" => "x-ray".to_string(),
        "ekg" | "ecg" => "ecg".to_string(),
        "ultrasound" | "sonography" | "usg" => "usg".to_string(),
        other => other.to_string(),
    }
}

/// Extract the medical core of a raw bill item text.
#[must_use]
pub fn extract_medical_core(text: &str) -> MedicalCore {
    // Inventory noise first, so codes never pollute the core
    let mut cleaned = PAREN_CODE.replace_all(text, " ").into_owned();
    cleaned = LOT_BATCH_EXP.replace_all(&cleaned, " ").into_owned();
    cleaned = PIPE_BRAND.replace(&cleaned, " ").into_owned();
    cleaned = HYPHEN_BRAND.replace(&cleaned, "$head").into_owned();

    let dosage = DOSAGE.captures(&cleaned).map(|c| {
        let number = c[1].trim_end_matches(".0").to_string();
        format!("{number}{}", normalize_dosage_unit(&c[2]))
    });
    let form = FORM.captures(&cleaned).map(|c| normalize_form(&c[1]));
    let route = ROUTE.captures(&cleaned).map(|c| c[1].to_lowercase());
    let modality = MODALITY.captures(&cleaned).map(|c| normalize_modality(&c[1]));
    let body_part = BODY_PART
        .captures(&cleaned)
        .map(|c| c[1].to_lowercase().replace(char::is_whitespace, " "));

    let item_type = if modality.is_some() {
        MedicalItemType::Diagnostic
    } else if IMPLANT_WORDS.is_match(&cleaned) {
        MedicalItemType::Implant
    } else if CONSUMABLE_WORDS.is_match(&cleaned) {
        MedicalItemType::Consumable
    } else if PROCEDURE_WORDS.is_match(&cleaned) {
        MedicalItemType::Procedure
    } else if dosage.is_some() || form.is_some() {
        MedicalItemType::Drug
    } else {
        MedicalItemType::Unknown
    };

    let core_text = NON_ALNUM
        .replace_all(&cleaned.to_lowercase(), " ")
        .trim()
        .to_string();

    MedicalCore {
        core_text,
        item_type,
        dosage,
        form,
        route,
        modality,
        body_part,
    }
}
