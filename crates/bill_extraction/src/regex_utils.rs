// Safe regex helpers for noisy OCR text
// Extraction never panics on missing matches or empty groups

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static LEADING_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[:.\-\s]+").expect("static regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static TRAILING_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[:.]\s*$").expect("static regex"));
static BARE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.?\d*$").expect("static regex"));

/// Extract a capture group with a fallback, never panicking.
#[must_use]
pub fn safe_group(caps: Option<&Captures<'_>>, group_idx: usize, default: &str) -> String {
    caps.and_then(|c| c.get(group_idx))
        .map_or_else(|| default.to_string(), |m| m.as_str().to_string())
}

/// Clean an extracted header value: strip leading punctuation and collapse
/// internal whitespace.
#[must_use]
pub fn clean_extracted_value(value: &str) -> String {
    let stripped = LEADING_PUNCT.replace(value, "");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

/// Try to extract a labeled field value from one line.
///
/// Each pattern matches the label itself; the value is whatever follows the
/// match on the same line. Returns `None` when no pattern hits or the
/// residue is shorter than `min_value_len` after cleaning.
#[must_use]
pub fn try_extract_labeled_field(
    text: &str,
    label_patterns: &[Regex],
    min_value_len: usize,
) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    for pattern in label_patterns {
        if let Some(m) = pattern.find(text) {
            let cleaned = clean_extracted_value(&text[m.end()..]);
            if cleaned.len() >= min_value_len.max(1) {
                return Some(cleaned);
            }
        }
    }
    None
}

/// True when a label pattern matches but nothing substantial follows it.
///
/// Identifies multi-line fields where the label sits alone and the value is
/// on the following line.
#[must_use]
pub fn is_label_only(text: &str, label_patterns: &[Regex]) -> bool {
    if text.is_empty() {
        return false;
    }
    for pattern in label_patterns {
        if let Some(m) = pattern.find(text) {
            let cleaned = clean_extracted_value(&text[m.end()..]);
            if cleaned.len() < 2 {
                return true;
            }
        }
    }
    false
}

/// Extract the value from the next line when the current line is label-only.
///
/// The next line must not be empty, another label, or a bare number.
#[must_use]
pub fn extract_from_next_line(
    current_text: &str,
    next_text: &str,
    label_patterns: &[Regex],
) -> Option<String> {
    if !is_label_only(current_text, label_patterns) {
        return None;
    }

    let next = next_text.trim();
    if next.len() < 2 {
        return None;
    }
    if TRAILING_LABEL.is_match(next) {
        return None;
    }
    if BARE_NUMBER.is_match(next) {
        return None;
    }
    Some(next.to_string())
}
