//! Positioned OCR input types
//!
//! The extraction pipeline consumes the output of an upstream OCR engine:
//! recognised text lines with bounding boxes and page indices, optionally
//! pre-grouped into row blocks with split columns.

use serde::{Deserialize, Serialize};

/// A single recognised text line with its position on the page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrLine {
    pub text: String,
    /// Recognition confidence in [0, 1]
    pub confidence: f64,
    /// Four corner points (x, y), clockwise from top-left
    #[serde(rename = "box")]
    pub bbox: [(f32, f32); 4],
    pub page: u32,
}

impl OcrLine {
    /// Top edge of the line: the smallest y among the box corners.
    #[must_use]
    pub fn top_y(&self) -> f32 {
        self.bbox
            .iter()
            .map(|&(_, y)| y)
            .fold(f32::INFINITY, f32::min)
    }
}

/// A pre-grouped table row: full text plus split columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemBlock {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub columns: Vec<String>,
    pub page: u32,
    pub y: f32,
}

/// Complete OCR output for one uploaded document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub lines: Vec<OcrLine>,
    /// Present when the OCR stage already grouped rows; otherwise the
    /// extractor reconstructs blocks by y-clustering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_blocks: Option<Vec<ItemBlock>>,
}

impl OcrResult {
    /// Number of pages covered by the recognised lines.
    #[must_use]
    pub fn page_count(&self) -> u32 {
        self.lines.iter().map(|l| l.page + 1).max().unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_y_is_min_of_box() {
        let line = OcrLine {
            text: "Patient Name: John".to_string(),
            confidence: 0.95,
            bbox: [(0.0, 12.0), (80.0, 10.5), (80.0, 22.0), (0.0, 23.0)],
            page: 0,
        };
        assert_eq!(line.top_y(), 10.5);
    }

    #[test]
    fn test_page_count_from_lines() {
        let mut ocr = OcrResult::default();
        assert_eq!(ocr.page_count(), 1);
        ocr.lines.push(OcrLine {
            text: "x".to_string(),
            confidence: 1.0,
            bbox: [(0.0, 0.0); 4],
            page: 2,
        });
        assert_eq!(ocr.page_count(), 3);
    }
}
