// Row block reconstruction from positioned lines
// When the OCR stage did not pre-group rows, nearby lines are clustered by
// vertical distance and split into a description plus trailing numeric
// columns.

use once_cell::sync::Lazy;
use regex::Regex;

use bill_core_models::{ItemBlock, OcrLine};

static NUMERIC_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[₹$]?[\d,]+\.?\d*$").expect("static regex"));

/// Cluster sorted lines into row blocks.
///
/// Lines on the same page whose top-y lies within `threshold` of the
/// previous line join the same block. The block text is the concatenation
/// in input order; trailing numeric tokens become the column list and the
/// remainder the description.
#[must_use]
pub fn build_blocks(lines: &[OcrLine], threshold: f32) -> Vec<ItemBlock> {
    let mut blocks: Vec<ItemBlock> = Vec::new();
    let mut cluster: Vec<&OcrLine> = Vec::new();

    for line in lines {
        let starts_new = match cluster.last() {
            Some(prev) => prev.page != line.page || (line.top_y() - prev.top_y()) > threshold,
            None => true,
        };
        if starts_new && !cluster.is_empty() {
            blocks.push(finish_cluster(&cluster));
            cluster.clear();
        }
        cluster.push(line);
    }
    if !cluster.is_empty() {
        blocks.push(finish_cluster(&cluster));
    }

    blocks
}

fn finish_cluster(cluster: &[&OcrLine]) -> ItemBlock {
    let first = cluster[0];
    let text = cluster
        .iter()
        .map(|l| l.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    let (description, columns) = split_row(&text);

    ItemBlock {
        text,
        description: Some(description),
        columns,
        page: first.page,
        y: first.top_y(),
    }
}

/// Split a row into its description head and trailing numeric columns.
#[must_use]
pub fn split_row(text: &str) -> (String, Vec<String>) {
    let tokens: Vec<&str> = text.split_whitespace().collect();

    let mut split_at = tokens.len();
    while split_at > 0 && NUMERIC_TOKEN.is_match(tokens[split_at - 1]) {
        split_at -= 1;
    }

    let description = tokens[..split_at].join(" ");
    let columns = tokens[split_at..].iter().map(ToString::to_string).collect();
    (description, columns)
}
