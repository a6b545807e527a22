//! Token estimation
//!
//! Every chunk-size decision goes through [`estimate_tokens`], so identical
//! content always produces identical chunk boundaries.

/// Estimate tokens using a fixed heuristic (Unicode scalar values / 4, rounded up).
///
/// Counting code points rather than bytes keeps multi-byte UTF-8 content
/// (CJK text, emoji) from being over-counted.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Token estimate of a slice of lines, as the lines would be joined.
pub fn estimate_lines_tokens(lines: &[&str]) -> usize {
    estimate_tokens(&lines.concat())
}
