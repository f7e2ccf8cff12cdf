//! Search relevance and ranking algorithms.
//!
//! This module provides the per-field term scoring, the phrase adjacency bonus
//! and the whole-query title bonus used by the query engine.

/// BM25 term-frequency saturation.
const K1: f32 = 1.2;
/// BM25 length normalization strength.
const B: f32 = 0.75;

/// Bonus per query-token pair found next to each other, times field weight.
pub(crate) const ADJACENCY_BONUS: f32 = 0.5;

/// Score multiplier for terms reached through prefix expansion.
pub(crate) const PREFIX_DISCOUNT: f32 = 0.6;
/// Score multiplier for terms reached through fuzzy substitution.
pub(crate) const FUZZY_DISCOUNT: f32 = 0.4;

/// Saturated, length-normalized term frequency.
///
/// Grows with `tf` but levels off, and shrinks as the field gets longer than
/// average, so a term in a short heading outweighs the same term buried in a
/// long body.
pub(crate) fn term_score(tf: u32, field_length: u32, average_length: f32) -> f32 {
    if tf == 0 {
        return 0.0;
    }
    let tf = tf as f32;
    let length_ratio = field_length as f32 / average_length.max(1.0);
    tf * (K1 + 1.0) / (tf + K1 * (1.0 - B + B * length_ratio))
}

/// Calculate title relevance for the whole normalized query.
///
/// Returns a bonus based on how well the query matches the title:
/// - 4.0: Exact match
/// - 2.0: Title starts with query
/// - 1.0: Title contains query
/// - None: No match
pub(crate) fn title_bonus(title: &str, query: &str) -> Option<f32> {
    if query.is_empty() {
        None
    } else if title == query {
        Some(4.0)
    } else if title.starts_with(query) {
        Some(2.0)
    } else if title.contains(query) {
        Some(1.0)
    } else {
        None
    }
}

/// Counts query-token pairs `(i, i + 1)` that appear at consecutive positions.
///
/// `positions[i]` holds the sorted positions where query token `i` occurs in
/// a single field.
pub(crate) fn adjacent_pairs(positions: &[Vec<u32>]) -> usize {
    positions
        .windows(2)
        .filter(|pair| {
            let (left, right) = (&pair[0], &pair[1]);
            left.iter()
                .any(|p| right.binary_search(&(p + 1)).is_ok())
        })
        .count()
}
