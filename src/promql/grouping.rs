//! Positional grouping-key resolution.
//!
//! Grouping clauses put label names as bare arguments right after a marker
//! such as `by(` or `,`. On a whitespace-free expression, an identifier that
//! starts exactly where a marker ends is treated as a grouping key rather than
//! a referenced metric.
//!
//! This is a textual approximation. An identifier is excluded if *any* of its
//! occurrences lands on a marker end, and a name that is a prefix of a
//! grouping label (`status` vs. `by(status_code)`) matches as well.

use std::collections::{BTreeSet, HashSet};

/// Markers after which a grouping label is expected. `sum_rate(` covers a
/// vendor helper whose first argument is a label list.
pub const GROUPING_MARKERS: &[&str] = &[
    "by(",
    "on(",
    ",",
    "group_right(",
    "group_left(",
    "without(",
    "ignoring(",
    "sum_rate(",
];

/// Remove all whitespace so markers like `by (` compare as `by(`.
pub fn compact(expr: &str) -> String {
    expr.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Every offset (overlapping matches included) where `needle` occurs.
fn occurrences<'a>(haystack: &'a str, needle: &'a str) -> impl Iterator<Item = usize> + 'a {
    (0..haystack.len())
        .filter(move |&i| !needle.is_empty() && haystack.is_char_boundary(i))
        .filter(move |&i| haystack[i..].starts_with(needle))
}

/// Offsets immediately following each grouping marker in `compact_expr`.
pub fn grouping_offsets(compact_expr: &str) -> BTreeSet<usize> {
    GROUPING_MARKERS
        .iter()
        .flat_map(|marker| occurrences(compact_expr, marker).map(move |i| i + marker.len()))
        .collect()
}

/// The subset of `candidates` that occur at a grouping start offset of
/// `compact_expr`.
pub fn resolve_grouping<'c>(compact_expr: &str, candidates: &[&'c str]) -> HashSet<&'c str> {
    let offsets = grouping_offsets(compact_expr);
    if offsets.is_empty() {
        return HashSet::new();
    }
    candidates
        .iter()
        .copied()
        .filter(|name| occurrences(compact_expr, name).any(|i| offsets.contains(&i)))
        .collect()
}
