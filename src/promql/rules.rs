//! Recording-rule detection.
//!
//! Recording rules follow the `level:metric:operations` naming convention, so
//! any identifier carrying a `:` is treated as a precomputed rule. This pass
//! scans the raw text and does not depend on the lexer.

use std::sync::LazyLock;

use regex::Regex;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z_:][a-zA-Z0-9_:]*").expect("identifier pattern is valid")
});

/// Every identifier-shaped substring of `expr`, left to right.
///
/// Matches that start right after a digit are the tail of a number or
/// duration (`5m:1m` in a subquery range) and are skipped.
pub fn identifiers(expr: &str) -> impl Iterator<Item = &str> {
    IDENTIFIER
        .find_iter(expr)
        .filter(move |m| {
            m.start() == 0 || !expr.as_bytes()[m.start() - 1].is_ascii_digit()
        })
        .map(|m| m.as_str())
}

/// Distinct rule names found in `expr`, in first-seen order.
pub fn find_rules(expr: &str) -> Vec<String> {
    let mut rules: Vec<String> = Vec::new();
    for ident in identifiers(expr).filter(|ident| ident.contains(':')) {
        if !rules.iter().any(|r| r == ident) {
            rules.push(ident.to_string());
        }
    }
    rules
}

/// True when `name` is embedded in one of `rules`, e.g. the base metric of a
/// namespaced rule.
pub fn embedded_in_rule(name: &str, rules: &[String]) -> bool {
    rules.iter().any(|rule| rule.contains(name))
}
