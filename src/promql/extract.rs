use super::grouping::{compact, resolve_grouping};
use super::lexer::{LexError, metric_candidates};
use super::rules::{embedded_in_rule, find_rules};

/// Identifiers that look like metrics to the lexer but are labels.
pub const DENYLIST: &[&str] = &["le", "p8s_logzio_name"];

/// Metric references recovered from a single query expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMetrics {
    /// Candidates left after grouping keys were removed, first-seen order.
    pub metrics: Vec<String>,
    /// Namespaced recording-rule names, first-seen order.
    pub rules: Vec<String>,
    /// Whether the expression also parsed as strict PromQL. Dashboard queries
    /// with Grafana macros usually do not.
    pub strict: bool,
}

impl QueryMetrics {
    /// Names this query contributes to a dashboard's metric set: every rule,
    /// then each remaining candidate that is neither denylisted nor already
    /// covered by a rule.
    pub fn contributed(&self) -> impl Iterator<Item = &str> {
        let candidates = self
            .metrics
            .iter()
            .filter(|m| !DENYLIST.contains(&m.as_str()) && !embedded_in_rule(m, &self.rules));
        self.rules.iter().chain(candidates).map(String::as_str)
    }
}

/// Run the lexer, rule detector and grouping resolver over `expr`.
pub fn extract_query_metrics(expr: &str) -> Result<QueryMetrics, LexError> {
    let candidates = metric_candidates(expr)?;
    let rules = find_rules(expr);

    let compacted = compact(expr);
    let grouping = resolve_grouping(&compacted, &candidates);

    let metrics = candidates
        .into_iter()
        .filter(|name| !grouping.contains(name))
        .map(str::to_string)
        .collect();

    let strict = match promql_parser::parser::parse(expr) {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!("not strict PromQL, using lexical extraction only: {e}");
            false
        }
    };

    Ok(QueryMetrics {
        metrics,
        rules,
        strict,
    })
}
