//! Walks a dashboard document and collects the metric names its templating
//! variables and panel queries reference.

use serde::Deserialize;
use serde_json::Value;

use crate::models::dashboard::{Dashboard, DashboardMetricSet, LegacyRow, Panel, Target, TemplateVariable};
use crate::promql::extract_query_metrics;
use crate::promql::rules::identifiers;

/// Extract the sorted, distinct metric set of one dashboard. Malformed
/// sections are logged and contribute nothing.
pub fn extract_dashboard_metrics(dashboard: &Dashboard) -> DashboardMetricSet {
    let title = dashboard.title();
    let mut metrics = templating_metrics(dashboard);
    let mut lexical_only = 0;

    for panel in flatten_panels(dashboard) {
        if panel.kind == "text" {
            continue;
        }
        lexical_only += add_panel_metrics(title, &panel, &mut metrics);
    }

    if lexical_only > 0 {
        tracing::info!("dashboard '{title}': {lexical_only} query(ies) are not strict PromQL, extracted lexically");
    }

    metrics.sort();
    metrics.dedup();
    DashboardMetricSet {
        name: title.to_string(),
        metrics,
        lexical_only,
    }
}

/// Metrics named by `label_values(metric, label)` query variables.
pub fn templating_metrics(dashboard: &Dashboard) -> Vec<String> {
    let title = dashboard.title();
    let list = match dashboard.templating.get("list") {
        Some(Value::Array(list)) => list,
        Some(_) => {
            tracing::warn!("dashboard '{title}': templating list is not an array, skipping variables");
            return Vec::new();
        }
        None => {
            tracing::debug!("dashboard '{title}': no templating variables");
            return Vec::new();
        }
    };

    let mut metrics = Vec::new();
    for raw in list {
        let var = match TemplateVariable::deserialize(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("dashboard '{title}': malformed templating variable: {e}");
                continue;
            }
        };
        if var.kind != "query" {
            continue;
        }
        match var.query_text().and_then(label_values_metric) {
            Some(metric) => metrics.push(metric),
            None => tracing::warn!(
                "dashboard '{title}': cannot parse variable '{}' query {}, dashboard might not be supported, skipping",
                var.name,
                var.query
            ),
        }
    }
    metrics
}

/// The identifier right after `label_values`, if any.
pub fn label_values_metric(query: &str) -> Option<String> {
    let mut idents = identifiers(query);
    idents.find(|ident| *ident == "label_values")?;
    idents.next().map(str::to_string)
}

/// Panels of the dashboard with one level of row nesting removed. Both the
/// legacy `rows[].panels` layout and collapsed `type: "row"` panels are handled.
fn flatten_panels(dashboard: &Dashboard) -> Vec<Panel> {
    let title = dashboard.title();
    let mut flat = Vec::new();

    for raw_row in section(title, "rows", &dashboard.rows) {
        match LegacyRow::deserialize(raw_row) {
            Ok(row) => flat.extend(row.panels.iter().filter_map(|p| decode_panel(title, p))),
            Err(e) => tracing::warn!("dashboard '{title}': malformed row: {e}"),
        }
    }

    for raw in section(title, "panels", &dashboard.panels) {
        let Some(panel) = decode_panel(title, raw) else {
            continue;
        };
        if panel.kind == "row" {
            flat.extend(panel.panels.iter().filter_map(|p| decode_panel(title, p)));
        } else {
            flat.push(panel);
        }
    }
    flat
}

fn section<'d>(title: &str, name: &str, value: &'d Value) -> &'d [Value] {
    match value {
        Value::Array(items) => items,
        Value::Null => &[],
        _ => {
            tracing::error!("dashboard '{title}': `{name}` is not an array, skipping");
            &[]
        }
    }
}

fn decode_panel(title: &str, raw: &Value) -> Option<Panel> {
    Panel::deserialize(raw)
        .inspect_err(|e| tracing::error!("dashboard '{title}': could not parse panel: {e}"))
        .ok()
}

/// Adds the panel's query metrics and returns how many of its queries were
/// not strict PromQL.
fn add_panel_metrics(title: &str, panel: &Panel, metrics: &mut Vec<String>) -> usize {
    let mut lexical_only = 0;
    for raw in &panel.targets {
        let target = match Target::deserialize(raw) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("dashboard '{title}', panel '{}': malformed target: {e}", panel.title());
                continue;
            }
        };
        let Some(expr) = target.expr.as_deref().filter(|e| !e.trim().is_empty()) else {
            continue;
        };
        match extract_query_metrics(expr) {
            Ok(query) => {
                if !query.strict {
                    lexical_only += 1;
                }
                metrics.extend(query.contributed().map(str::to_string));
            }
            Err(e) => tracing::warn!(
                "dashboard '{title}', panel '{}': skipping query {expr:?}: {e}",
                panel.title()
            ),
        }
    }
    lexical_only
}
