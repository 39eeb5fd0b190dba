use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A Grafana dashboard document.
///
/// Sections are kept as raw JSON and decoded one element at a time, so a
/// single malformed panel or variable never rejects the whole dashboard.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dashboard {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub templating: Value,
    #[serde(default)]
    pub panels: Value,
    /// Pre-5.0 schema: panels grouped under `rows[].panels`.
    #[serde(default)]
    pub rows: Value,
}

impl Dashboard {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("untitled")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateVariable {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    /// A query string, or `{ "query": "...", "refId": ... }` in newer schemas.
    #[serde(default)]
    pub query: Value,
}

impl TemplateVariable {
    pub fn query_text(&self) -> Option<&str> {
        match &self.query {
            Value::String(s) => Some(s),
            Value::Object(map) => map.get("query").and_then(Value::as_str),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Panel {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Decoded one at a time into [`Target`].
    #[serde(default)]
    pub targets: Vec<Value>,
    /// Children of a collapsed `row` panel.
    #[serde(default)]
    pub panels: Vec<Value>,
}

impl Panel {
    /// Empty when the panel has no title or a `null` one.
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub expr: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyRow {
    #[serde(default)]
    pub panels: Vec<Value>,
}

/// One entry of `GET /api/search`.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardSummary {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub uid: Option<String>,
}

/// `GET /api/dashboards/uid/{uid}`; the `meta` block is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardDetail {
    pub dashboard: Dashboard,
}

/// Metric names referenced by one dashboard, deduplicated and sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardMetricSet {
    pub name: String,
    pub metrics: Vec<String>,
    /// Queries that did not parse as strict PromQL (Grafana macros and the
    /// like) and were extracted by the lexer alone.
    #[serde(skip)]
    pub lexical_only: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn variable_query_forms() {
        let plain: TemplateVariable = serde_json::from_value(json!({
            "type": "query",
            "name": "instance",
            "query": "label_values(up, instance)"
        }))
        .unwrap();
        assert_eq!(plain.query_text(), Some("label_values(up, instance)"));

        let object: TemplateVariable = serde_json::from_value(json!({
            "type": "query",
            "query": { "query": "label_values(node_uname_info, nodename)", "refId": "A" }
        }))
        .unwrap();
        assert_eq!(object.query_text(), Some("label_values(node_uname_info, nodename)"));

        let custom: TemplateVariable =
            serde_json::from_value(json!({ "type": "custom", "query": 5 })).unwrap();
        assert_eq!(custom.query_text(), None);
    }

    #[test]
    fn detail_drops_meta() {
        let detail: DashboardDetail = serde_json::from_value(json!({
            "dashboard": { "title": "Nodes", "panels": [] },
            "meta": { "slug": "nodes" }
        }))
        .unwrap();
        assert_eq!(detail.dashboard.title(), "Nodes");
    }

    #[test]
    fn panel_tolerates_null_title_and_odd_targets() {
        let panel: Panel = serde_json::from_value(json!({
            "type": "graph",
            "title": null,
            "targets": [{ "expr": "up" }, { "expr": 5 }]
        }))
        .unwrap();
        assert_eq!(panel.title(), "");
        assert_eq!(panel.targets.len(), 2);
    }

    #[test]
    fn missing_sections_default_to_null() {
        let d: Dashboard = serde_json::from_value(json!({})).unwrap();
        assert_eq!(d.title(), "untitled");
        assert!(d.panels.is_null());
        assert!(d.templating.is_null());
    }
}
