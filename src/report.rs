//! Aggregation and rendering of extracted metric sets.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::ExtractError;
use crate::models::dashboard::DashboardMetricSet;

pub const DEFAULT_OUTPUT: &str = "prometheus_metrics_output.yaml";

const SEPARATOR: &str = "------------";

/// Distinct metrics across every dashboard, always in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalMetricSet(BTreeSet<String>);

impl GlobalMetricSet {
    pub fn merge(&mut self, set: &DashboardMetricSet) {
        self.0.extend(set.metrics.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + Clone {
        self.0.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    pub fn regex(&self) -> String {
        to_regex(self.iter())
    }
}

pub fn aggregate(sets: &[DashboardMetricSet]) -> GlobalMetricSet {
    let mut all = GlobalMetricSet::default();
    for set in sets {
        all.merge(set);
    }
    all
}

/// `a|b|c` alternation for allow-list filters.
pub fn to_regex<'a>(metrics: impl IntoIterator<Item = &'a str>) -> String {
    metrics.into_iter().collect::<Vec<_>>().join("|")
}

/// Metric names grouped by collector input: `cpu_usage_idle` maps to input
/// `cpu`, field `usage_idle`. Names without an `_` after the first character
/// are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelegrafInputMapping(BTreeMap<String, BTreeSet<String>>);

impl TelegrafInputMapping {
    pub fn from_metrics<'a>(metrics: impl IntoIterator<Item = &'a str>) -> Self {
        let mut mapping: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for metric in metrics {
            if let Some((input, field)) = metric.split_once('_').filter(|(input, _)| !input.is_empty()) {
                mapping
                    .entry(input.to_string())
                    .or_default()
                    .insert(field.to_string());
            }
        }
        Self(mapping)
    }

    pub fn inputs(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TelegrafInputMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Telegraf filter by input:")?;
        for (input, fields) in self.inputs() {
            writeln!(f, "{input} fieldpass regex: {}", format_fieldpass(fields))?;
        }
        Ok(())
    }
}

/// `["a","b"]`
pub fn format_fieldpass<'a>(fields: impl IntoIterator<Item = &'a String>) -> String {
    let quoted: Vec<String> = fields.into_iter().map(|f| format!("\"{f}\"")).collect();
    format!("[{}]", quoted.join(","))
}

fn write_listing<'a>(
    f: &mut fmt::Formatter<'_>,
    metrics: impl IntoIterator<Item = &'a str> + Clone,
    telegraf: bool,
) -> fmt::Result {
    for metric in metrics.clone() {
        writeln!(f, "{metric}")?;
    }
    writeln!(f, "As Prometheus regex: \n{}", to_regex(metrics.clone()))?;
    if telegraf {
        writeln!(f, "{SEPARATOR}")?;
        write!(f, "{}", TelegrafInputMapping::from_metrics(metrics))?;
    }
    Ok(())
}

/// Console view of one dashboard's metric set.
pub struct DashboardReport<'a> {
    pub set: &'a DashboardMetricSet,
    pub telegraf: bool,
}

impl fmt::Display for DashboardReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{SEPARATOR}")?;
        writeln!(f, "Total number of metrics in {} : {}", self.set.name, self.set.metrics.len())?;
        if self.set.lexical_only > 0 {
            writeln!(f, "Queries extracted without a strict PromQL parse: {}", self.set.lexical_only)?;
        }
        writeln!(f, "{SEPARATOR}")?;
        write_listing(f, self.set.metrics.iter().map(String::as_str), self.telegraf)
    }
}

/// Console view of the distinct metrics across all dashboards.
pub struct GlobalReport<'a> {
    pub all: &'a GlobalMetricSet,
    pub telegraf: bool,
}

impl fmt::Display for GlobalReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{SEPARATOR}")?;
        writeln!(f, "Total number of distinct metrics: {}", self.all.len())?;
        writeln!(f, "{SEPARATOR}")?;
        write_listing(f, self.all.iter(), self.telegraf)
    }
}

pub fn render_dashboard(set: &DashboardMetricSet, telegraf: bool) -> String {
    DashboardReport { set, telegraf }.to_string()
}

pub fn render_global(all: &GlobalMetricSet, telegraf: bool) -> String {
    GlobalReport { all, telegraf }.to_string()
}

#[derive(Serialize)]
struct OutputRecord<'a> {
    name: &'a str,
    metrics: Vec<&'a str>,
}

/// Write one `{name, metrics}` record per dashboard plus an `all metrics`
/// record as YAML.
pub fn write_output(
    path: impl AsRef<Path>,
    dashboards: &[DashboardMetricSet],
    all: &GlobalMetricSet,
) -> Result<(), ExtractError> {
    let mut records: Vec<OutputRecord> = dashboards
        .iter()
        .map(|d| OutputRecord {
            name: &d.name,
            metrics: d.metrics.iter().map(String::as_str).collect(),
        })
        .collect();
    records.push(OutputRecord {
        name: "all metrics",
        metrics: all.iter().collect(),
    });

    let yaml = serde_yaml::to_string(&records)?;
    std::fs::write(path.as_ref(), yaml)?;
    tracing::info!("wrote {} record(s) to {}", records.len(), path.as_ref().display());
    Ok(())
}
