//! End-to-end runs: fetch dashboards, extract, report, and optionally count
//! series.

use std::path::PathBuf;

use crate::config::{ExtractorConfig, LogzioCredentials};
use crate::error::ExtractError;
use crate::models::dashboard::{Dashboard, DashboardMetricSet};
use crate::report::{self, GlobalMetricSet};
use crate::sources::{DashboardSource, FolderSource, GrafanaApi};
use crate::timeseries::{CardinalityReport, PrometheusClient};
use crate::walker::extract_dashboard_metrics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Grafana API dashboards plus Prometheus series counts.
    Full,
    /// Dashboard metrics only.
    Dashboards(DashboardOrigin),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardOrigin {
    Folder(PathBuf),
    Logzio { region: String, token: String },
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output: PathBuf,
    pub telegraf: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output: PathBuf::from(report::DEFAULT_OUTPUT),
            telegraf: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub dashboards: Vec<DashboardMetricSet>,
    pub all: GlobalMetricSet,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutcome {
    pub extraction: Extraction,
    pub cardinality: Option<CardinalityReport>,
}

/// Walk dashboards one at a time; the global set only grows after a
/// dashboard's own set is final.
pub fn extract_all(dashboards: &[Dashboard]) -> Extraction {
    let mut acc = Extraction::default();
    for dashboard in dashboards {
        let set = extract_dashboard_metrics(dashboard);
        tracing::debug!("dashboard '{}': {} metric(s)", set.name, set.metrics.len());
        acc.all.merge(&set);
        acc.dashboards.push(set);
    }
    acc
}

pub async fn run(command: Command, config: &ExtractorConfig, options: &RunOptions) -> Result<RunOutcome, ExtractError> {
    match command {
        Command::Full => run_full(config, options).await,
        Command::Dashboards(origin) => {
            let source: Box<dyn DashboardSource> = match origin {
                DashboardOrigin::Folder(dir) => Box::new(FolderSource::new(dir)),
                DashboardOrigin::Logzio { region, token } => {
                    let creds = LogzioCredentials::new(&region, &token)?;
                    Box::new(GrafanaApi::logzio(&creds)?)
                }
            };
            tracing::info!("loading dashboards from {}", source.describe());
            let dashboards = source.fetch().await?;
            let extraction = publish(&dashboards, options)?;
            Ok(RunOutcome {
                extraction,
                cardinality: None,
            })
        }
    }
}

async fn run_full(config: &ExtractorConfig, options: &RunOptions) -> Result<RunOutcome, ExtractError> {
    let settings = config.resolve(true)?;
    let mut extraction = Extraction::default();

    if let Some(grafana) = &settings.grafana {
        let api = GrafanaApi::grafana(grafana)?;
        tracing::info!("loading dashboards from {}", api.describe());
        let dashboards = match api.fetch().await {
            Ok(d) => d,
            Err(e) => {
                tracing::error!("error while fetching dashboards: {e}, continuing without dashboards");
                Vec::new()
            }
        };
        extraction = publish(&dashboards, options)?;
    }

    let cardinality = match &settings.prometheus {
        Some(prometheus) => {
            let client = PrometheusClient::new(prometheus);
            let report = client.cardinality(&extraction.all.to_vec()).await;
            println!("{}", report.render());
            Some(report)
        }
        None => {
            tracing::info!("no prometheus endpoint configured, skipping timeseries counts");
            None
        }
    };

    Ok(RunOutcome {
        extraction,
        cardinality,
    })
}

/// Extract, print, and write the output file.
fn publish(dashboards: &[Dashboard], options: &RunOptions) -> Result<Extraction, ExtractError> {
    let extraction = extract_all(dashboards);
    for set in &extraction.dashboards {
        println!("{}", report::render_dashboard(set, options.telegraf));
    }
    println!("{}", report::render_global(&extraction.all, options.telegraf));
    report::write_output(&options.output, &extraction.dashboards, &extraction.all)?;
    Ok(extraction)
}
