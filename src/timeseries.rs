//! Prometheus instant-query client for series counts.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use rand::Rng;

use crate::config::PrometheusSettings;
use crate::error::ExtractError;
use crate::models::prometheus::PromResponse;
use crate::report::to_regex;

pub const TOTAL_SERIES_METRIC: &str = "prometheus_tsdb_head_series";

/// Exponential backoff between retry rounds. Round 0 is the first retry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay: Duration::from_millis(500),
            factor: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self, round: u32) -> Duration {
        let base = (self.base_delay.as_millis() as f64 * self.factor.powi(round as i32)).round() as u64;
        if !self.jitter {
            return Duration::from_millis(base);
        }
        // ±50%
        let low = base / 2;
        let high = base + base / 2;
        if low >= high {
            Duration::from_millis(base)
        } else {
            Duration::from_millis(rand::rng().random_range(low..=high))
        }
    }
}

/// Per-metric series counts plus the metrics still failing after retries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesCounts {
    pub counts: BTreeMap<String, u64>,
    pub failed: Vec<String>,
    pub retries: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardinalityReport {
    pub total: Option<f64>,
    pub used: Option<f64>,
    pub per_metric: SeriesCounts,
}

impl CardinalityReport {
    pub fn unused(&self) -> Option<f64> {
        Some(self.total? - self.used?)
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

struct Figure(Option<f64>);

impl fmt::Display for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{v}"),
            None => f.write_str("unknown"),
        }
    }
}

impl fmt::Display for CardinalityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total number of timeseries: {}", Figure(self.total))?;
        writeln!(f, "Number of timeseries used in dashboards: {}", Figure(self.used))?;
        writeln!(f, "Number of unused timeseries: {}", Figure(self.unused()))?;

        let mut by_count: Vec<(&String, &u64)> = self.per_metric.counts.iter().collect();
        by_count.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        writeln!(f, "Timeseries per metric:")?;
        for (metric, count) in by_count {
            writeln!(f, "{metric}: {count}")?;
        }

        let failed = &self.per_metric.failed;
        if !failed.is_empty() {
            writeln!(
                f,
                "Could not count timeseries for {} metric(s) after {} retries:",
                failed.len(),
                self.per_metric.retries
            )?;
            for metric in failed {
                writeln!(f, "{metric}")?;
            }
        }
        Ok(())
    }
}

pub struct PrometheusClient {
    http: reqwest::Client,
    endpoint: String,
    interval: String,
    retry: RetryPolicy,
}

impl PrometheusClient {
    pub fn new(settings: &PrometheusSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            interval: settings.count_interval.clone(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run an instant query and return the first sample value.
    pub async fn query_scalar(&self, query: &str) -> Result<Option<f64>, ExtractError> {
        let url = format!("{}/api/v1/query?query={}", self.endpoint, urlencoding::encode(query));
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| ExtractError::Http {
                url: url.clone(),
                source,
            })?;
        let status = resp.status();
        let body = resp.text().await.map_err(|source| ExtractError::Http {
            url: url.clone(),
            source,
        })?;
        if !status.is_success() {
            return Err(ExtractError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }
        let parsed: PromResponse =
            serde_json::from_str(&body).map_err(|source| ExtractError::Decode { url, source })?;
        Ok(parsed.first_value())
    }

    pub async fn total_series(&self) -> Result<Option<f64>, ExtractError> {
        let query = format!("last_over_time({TOTAL_SERIES_METRIC}[{}])", self.interval);
        self.query_scalar(&query).await
    }

    /// Series matching any of `metrics`. `None` when there is nothing to match.
    pub async fn used_series(&self, metrics: &[String]) -> Result<Option<f64>, ExtractError> {
        if metrics.is_empty() {
            return Ok(None);
        }
        let pattern = to_regex(metrics.iter().map(String::as_str));
        let query = format!(
            "count(last_over_time({{__name__=~\"{pattern}\"}}[{}]))",
            self.interval
        );
        self.query_scalar(&query).await
    }

    /// An empty result means the metric has no active series.
    pub async fn series_count(&self, metric: &str) -> Result<u64, ExtractError> {
        let query = format!(
            "count(last_over_time({{__name__=\"{metric}\"}}[{}]))",
            self.interval
        );
        Ok(self.query_scalar(&query).await?.map_or(0, |v| v as u64))
    }

    /// Count series per metric. Each retry round re-queries only the previous
    /// round's failures, for at most `max_retries` rounds.
    pub async fn series_counts(&self, metrics: &[String]) -> SeriesCounts {
        let mut result = SeriesCounts::default();
        let mut pending: Vec<String> = metrics.to_vec();
        let mut round = 0;

        loop {
            let mut failed = Vec::new();
            for metric in pending {
                match self.series_count(&metric).await {
                    Ok(count) => {
                        result.counts.insert(metric, count);
                    }
                    Err(e) => {
                        tracing::warn!("series count for {metric} failed: {e}");
                        failed.push(metric);
                    }
                }
            }

            if failed.is_empty() || round >= self.retry.max_retries {
                result.failed = failed;
                break;
            }

            let delay = self.retry.delay(round);
            tracing::info!(
                "retrying {} failed metric(s) in {}ms (retry {}/{})",
                failed.len(),
                delay.as_millis(),
                round + 1,
                self.retry.max_retries
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            round += 1;
            pending = failed;
        }

        result.retries = round;
        if !result.failed.is_empty() {
            tracing::error!(
                "giving up on {} metric(s) after {round} retries: {}",
                result.failed.len(),
                result.failed.join(", ")
            );
        }
        result
    }

    /// Total, used and per-metric series. Failures are logged and leave the
    /// corresponding figure unknown.
    pub async fn cardinality(&self, metrics: &[String]) -> CardinalityReport {
        let total = self
            .total_series()
            .await
            .inspect_err(|e| tracing::error!("cannot query total timeseries: {e}"))
            .ok()
            .flatten();
        let used = self
            .used_series(metrics)
            .await
            .inspect_err(|e| tracing::error!("cannot query used timeseries: {e}"))
            .ok()
            .flatten();
        let per_metric = self.series_counts(metrics).await;
        CardinalityReport {
            total,
            used,
            per_metric,
        }
    }
}
