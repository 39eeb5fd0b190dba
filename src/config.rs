use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{ConfigError, mask_token};

pub const DEFAULT_COUNT_INTERVAL: &str = "5m";

pub const SUPPORTED_REGIONS: &[&str] = &["us", "eu", "uk", "nl", "ca", "au", "wa"];

static INTERVAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+m$").expect("interval pattern is valid"));

static LOGZIO_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z 0-9]+-[a-z 0-9]+-[a-z 0-9]+-[a-z 0-9]+-[a-z 0-9]+$")
        .expect("token pattern is valid")
});

/// Top-level config, loaded from YAML (`config.yaml`) or TOML.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExtractorConfig {
    #[serde(default)]
    pub grafana: Option<GrafanaConfig>,
    #[serde(default)]
    pub prometheus: Option<PrometheusConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GrafanaConfig {
    pub endpoint: Option<String>,
    /// Sent as `Authorization: Bearer <token>`.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PrometheusConfig {
    pub endpoint: Option<String>,
    /// Lookback for series counts, `<N>m`. Defaults to 5m.
    pub timeseries_count_interval: Option<String>,
}

/// Validated settings consumed by the extraction pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub grafana: Option<GrafanaSettings>,
    pub prometheus: Option<PrometheusSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrafanaSettings {
    pub endpoint: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrometheusSettings {
    pub endpoint: String,
    pub count_interval: String,
}

impl ExtractorConfig {
    /// Load config from a file. Returns defaults if the file doesn't exist.
    /// `.toml` files are read as TOML, everything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let load_err = |message: String| ConfigError::Load {
            path: path.to_path_buf(),
            message,
        };
        let contents = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&contents).map_err(|e| load_err(e.to_string()))?,
            _ if contents.trim().is_empty() => Self::default(),
            _ => serde_yaml::from_str(&contents).map_err(|e| load_err(e.to_string()))?,
        };
        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `GRAFANA_ENDPOINT`, `GRAFANA_TOKEN`, `PROMETHEUS_ENDPOINT` and
    /// `PROMETHEUS_TIMESERIES_COUNT_INTERVAL` from the process environment.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(endpoint) = lookup("GRAFANA_ENDPOINT") {
            self.grafana.get_or_insert_default().endpoint = Some(endpoint);
        }
        if let Some(token) = lookup("GRAFANA_TOKEN") {
            self.grafana.get_or_insert_default().token = Some(token);
        }
        if let Some(endpoint) = lookup("PROMETHEUS_ENDPOINT") {
            self.prometheus.get_or_insert_default().endpoint = Some(endpoint);
        }
        if let Some(interval) = lookup("PROMETHEUS_TIMESERIES_COUNT_INTERVAL") {
            self.prometheus.get_or_insert_default().timeseries_count_interval = Some(interval);
        }
        self
    }

    /// Take settings from `answers` only where this config has none, so file
    /// and environment values win over interactive input.
    pub fn fill_missing(mut self, answers: ExtractorConfig) -> Self {
        fn fill(slot: &mut Option<String>, answer: Option<String>) {
            if slot.as_deref().is_none_or(|s| s.trim().is_empty()) {
                if let Some(answer) = answer {
                    *slot = Some(answer);
                }
            }
        }

        if let Some(answer) = answers.grafana {
            let grafana = self.grafana.get_or_insert_default();
            fill(&mut grafana.endpoint, answer.endpoint);
            fill(&mut grafana.token, answer.token);
        }
        if let Some(answer) = answers.prometheus {
            let prometheus = self.prometheus.get_or_insert_default();
            fill(&mut prometheus.endpoint, answer.endpoint);
            fill(&mut prometheus.timeseries_count_interval, answer.timeseries_count_interval);
        }
        self
    }

    /// Validate into [`Settings`]. With `require_grafana`, a missing Grafana
    /// endpoint fails fast. Prometheus is always optional.
    pub fn resolve(&self, require_grafana: bool) -> Result<Settings, ConfigError> {
        let grafana = self.grafana.as_ref().and_then(|g| {
            non_empty(g.endpoint.as_deref()).map(|endpoint| GrafanaSettings {
                endpoint,
                token: g.token.clone().filter(|t| !t.trim().is_empty()),
            })
        });
        if require_grafana && grafana.is_none() {
            return Err(ConfigError::MissingEndpoint("grafana.endpoint"));
        }

        let prometheus = self.prometheus.as_ref().and_then(|p| {
            non_empty(p.endpoint.as_deref()).map(|endpoint| PrometheusSettings {
                endpoint,
                count_interval: count_interval(p.timeseries_count_interval.as_deref()),
            })
        });

        Ok(Settings {
            grafana,
            prometheus,
        })
    }
}

fn non_empty(endpoint: Option<&str>) -> Option<String> {
    endpoint
        .map(|e| e.trim().trim_end_matches('/'))
        .filter(|e| !e.is_empty())
        .map(str::to_string)
}

/// Accepts `<N>m`; anything else falls back to [`DEFAULT_COUNT_INTERVAL`].
pub fn count_interval(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(interval) if INTERVAL.is_match(interval) => interval.to_string(),
        Some(other) => {
            tracing::warn!(
                "invalid timeseries_count_interval {other:?}, expected <N>m, using {DEFAULT_COUNT_INTERVAL}"
            );
            DEFAULT_COUNT_INTERVAL.to_string()
        }
        None => DEFAULT_COUNT_INTERVAL.to_string(),
    }
}

/// Credentials for the Logz.io-hosted Grafana API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogzioCredentials {
    pub region: String,
    pub token: String,
}

impl LogzioCredentials {
    pub fn new(region: &str, token: &str) -> Result<Self, ConfigError> {
        let region = region.trim();
        let token = token.trim();
        if !SUPPORTED_REGIONS.contains(&region) {
            return Err(ConfigError::UnsupportedRegion(region.to_string()));
        }
        if !LOGZIO_TOKEN.is_match(token) {
            return Err(ConfigError::InvalidToken(mask_token(token)));
        }
        Ok(Self {
            region: region.to_string(),
            token: token.to_string(),
        })
    }

    pub fn base_url(&self) -> String {
        if self.region == "us" {
            "https://api.logz.io/v1/grafana".to_string()
        } else {
            format!("https://api-{}.logz.io/v1/grafana", self.region)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn loads_yaml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "grafana:\n  endpoint: http://grafana:3000/\n  token: abc\nprometheus:\n  endpoint: http://prom:9090\n  timeseries_count_interval: 10m\n",
        )
        .unwrap();

        let settings = ExtractorConfig::load(&path).unwrap().resolve(true).unwrap();
        assert_eq!(
            settings.grafana,
            Some(GrafanaSettings {
                endpoint: "http://grafana:3000".into(),
                token: Some("abc".into()),
            })
        );
        assert_eq!(
            settings.prometheus,
            Some(PrometheusSettings {
                endpoint: "http://prom:9090".into(),
                count_interval: "10m".into(),
            })
        );
    }

    #[test]
    fn loads_toml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[prometheus]\nendpoint = \"http://prom:9090\"\n").unwrap();

        let settings = ExtractorConfig::load(&path).unwrap().resolve(false).unwrap();
        assert!(settings.grafana.is_none());
        assert_eq!(settings.prometheus.unwrap().count_interval, "5m");
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = ExtractorConfig::load("/nonexistent/config.yaml").unwrap();
        assert!(config.grafana.is_none());
        assert!(config.prometheus.is_none());
    }

    #[test]
    fn unparseable_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "grafana: [unclosed").unwrap();
        assert!(matches!(
            ExtractorConfig::load(&path),
            Err(ConfigError::Load { .. })
        ));
    }

    #[test]
    fn full_mode_requires_grafana_endpoint() {
        let config = ExtractorConfig {
            grafana: Some(GrafanaConfig {
                endpoint: Some("  ".into()),
                token: None,
            }),
            prometheus: None,
        };
        assert!(matches!(
            config.resolve(true),
            Err(ConfigError::MissingEndpoint("grafana.endpoint"))
        ));
        assert!(config.resolve(false).unwrap().grafana.is_none());
    }

    #[test]
    fn env_overrides_win() {
        let env = HashMap::from([
            ("GRAFANA_ENDPOINT", "http://env-grafana"),
            ("PROMETHEUS_ENDPOINT", "http://env-prom"),
            ("PROMETHEUS_TIMESERIES_COUNT_INTERVAL", "15m"),
        ]);
        let config = ExtractorConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()));
        let settings = config.resolve(true).unwrap();
        assert_eq!(settings.grafana.unwrap().endpoint, "http://env-grafana");
        assert_eq!(settings.prometheus.unwrap().count_interval, "15m");
    }

    #[test]
    fn prompted_answers_only_fill_gaps() {
        let loaded = ExtractorConfig {
            grafana: None,
            prometheus: Some(PrometheusConfig {
                endpoint: Some("http://env-prom:9090".into()),
                timeseries_count_interval: Some("15m".into()),
            }),
        };
        let answers = ExtractorConfig {
            grafana: Some(GrafanaConfig {
                endpoint: Some("http://typed-grafana".into()),
                token: Some("typed".into()),
            }),
            prometheus: Some(PrometheusConfig {
                endpoint: Some("http://typed-prom".into()),
                timeseries_count_interval: None,
            }),
        };

        let settings = loaded.fill_missing(answers).resolve(true).unwrap();
        assert_eq!(
            settings.grafana,
            Some(GrafanaSettings {
                endpoint: "http://typed-grafana".into(),
                token: Some("typed".into()),
            })
        );
        assert_eq!(
            settings.prometheus,
            Some(PrometheusSettings {
                endpoint: "http://env-prom:9090".into(),
                count_interval: "15m".into(),
            })
        );
    }

    #[test]
    fn interval_validation() {
        assert_eq!(count_interval(Some("30m")), "30m");
        assert_eq!(count_interval(Some("1h")), "5m");
        assert_eq!(count_interval(Some("m")), "5m");
        assert_eq!(count_interval(None), "5m");
    }

    #[test]
    fn logzio_credentials() {
        let creds = LogzioCredentials::new("eu", "abcd1234-ab12-cd34-ef56-abcdef123456").unwrap();
        assert_eq!(creds.base_url(), "https://api-eu.logz.io/v1/grafana");

        let us = LogzioCredentials::new("us", "a-b-c-d-e").unwrap();
        assert_eq!(us.base_url(), "https://api.logz.io/v1/grafana");

        assert!(matches!(
            LogzioCredentials::new("xx", "a-b-c-d-e"),
            Err(ConfigError::UnsupportedRegion(r)) if r == "xx"
        ));
        assert!(matches!(
            LogzioCredentials::new("us", "not-a-valid-token"),
            Err(ConfigError::InvalidToken(_))
        ));
        assert!(matches!(
            LogzioCredentials::new("us", "ABCD-b-c-d-e"),
            Err(ConfigError::InvalidToken(_))
        ));
    }
}
