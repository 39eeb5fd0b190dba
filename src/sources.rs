//! Where dashboards come from: a local folder of JSON exports, or a Grafana
//! HTTP API (self-hosted or Logz.io-hosted).

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{GrafanaSettings, LogzioCredentials};
use crate::error::ExtractError;
use crate::models::dashboard::{Dashboard, DashboardDetail, DashboardSummary};

#[async_trait]
pub trait DashboardSource: Send + Sync {
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Vec<Dashboard>, ExtractError>;
}

/// Every `*.json` file in a directory, in file-name order.
pub struct FolderSource {
    dir: PathBuf,
}

impl FolderSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DashboardSource for FolderSource {
    fn describe(&self) -> String {
        format!("folder {}", self.dir.display())
    }

    async fn fetch(&self) -> Result<Vec<Dashboard>, ExtractError> {
        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut dashboards = Vec::new();
        for path in paths {
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("cannot read {}: {e}, skipping", path.display());
                    continue;
                }
            };
            match serde_json::from_str::<Value>(&contents) {
                Ok(doc) => dashboards.extend(dashboards_in_document(&path.display().to_string(), doc)),
                Err(e) => tracing::error!("{} is not valid JSON: {e}, skipping", path.display()),
            }
        }
        tracing::info!("loaded {} dashboard(s) from {}", dashboards.len(), self.dir.display());
        Ok(dashboards)
    }
}

/// A file may hold one dashboard, an export wrapper `{"dashboard": {...}}`,
/// or an array of either.
fn dashboards_in_document(origin: &str, doc: Value) -> Vec<Dashboard> {
    match doc {
        Value::Array(items) => items
            .into_iter()
            .flat_map(|item| dashboards_in_document(origin, item))
            .collect(),
        Value::Object(mut map) => {
            let inner = match map.remove("dashboard") {
                Some(dashboard @ Value::Object(_)) => dashboard,
                Some(other) => {
                    map.insert("dashboard".to_string(), other);
                    Value::Object(map)
                }
                None => Value::Object(map),
            };
            match Dashboard::deserialize(inner) {
                Ok(d) => vec![d],
                Err(e) => {
                    tracing::error!("{origin}: not a dashboard document: {e}, skipping");
                    Vec::new()
                }
            }
        }
        _ => {
            tracing::error!("{origin}: expected a JSON object or array, skipping");
            Vec::new()
        }
    }
}

/// Grafana HTTP API: `/api/search` then `/api/dashboards/uid/{uid}`.
pub struct GrafanaApi {
    http: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
}

impl GrafanaApi {
    pub fn new(base_url: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers,
        }
    }

    pub fn grafana(settings: &GrafanaSettings) -> Result<Self, ExtractError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &settings.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(Self::new(&settings.endpoint, headers))
    }

    pub fn logzio(creds: &LogzioCredentials) -> Result<Self, ExtractError> {
        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(&creds.token)?;
        token.set_sensitive(true);
        headers.insert("x-api-token", token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        Ok(Self::new(creds.base_url(), headers))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ExtractError> {
        let resp = self
            .http
            .get(url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|source| ExtractError::Http {
                url: url.to_string(),
                source,
            })?;
        let status = resp.status();
        let body = resp.text().await.map_err(|source| ExtractError::Http {
            url: url.to_string(),
            source,
        })?;
        if !status.is_success() {
            return Err(ExtractError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|source| ExtractError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// UIDs of every `dash-db` entry returned by the search endpoint.
    pub async fn dashboard_uids(&self) -> Result<Vec<String>, ExtractError> {
        tracing::info!("extracting dashboard uids");
        let url = format!("{}/api/search", self.base_url);
        let summaries: Vec<DashboardSummary> = self.get_json(&url).await?;
        Ok(summaries
            .into_iter()
            .filter(|s| s.kind == "dash-db")
            .filter_map(|s| s.uid)
            .collect())
    }

    pub async fn dashboard(&self, uid: &str) -> Result<Dashboard, ExtractError> {
        let url = format!("{}/api/dashboards/uid/{}", self.base_url, urlencoding::encode(uid));
        let detail: DashboardDetail = self.get_json(&url).await?;
        Ok(detail.dashboard)
    }
}

#[async_trait]
impl DashboardSource for GrafanaApi {
    fn describe(&self) -> String {
        format!("grafana api {}", self.base_url)
    }

    async fn fetch(&self) -> Result<Vec<Dashboard>, ExtractError> {
        let uids = self.dashboard_uids().await?;
        tracing::info!("fetching {} dashboard(s) by uid", uids.len());

        let mut dashboards = Vec::with_capacity(uids.len());
        for uid in &uids {
            match self.dashboard(uid).await {
                Ok(d) => dashboards.push(d),
                Err(e) => tracing::error!("error while fetching dashboard with uid {uid}: {e}"),
            }
        }
        Ok(dashboards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};
    use serde_json::json;

    #[tokio::test]
    async fn api_fetches_dash_db_entries_only() {
        let server = MockServer::start_async().await;
        let search = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/search")
                    .header("authorization", "Bearer secret");
                then.status(200).json_body(json!([
                    { "type": "dash-db", "uid": "a1", "title": "Nodes" },
                    { "type": "dash-folder", "uid": "f1", "title": "Folder" },
                    { "type": "dash-db", "uid": "b2", "title": "Gone" }
                ]));
            })
            .await;
        let nodes = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/dashboards/uid/a1");
                then.status(200).json_body(json!({
                    "dashboard": { "title": "Nodes", "panels": [] },
                    "meta": { "slug": "nodes" }
                }));
            })
            .await;
        let gone = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/dashboards/uid/b2");
                then.status(404).body("not found");
            })
            .await;

        let api = GrafanaApi::grafana(&GrafanaSettings {
            endpoint: server.base_url(),
            token: Some("secret".into()),
        })
        .unwrap();
        let dashboards = api.fetch().await.unwrap();

        assert_eq!(dashboards.len(), 1);
        assert_eq!(dashboards[0].title(), "Nodes");
        search.assert_async().await;
        nodes.assert_async().await;
        gone.assert_async().await;
    }

    #[tokio::test]
    async fn failed_search_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/search");
                then.status(401).body("unauthorized");
            })
            .await;

        let api = GrafanaApi::new(server.base_url(), HeaderMap::new());
        let err = api.fetch().await.unwrap_err();
        assert!(matches!(err, ExtractError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn folder_reads_every_document_shape() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), r#"{"title": "plain", "panels": []}"#).unwrap();
        std::fs::write(
            dir.path().join("b.json"),
            r#"{"dashboard": {"title": "wrapped"}, "meta": {}}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("c.json"),
            r#"[{"title": "first"}, {"title": "second"}]"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("d.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let dashboards = FolderSource::new(dir.path()).fetch().await.unwrap();
        let titles: Vec<&str> = dashboards.iter().map(|d| d.title()).collect();
        assert_eq!(titles, vec!["plain", "wrapped", "first", "second"]);
    }

    #[tokio::test]
    async fn missing_folder_is_an_error() {
        let err = FolderSource::new("/nonexistent/dashboards").fetch().await.unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));
    }

    #[test]
    fn logzio_headers() {
        let creds = LogzioCredentials::new("uk", "a1-b2-c3-d4-e5").unwrap();
        let api = GrafanaApi::logzio(&creds).unwrap();
        assert_eq!(api.base_url, "https://api-uk.logz.io/v1/grafana");
        assert_eq!(api.headers.get("x-api-token").unwrap(), "a1-b2-c3-d4-e5");
        assert!(api.headers.get(AUTHORIZATION).is_none());
    }
}
