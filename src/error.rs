use std::path::PathBuf;

use thiserror::Error;

/// User-input errors. These abort the run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("region code is not supported: {0}")]
    UnsupportedRegion(String),
    #[error("API token is invalid: {0}")]
    InvalidToken(String),
    #[error("missing required setting `{0}`")]
    MissingEndpoint(&'static str),
    #[error("cannot load config from {path}: {message}")]
    Load { path: PathBuf, message: String },
    #[error("invalid menu choice `{0}`, expected 1 or 2")]
    InvalidChoice(String),
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("cannot decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Keep the first token segment, hide the rest.
pub fn mask_token(token: &str) -> String {
    match token.split_once('-') {
        Some((head, _)) => format!("{head}-****"),
        None if token.chars().count() > 4 => {
            format!("{}****", token.chars().take(4).collect::<String>())
        }
        None => "****".to_string(),
    }
}
