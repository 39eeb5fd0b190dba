pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod promql;
pub mod report;
pub mod sources;
pub mod timeseries;
pub mod walker;

pub use error::{ConfigError, ExtractError};
pub use pipeline::{Command, DashboardOrigin, RunOptions, extract_all, run};
