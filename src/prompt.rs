//! Interactive fallback when no subcommand is given on the command line.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::config::{ExtractorConfig, GrafanaConfig, PrometheusConfig};
use crate::error::{ConfigError, ExtractError};
use crate::pipeline::{Command, DashboardOrigin};

pub const DEFAULT_DASHBOARDS_DIR: &str = "dashboards";

const MAIN_MENU: &str = "Please enter 1 for extracting data from grafana and prometheus endpoints, or 2 for extracting metrics from logz.io: ";
const SOURCE_MENU: &str = "select:\n1. load data from the dashboards folder\n2. load data using api token\n";

fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<String> {
    output.write_all(question.as_bytes())?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Ask which extraction to run and, for dashboards-only mode, where the
/// dashboards come from.
pub fn prompt_command<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<Command, ExtractError> {
    let choice = ask(input, output, MAIN_MENU)?;
    match choice.as_str() {
        "1" => Ok(Command::Full),
        "2" => {
            let source = ask(input, output, SOURCE_MENU)?;
            match source.as_str() {
                "1" => Ok(Command::Dashboards(DashboardOrigin::Folder(PathBuf::from(
                    DEFAULT_DASHBOARDS_DIR,
                )))),
                "2" => {
                    let region = ask(input, output, "Enter logzio region:")?;
                    let token = ask(input, output, "Enter logzio api token:")?;
                    Ok(Command::Dashboards(DashboardOrigin::Logzio { region, token }))
                }
                _ => Err(ConfigError::InvalidChoice(source).into()),
            }
        }
        _ => Err(ConfigError::InvalidChoice(choice).into()),
    }
}

/// Ask for endpoints when no config file provides them. Blank answers leave
/// the setting unset.
pub fn prompt_config<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<ExtractorConfig> {
    let grafana_endpoint = ask(input, output, "No config file found, please enter grafana endpoint: ")?;
    let grafana_token = ask(input, output, "Please enter grafana api token: ")?;
    let prometheus_endpoint = ask(input, output, "Please enter prometheus endpoint: ")?;

    let answer = |s: String| Some(s).filter(|s| !s.is_empty());
    Ok(ExtractorConfig {
        grafana: Some(GrafanaConfig {
            endpoint: answer(grafana_endpoint),
            token: answer(grafana_token),
        }),
        prometheus: Some(PrometheusConfig {
            endpoint: answer(prometheus_endpoint),
            timeseries_count_interval: None,
        }),
    })
}
