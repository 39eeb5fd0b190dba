use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dashboard_metrics::config::ExtractorConfig;
use dashboard_metrics::pipeline::{self, Command, DashboardOrigin, RunOptions};
use dashboard_metrics::prompt::{self, DEFAULT_DASHBOARDS_DIR};
use dashboard_metrics::report::DEFAULT_OUTPUT;

/// Extract the metrics Grafana dashboards use and compare them with what
/// Prometheus stores.
#[derive(Debug, Parser)]
#[command(name = "dashboard-metrics", version)]
struct Cli {
    /// YAML or TOML config file.
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Where the per-dashboard metric lists are written.
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Also print metric names grouped by collector input.
    #[arg(long)]
    telegraf: bool,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Dashboards from the Grafana API plus Prometheus series counts.
    Full,
    /// Dashboard metrics only, from a folder or the Logz.io Grafana API.
    Dashboards {
        #[arg(long, conflicts_with_all = ["region", "token"])]
        folder: Option<PathBuf>,
        #[arg(long, requires = "token")]
        region: Option<String>,
        #[arg(long, requires = "region")]
        token: Option<String>,
    },
}

impl CliCommand {
    fn into_command(self) -> Command {
        match self {
            CliCommand::Full => Command::Full,
            CliCommand::Dashboards {
                region: Some(region),
                token: Some(token),
                ..
            } => Command::Dashboards(DashboardOrigin::Logzio { region, token }),
            CliCommand::Dashboards { folder, .. } => Command::Dashboards(DashboardOrigin::Folder(
                folder.unwrap_or_else(|| PathBuf::from(DEFAULT_DASHBOARDS_DIR)),
            )),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dashboard_metrics=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ExtractorConfig::load(&cli.config)?.with_env();

    let command = match cli.command {
        Some(command) => command.into_command(),
        None => {
            let command = prompt::prompt_command(&mut io::stdin().lock(), &mut io::stdout())?;
            if command == Command::Full && config.resolve(true).is_err() {
                let answers = prompt::prompt_config(&mut io::stdin().lock(), &mut io::stdout())?;
                config = config.fill_missing(answers);
            }
            command
        }
    };

    let options = RunOptions {
        output: cli.output,
        telegraf: cli.telegraf,
    };
    let outcome = pipeline::run(command, &config, &options).await?;
    tracing::info!(
        "extracted {} distinct metric(s) from {} dashboard(s)",
        outcome.extraction.all.len(),
        outcome.extraction.dashboards.len()
    );
    Ok(())
}
