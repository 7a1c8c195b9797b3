//! CLI entrypoint for the update-intensity pipeline.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use uidai_pulse::{Pipeline, PipelineSummary, PulseConfig, Result, Stage};

/// Classify and forecast state-level update intensity.
#[derive(Debug, Parser)]
#[command(name = "uidai-pulse")]
#[command(about = "State-level update intensity classification and forecasting")]
struct Cli {
    /// JSON config file; missing fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding the monthly feature table.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Months to forecast ahead.
    #[arg(long, global = true)]
    horizon: Option<usize>,
    /// Confidence level of the forecast bands, e.g. 0.9 (defaults to 95%).
    #[arg(long, global = true)]
    confidence: Option<f64>,
    /// Directory for the written tables (defaults to the data directory).
    #[arg(long, global = true)]
    output: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

/// Supported CLI subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Label every state as healthy, decaying or stagnant.
    Classify,
    /// Forecast the next months for every state.
    Forecast,
    /// Classify, then forecast.
    Run,
}

impl Command {
    fn stage(&self) -> Stage {
        match self {
            Command::Classify => Stage::Classify,
            Command::Forecast => Stage::Forecast,
            Command::Run => Stage::All,
        }
    }
}

fn build_config(cli: &Cli) -> Result<PulseConfig> {
    let config = match &cli.config {
        Some(path) => PulseConfig::from_json_file(path)?,
        None => PulseConfig::default(),
    };
    let mut config = config.with_env()?;

    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(horizon) = cli.horizon {
        config.forecast.horizon = horizon;
    }
    if let Some(level) = cli.confidence {
        config.forecast = config.forecast.with_confidence_level(level)?;
    }
    if let Some(dir) = &cli.output {
        config.output_dir = Some(dir.clone());
    }
    Ok(config)
}

fn print_summary(summary: &PipelineSummary) {
    println!(
        "Loaded {} rows ({} kept), {} states with enough history",
        summary.load.rows_read, summary.load.rows_kept, summary.entities
    );
    if summary.classified > 0 {
        let counts: Vec<String> = summary
            .label_counts
            .iter()
            .map(|(label, count)| format!("{label}: {count}"))
            .collect();
        println!("Classified {} states ({})", summary.classified, counts.join(", "));
    }
    if summary.forecast_attempted > 0 {
        println!(
            "Forecasted {} out of {} states",
            summary.forecast_succeeded, summary.forecast_attempted
        );
        if !summary.fallback_entities.is_empty() {
            println!(
                "Moving-average fallback used for: {}",
                summary.fallback_entities.join(", ")
            );
        }
    }
    for path in &summary.written {
        println!("Wrote {}", path.display());
    }
}

fn run(cli: Cli) -> Result<PipelineSummary> {
    let config = build_config(&cli)?;
    Pipeline::new(config)?.run(cli.command.stage())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "pipeline failed");
            ExitCode::FAILURE
        }
    }
}
