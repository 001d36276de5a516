//! addis: analyze one station's daily CSV and print the JSON report.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::Parser;

use addis_service::config::{self, AnalysisConfig};
use addis_service::ingest::ghcn;
use addis_service::logging::{self, LogLevel};
use addis_service::pipeline::{AnalysisEngine, AnalysisRequest};

#[derive(Parser)]
#[command(name = "addis")]
#[command(about = "Weather station anomaly detection", long_about = None)]
struct Cli {
    /// GHCN-Daily CSV for the station
    csv_path: PathBuf,

    /// Station identifier, e.g. USW00014842
    #[arg(long)]
    station: String,

    /// First date of the analysis period (YYYY-MM-DD)
    #[arg(long)]
    start: NaiveDate,

    /// Last date of the analysis period (YYYY-MM-DD)
    #[arg(long)]
    end: NaiveDate,

    /// TOML configuration file
    #[arg(long, env = "ADDIS_CONFIG")]
    config: Option<PathBuf>,

    /// Comma-separated element codes (default: every element in the file)
    #[arg(long, value_delimiter = ',')]
    elements: Option<Vec<String>>,

    /// debug, info, warn or error
    #[arg(long, default_value = "info")]
    log_level: LogLevel,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<String>,
}

fn run(cli: Cli) -> Result<String, String> {
    let config = match &cli.config {
        Some(path) => config::load_config(path).map_err(|e| e.to_string())?,
        None => AnalysisConfig::default(),
    };
    let engine = AnalysisEngine::new(config).map_err(|e| e.to_string())?;

    let text = std::fs::read_to_string(&cli.csv_path)
        .map_err(|e| format!("failed to read {}: {}", cli.csv_path.display(), e))?;
    let parsed = ghcn::parse_station_csv(&text).map_err(|e| e.to_string())?;
    if !parsed.notes.is_empty() {
        tracing::warn!("{} CSV rows could not be parsed", parsed.notes.len());
    }
    let snapshot = parsed.into_snapshot(&cli.station);

    let mut request = AnalysisRequest::new(&cli.station, cli.start, cli.end);
    if let Some(elements) = cli.elements {
        request = request.with_elements(elements);
    }

    let report = engine.analyze(&snapshot, &request).map_err(|e| e.to_string())?;
    report.to_json_pretty().map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = logging::init_logger(cli.log_level, cli.log_file.as_deref(), false) {
        eprintln!("failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
