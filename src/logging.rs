/// Structured logging for the anomaly engine
///
/// Events go through `tracing` with the pipeline component and the
/// station/element identifiers attached as fields. `init_logger` installs a
/// `tracing-subscriber` fmt subscriber writing to the console or, for batch
/// runs, appending to a file.

use std::fmt;
use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::model::{ModelFitError, ModelKind, UnavailableReason};

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn as_tracing(self) -> Level {
        match self {
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warning => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Ingest,
    Qa,
    Ensemble,
    Report,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Ingest => write!(f, "INGEST"),
            Component::Qa => write!(f, "QA"),
            Component::Ensemble => write!(f, "ENSEMBLE"),
            Component::Report => write!(f, "REPORT"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected - short or sparse series, the ensemble simply has less to work with
    Expected,
    /// Unexpected - numerical trouble or an exhausted budget
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a model fit failure
pub fn classify_fit_failure(err: &ModelFitError) -> FailureType {
    match err {
        ModelFitError::InsufficientPoints { .. } => FailureType::Expected,
        ModelFitError::Degenerate { .. } => FailureType::Unexpected,
    }
}

/// Classify an element-level ensemble outage
pub fn classify_unavailable(reason: UnavailableReason) -> FailureType {
    match reason {
        UnavailableReason::TooFewPoints => FailureType::Expected,
        UnavailableReason::BudgetExhausted => FailureType::Unexpected,
        UnavailableReason::AllModelsFailed => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `min_level` when set. Calling this more
/// than once is harmless; only the first call installs a subscriber.
pub fn init_logger(
    min_level: LogLevel,
    log_file: Option<&str>,
    console_timestamps: bool,
) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.as_tracing().as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None if console_timestamps => builder.with_writer(std::io::stderr).try_init(),
        None => builder
            .without_time()
            .with_writer(std::io::stderr)
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("logger already initialized; keeping existing subscriber");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a model that dropped out of the ensemble vote
pub fn log_fit_failure(station_id: &str, element: &str, err: &ModelFitError) {
    let failure_type = classify_fit_failure(err);
    match failure_type {
        FailureType::Expected => tracing::debug!(
            component = %Component::Ensemble, station = station_id, element,
            "model skipped [{}]: {}", failure_type, err
        ),
        FailureType::Unexpected => tracing::warn!(
            component = %Component::Ensemble, station = station_id, element,
            "model fit failed [{}]: {}", failure_type, err
        ),
        FailureType::Unknown => tracing::info!(
            component = %Component::Ensemble, station = station_id, element,
            "model fit failed [{}]: {}", failure_type, err
        ),
    }
}

/// Log an element falling back to statistical-only scoring
pub fn log_ensemble_unavailable(station_id: &str, element: &str, reason: UnavailableReason) {
    let failure_type = classify_unavailable(reason);
    match failure_type {
        FailureType::Expected => tracing::debug!(
            component = %Component::Ensemble, station = station_id, element,
            "ensemble unavailable [{}]: {}; statistical-only", failure_type, reason
        ),
        _ => tracing::warn!(
            component = %Component::Ensemble, station = station_id, element,
            "ensemble unavailable [{}]: {}; statistical-only", failure_type, reason
        ),
    }
}

/// Log which models made it into an element's ensemble
pub fn log_ensemble_fitted(station_id: &str, element: &str, models: &[ModelKind], points: usize) {
    let names: Vec<String> = models.iter().map(ToString::to_string).collect();
    tracing::debug!(
        component = %Component::Ensemble, station = station_id, element, points,
        "fitted {}", names.join(", ")
    );
}

// ---------------------------------------------------------------------------
// Run Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one station analysis
pub fn log_analysis_summary(
    station_id: &str,
    elements: usize,
    degraded: usize,
    records: usize,
    anomalies: usize,
) {
    if degraded == 0 {
        tracing::info!(
            component = %Component::Report, station = station_id,
            "analysis complete: {} records across {} elements, {} anomalies",
            records, elements, anomalies
        );
    } else {
        tracing::warn!(
            component = %Component::Report, station = station_id,
            "analysis complete: {} records across {} elements, {} anomalies ({} elements statistical-only)",
            records, elements, anomalies, degraded
        );
    }
}

/// Log records dropped and values ignored during validation
pub fn log_validation_notes(station_id: &str, dropped: usize, ignored: usize) {
    if dropped > 0 {
        tracing::warn!(
            component = %Component::Ingest, station = station_id,
            "{} records failed validation and were excluded", dropped
        );
    }
    if ignored > 0 {
        tracing::warn!(
            component = %Component::Ingest, station = station_id,
            "{} non-finite values ignored", ignored
        );
    }
}

/// Log the outcome of the station QA checks
pub fn log_qa_summary(station_id: &str, issues: usize, qa_score: f64, elevated: bool) {
    if issues == 0 {
        tracing::debug!(
            component = %Component::Qa, station = station_id,
            "QA passed (score {:.0})", qa_score
        );
    } else if elevated {
        tracing::warn!(
            component = %Component::Qa, station = station_id, issues,
            "QA found {} issues (score {:.0}); fitting with elevated contamination",
            issues, qa_score
        );
    } else {
        tracing::info!(
            component = %Component::Qa, station = station_id, issues,
            "QA found {} issues (score {:.0})", issues, qa_score
        );
    }
}
