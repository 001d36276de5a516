/// Core data types for the station anomaly engine.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no logic beyond small accessors and `Display` impls, and no I/O.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::ConfigError;

// ---------------------------------------------------------------------------
// Input records
// ---------------------------------------------------------------------------

/// One station-day of observations as delivered by the acquisition layer.
///
/// Values are already unit-normalized. `flags` maps the same element codes to
/// the raw `"measurement,quality,source"` provenance string; an element may
/// have a value without flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub station_id: String,
    pub date: NaiveDate,
    pub values: BTreeMap<String, f64>,
    pub flags: BTreeMap<String, String>,
}

impl Observation {
    pub fn new(station_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            station_id: station_id.into(),
            date,
            values: BTreeMap::new(),
            flags: BTreeMap::new(),
        }
    }

    /// Builder-style helper used by the ingest layer and tests.
    pub fn with_value(mut self, element: &str, value: f64, raw_flags: Option<&str>) -> Self {
        self.values.insert(element.to_string(), value);
        if let Some(raw) = raw_flags {
            self.flags.insert(element.to_string(), raw.to_string());
        }
        self
    }

    pub fn value(&self, element: &str) -> Option<f64> {
        self.values.get(element).copied()
    }

    pub fn raw_flags(&self, element: &str) -> Option<&str> {
        self.flags.get(element).map(String::as_str)
    }
}

/// Parsed provenance flags. Each position is empty or one character code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlagTriple {
    pub measurement: Option<char>,
    pub quality: Option<char>,
    pub source: Option<char>,
}

/// Which of the three flag positions a code came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagPosition {
    Measurement,
    Quality,
    Source,
}

impl fmt::Display for FlagPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagPosition::Measurement => write!(f, "measurement"),
            FlagPosition::Quality => write!(f, "quality"),
            FlagPosition::Source => write!(f, "source"),
        }
    }
}

// ---------------------------------------------------------------------------
// Quality
// ---------------------------------------------------------------------------

/// Signed score contribution of each flag position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FlagPenalties {
    pub measurement: f64,
    pub quality: f64,
    pub source: f64,
}

impl FlagPenalties {
    pub fn total(&self) -> f64 {
        self.measurement + self.quality + self.source
    }
}

/// Notes recorded while scoring a flag string. None of them block scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityAnnotation {
    /// The raw string could not be parsed; it was scored as empty.
    Malformed { raw: String },
    /// A code that is not in the lookup table for its position.
    UnrecognizedCode { position: FlagPosition, code: char },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityScore {
    /// Always within [0, 100].
    pub value: f64,
    pub penalties: FlagPenalties,
    pub annotations: Vec<QualityAnnotation>,
}

impl QualityScore {
    /// Score for an observation that carries no flags at all.
    pub fn perfect() -> Self {
        Self {
            value: 100.0,
            penalties: FlagPenalties::default(),
            annotations: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Baseline and detection results
// ---------------------------------------------------------------------------

/// Windowed summary statistics around (and excluding) a target date.
///
/// Only ever constructed with `sample_size >= MIN_BASELINE_SAMPLE`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineWindow {
    pub element: String,
    pub target_date: NaiveDate,
    pub window_radius_days: u32,
    pub mean: f64,
    pub std_dev: f64,
    pub sample_size: usize,
    pub min: f64,
    pub max: f64,
    pub p25: f64,
    pub p75: f64,
}

/// Severity tiers, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Mild,
    Moderate,
    Extreme,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::None => write!(f, "none"),
            Severity::Mild => write!(f, "mild"),
            Severity::Moderate => write!(f, "moderate"),
            Severity::Extreme => write!(f, "extreme"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    High,
    Low,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::High => write!(f, "high"),
            Direction::Low => write!(f, "low"),
        }
    }
}

/// Outcome of the deviation test for one observed value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatisticalResult {
    /// `None` when the baseline is degenerate (zero standard deviation).
    pub z: Option<f64>,
    pub severity: Severity,
    pub direction: Direction,
}

/// The unsupervised model variants that make up the ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    IsolationForest,
    LocalOutlierFactor,
    OneClassSvm,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::IsolationForest => write!(f, "IsolationForest"),
            ModelKind::LocalOutlierFactor => write!(f, "LOF"),
            ModelKind::OneClassSvm => write!(f, "OneClassSVM"),
        }
    }
}

/// One model's opinion about one point. Higher `score` = more anomalous.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelVote {
    pub model: ModelKind,
    pub is_anomaly: bool,
    pub score: f64,
}

/// Why the ensemble contributed nothing for an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    /// The series is shorter than every model's minimum.
    TooFewPoints,
    /// Enough points, but every fit failed.
    AllModelsFailed,
    /// The station's wall-clock budget ran out before fitting finished.
    BudgetExhausted,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::TooFewPoints => write!(f, "too few points"),
            UnavailableReason::AllModelsFailed => write!(f, "all models failed"),
            UnavailableReason::BudgetExhausted => write!(f, "budget exhausted"),
        }
    }
}

/// A scored (element, date) pair. Emitted for every pair with a baseline;
/// the report keeps only those that pass the confidence gate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyCandidate {
    pub station_id: String,
    pub date: NaiveDate,
    pub element: String,
    pub observed_value: f64,
    pub statistical_z: Option<f64>,
    /// Empty when the ensemble was unavailable for this element.
    pub ensemble_votes: Vec<ModelVote>,
    pub combined_confidence: f64,
    pub severity: Severity,
    pub direction: Direction,
    pub quality_score: QualityScore,
    pub explanation_text: String,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures that abort a whole analysis run.
///
/// Per-record and per-element problems never surface here; they degrade the
/// report instead.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("no analyzable element data for station {station_id}")]
    NoAnalyzableData { station_id: String },

    #[error("invalid analysis period: {start} is after {end}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("worker pool error: {0}")]
    WorkerPool(String),
}

/// A single ensemble variant could not be fitted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelFitError {
    #[error("{model} needs at least {required} points, got {actual}")]
    InsufficientPoints {
        model: ModelKind,
        required: usize,
        actual: usize,
    },

    #[error("{model} fit degenerate: {reason}")]
    Degenerate { model: ModelKind, reason: String },
}

/// A single input record is unusable; it is dropped and noted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataValidationError {
    #[error("record has no station id")]
    MissingStationId,

    #[error("record has no date")]
    MissingDate,

    #[error("unparseable date '{0}'")]
    InvalidDate(String),

    #[error("record for {date} has no element values")]
    NoElementValues { date: NaiveDate },

    #[error("record belongs to station {found}, expected {expected}")]
    StationMismatch { expected: String, found: String },

    #[error("duplicate record for {date}")]
    DuplicateDate { date: NaiveDate },

    /// The value is ignored; the rest of the record is kept.
    #[error("non-finite {element} value on {date} ignored")]
    NonFiniteValue { date: NaiveDate, element: String },
}

/// A dropped record or ignored value, as attached to the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationNote {
    /// Zero-based position of the record in its source.
    pub row: usize,
    pub message: String,
}

impl ValidationNote {
    pub fn new(row: usize, err: &DataValidationError) -> Self {
        Self {
            row,
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering_is_ascending() {
        assert!(Severity::None < Severity::Mild);
        assert!(Severity::Mild < Severity::Moderate);
        assert!(Severity::Moderate < Severity::Extreme);
    }

    #[test]
    fn test_observation_builder_records_value_and_flags() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 4).unwrap();
        let obs = Observation::new("USW00014842", date)
            .with_value("TMAX", 91.0, Some(",,0"))
            .with_value("PRCP", 0.0, None);

        assert_eq!(obs.value("TMAX"), Some(91.0));
        assert_eq!(obs.raw_flags("TMAX"), Some(",,0"));
        assert_eq!(obs.value("PRCP"), Some(0.0));
        assert_eq!(obs.raw_flags("PRCP"), None);
        assert_eq!(obs.value("SNOW"), None);
    }

    #[test]
    fn test_severity_and_direction_display_lowercase() {
        assert_eq!(Severity::Moderate.to_string(), "moderate");
        assert_eq!(Direction::High.to_string(), "high");
        assert_eq!(ModelKind::LocalOutlierFactor.to_string(), "LOF");
    }

    #[test]
    fn test_validation_note_carries_error_message() {
        let note = ValidationNote::new(3, &DataValidationError::MissingStationId);
        assert_eq!(note.row, 3);
        assert_eq!(note.message, "record has no station id");
    }
}
