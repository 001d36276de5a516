/// Station analysis pipeline.
///
/// `AnalysisEngine` owns the validated configuration and a dedicated rayon
/// pool. One analysis run:
///
/// 1. validates the snapshot's records (bad ones become run-summary notes)
/// 2. runs the station QA checks, raising ensemble contamination on a poor
///    station
/// 3. builds each requested element's sorted series
/// 4. fits the ensemble per element on the pool, within the station budget
/// 5. scores every in-period date that has a baseline and gates the result
/// 6. assembles the station report
///
/// Elements are independent units of work and share nothing mutable; the
/// snapshot is read through an `Arc` and never reordered.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, mpsc};

use chrono::NaiveDate;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::analysis::baseline::compute_baseline;
use crate::analysis::ensemble::{Deadline, EnsembleDetector, EnsembleOutcome};
use crate::analysis::features::build_features;
use crate::analysis::hybrid;
use crate::analysis::qa;
use crate::analysis::series::extract_element_series;
use crate::config::AnalysisConfig;
use crate::ingest::StationSnapshot;
use crate::logging;
use crate::model::{AnalysisError, DataValidationError, Observation, ValidationNote};
use crate::report::{AnalysisPeriod, AnalysisReport, ElementAnalysis};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub station_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Elements to analyze, in report order. `None` means every element
    /// present in the snapshot, sorted by code.
    pub elements: Option<Vec<String>>,
}

impl AnalysisRequest {
    pub fn new(station_id: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            station_id: station_id.into(),
            start,
            end,
            elements: None,
        }
    }

    pub fn with_elements<I, S>(mut self, elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.elements = Some(elements.into_iter().map(Into::into).collect());
        self
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn check_record(
    expected_station: &str,
    obs: &Observation,
    seen: &HashSet<NaiveDate>,
) -> Result<(), DataValidationError> {
    if obs.station_id.trim().is_empty() {
        return Err(DataValidationError::MissingStationId);
    }
    if obs.station_id != expected_station {
        return Err(DataValidationError::StationMismatch {
            expected: expected_station.to_string(),
            found: obs.station_id.clone(),
        });
    }
    if obs.values.values().all(|v| !v.is_finite()) {
        return Err(DataValidationError::NoElementValues { date: obs.date });
    }
    if seen.contains(&obs.date) {
        return Err(DataValidationError::DuplicateDate { date: obs.date });
    }
    Ok(())
}

/// Splits a snapshot into usable records and notes for the rejected ones.
///
/// The first record for a date wins; later ones are duplicates. An infinite
/// value in a kept record is noted and left for the series to drop.
pub fn validate_observations(
    station_id: &str,
    observations: &[Observation],
) -> (Vec<Observation>, Vec<ValidationNote>) {
    let mut valid = Vec::with_capacity(observations.len());
    let mut notes = Vec::new();
    let mut seen = HashSet::new();

    for (row, obs) in observations.iter().enumerate() {
        match check_record(station_id, obs, &seen) {
            Ok(()) => {
                seen.insert(obs.date);
                for (element, _) in obs.values.iter().filter(|(_, v)| v.is_infinite()) {
                    let err = DataValidationError::NonFiniteValue {
                        date: obs.date,
                        element: element.clone(),
                    };
                    notes.push(ValidationNote::new(row, &err));
                }
                valid.push(obs.clone());
            }
            Err(err) => notes.push(ValidationNote::new(row, &err)),
        }
    }

    (valid, notes)
}

/// The request's elements with repeats removed, or every element present.
fn elements_to_analyze(request: &AnalysisRequest, observations: &[Observation]) -> Vec<String> {
    match &request.elements {
        Some(requested) => {
            let mut seen = HashSet::new();
            requested
                .iter()
                .filter(|e| seen.insert(e.as_str()))
                .cloned()
                .collect()
        }
        None => observations
            .iter()
            .flat_map(|o| o.values.keys().cloned())
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Per-element analysis
// ---------------------------------------------------------------------------

/// Analyzes one element. `None` when the snapshot holds no values for it.
fn analyze_element(
    config: &AnalysisConfig,
    request: &AnalysisRequest,
    observations: &[Observation],
    element: &str,
    deadline: Deadline,
) -> Option<ElementAnalysis> {
    let series = extract_element_series(observations, element);
    if series.is_empty() {
        return None;
    }

    let station_id = request.station_id.as_str();
    let period = series.range_between(request.start, request.end);
    let period_points = &series.points()[period.clone()];
    let period_values: Vec<f64> = period_points.iter().map(|p| p.value).collect();
    let period_flags: Vec<Option<String>> = period_points.iter().map(|p| p.raw_flags.clone()).collect();

    if period.is_empty() {
        return Some(ElementAnalysis {
            element: element.to_string(),
            period_values,
            period_flags,
            anomalies: Vec::new(),
            ensemble: Ok(Vec::new()),
        });
    }

    let features = build_features(&series, config.ensemble.rolling_window);
    let detector = EnsembleDetector::from_config(&config.ensemble);
    let (fitted, ensemble) = match detector.fit(&features, deadline, station_id, element) {
        EnsembleOutcome::Available(fitted) => {
            let kinds = fitted.kinds();
            (Some(fitted), Ok(kinds))
        }
        EnsembleOutcome::Unavailable(reason) => {
            logging::log_ensemble_unavailable(station_id, element, reason);
            (None, Err(reason))
        }
    };

    let anomalies = period
        .filter_map(|i| {
            let point = &series.points()[i];
            let baseline = compute_baseline(&series, point.date, config.baseline.window_radius_days)?;
            let votes = fitted.as_ref().map(|f| f.votes(features.row(i)));
            let candidate =
                hybrid::aggregate(station_id, element, point, &baseline, votes, &config.aggregation);
            hybrid::passes_gate(&candidate, &config.aggregation).then_some(candidate)
        })
        .collect();

    Some(ElementAnalysis {
        element: element.to_string(),
        period_values,
        period_flags,
        anomalies,
        ensemble,
    })
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Runs station analyses on a dedicated worker pool.
#[derive(Clone)]
pub struct AnalysisEngine {
    config: Arc<AnalysisConfig>,
    pool: Arc<ThreadPool>,
}

impl AnalysisEngine {
    /// Validates `config` and starts the worker pool.
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;

        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("addis-worker-{}", i));
        if let Some(workers) = config.runtime.workers {
            builder = builder.num_threads(workers);
        }
        let pool = builder
            .build()
            .map_err(|e| AnalysisError::WorkerPool(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            pool: Arc::new(pool),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyzes one station, blocking the calling thread until done.
    pub fn analyze(
        &self,
        snapshot: &StationSnapshot,
        request: &AnalysisRequest,
    ) -> Result<AnalysisReport, AnalysisError> {
        if request.start > request.end {
            return Err(AnalysisError::InvalidPeriod {
                start: request.start,
                end: request.end,
            });
        }

        let deadline = Deadline::from_budget_ms(self.config.runtime.station_budget_ms);
        let station_id = request.station_id.as_str();

        let (observations, notes) = validate_observations(station_id, &snapshot.observations);
        let dropped = snapshot.observations.len() - observations.len();
        logging::log_validation_notes(station_id, dropped, notes.len() - dropped);

        let station_qa = self
            .config
            .qa
            .enabled
            .then(|| qa::run_checks(&observations, &self.config.qa));
        if let Some(qa) = &station_qa {
            logging::log_qa_summary(station_id, qa.total_issues(), qa.qa_score, qa.contamination_elevated);
        }
        let elevated;
        let config = match &station_qa {
            Some(qa) if qa.contamination_elevated => {
                elevated = AnalysisConfig {
                    ensemble: self
                        .config
                        .ensemble
                        .with_min_contamination(self.config.qa.elevated_contamination),
                    ..self.config.as_ref().clone()
                };
                &elevated
            }
            _ => self.config.as_ref(),
        };

        let elements = elements_to_analyze(request, &observations);
        let results: Vec<Option<ElementAnalysis>> = self.pool.install(|| {
            elements
                .par_iter()
                .map(|element| analyze_element(config, request, &observations, element, deadline))
                .collect()
        });

        let analyzed: Vec<ElementAnalysis> = results.into_iter().flatten().collect();
        if analyzed.is_empty() {
            return Err(AnalysisError::NoAnalyzableData {
                station_id: station_id.to_string(),
            });
        }

        let report = AnalysisReport::assemble(
            station_id,
            AnalysisPeriod {
                start: request.start,
                end: request.end,
            },
            config.aggregation.confidence_threshold,
            notes,
            analyzed,
            station_qa,
        );

        logging::log_analysis_summary(
            station_id,
            report.summary.elements_analyzed.len(),
            report.summary.degraded_elements.len(),
            report.summary.total_records,
            report.summary.total_anomalies,
        );
        Ok(report)
    }

    /// Queues an analysis on the pool and returns immediately.
    ///
    /// The receiver yields exactly one result.
    pub fn submit(
        &self,
        snapshot: Arc<StationSnapshot>,
        request: AnalysisRequest,
    ) -> mpsc::Receiver<Result<AnalysisReport, AnalysisError>> {
        let (tx, rx) = mpsc::channel();
        let engine = self.clone();
        self.pool.spawn(move || {
            let result = engine.analyze(&snapshot, &request);
            // The caller may have dropped the receiver; nothing to do then.
            let _ = tx.send(result);
        });
        rx
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
