//! Station quality-assurance checks.
//!
//! Run once per analysis over the validated records, before any model is
//! fitted. A check reports at most one issue per element (or per element
//! pair), carrying the number of offending readings:
//!
//! - physical limits from the element registry
//! - internal consistency of same-day TMAX and TMIN
//! - temporal persistence of temperature readings
//! - climatological extremes of temperature readings
//!
//! Each issue costs the station 10 QA points. A station with more issues
//! than the configured limit gets its ensemble fitted with a higher
//! contamination.

use std::collections::BTreeSet;

use serde::Serialize;

use super::baseline::mean_and_sample_std;
use super::series::{ElementSeries, extract_element_series};
use crate::config::QaConfig;
use crate::elements::{self, ElementGroup};
use crate::model::Observation;

const MAX_QA_SCORE: f64 = 100.0;
const ISSUE_PENALTY: f64 = 10.0;

/// Largest plausible TMAX − TMIN spread in one day, in °F (50 °C).
const MAX_DAILY_RANGE: f64 = 90.0;

/// Persistence is only judged on more than 10 readings.
const MIN_PERSISTENCE_SAMPLE: usize = 11;
/// Climatology is only judged on more than 30 readings.
const MIN_CLIMATOLOGY_SAMPLE: usize = 31;
const CLIMATOLOGY_SIGMAS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QaCheck {
    PhysicalLimits,
    InternalConsistency,
    TemporalPersistence,
    ClimatologicalLimits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QaIssue {
    pub check: QaCheck,
    pub elements: Vec<String>,
    /// Offending readings; for persistence, the longest identical run.
    pub count: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationQa {
    /// Ordered by check, then elements.
    pub issues: Vec<QaIssue>,
    pub qa_score: f64,
    /// The ensemble was fitted with `qa.elevated_contamination`.
    pub contamination_elevated: bool,
}

impl StationQa {
    pub fn total_issues(&self) -> usize {
        self.issues.len()
    }
}

/// Runs every check over a station's validated records.
pub fn run_checks(observations: &[Observation], config: &QaConfig) -> StationQa {
    let codes: BTreeSet<&str> = observations
        .iter()
        .flat_map(|o| o.values.keys().map(String::as_str))
        .collect();
    let series: Vec<ElementSeries> = codes
        .iter()
        .map(|code| extract_element_series(observations, code))
        .collect();
    let temperatures = elements::codes_in_group(ElementGroup::Temperature);

    let mut issues: Vec<QaIssue> = series.iter().filter_map(physical_limits).collect();
    issues.extend(internal_consistency(observations));
    for s in series.iter().filter(|s| temperatures.contains(&s.element())) {
        issues.extend(temporal_persistence(s, config.max_identical_run));
        issues.extend(climatological_limits(s));
    }
    issues.sort_by(|a, b| a.check.cmp(&b.check).then_with(|| a.elements.cmp(&b.elements)));

    let qa_score = (MAX_QA_SCORE - ISSUE_PENALTY * issues.len() as f64).max(0.0);
    let contamination_elevated = issues.len() > config.issue_limit;
    StationQa {
        issues,
        qa_score,
        contamination_elevated,
    }
}

fn issue(check: QaCheck, elements: &[&str], count: usize, message: String) -> QaIssue {
    QaIssue {
        check,
        elements: elements.iter().map(|e| e.to_string()).collect(),
        count,
        message,
    }
}

fn physical_limits(series: &ElementSeries) -> Option<QaIssue> {
    let (min, max) = elements::physical_limits(series.element())?;
    let violations = series.values().filter(|v| *v < min || *v > max).count();
    (violations > 0).then(|| {
        issue(
            QaCheck::PhysicalLimits,
            &[series.element()],
            violations,
            format!(
                "{} values outside physical limits: {} violations",
                series.element(),
                violations
            ),
        )
    })
}

fn internal_consistency(observations: &[Observation]) -> Vec<QaIssue> {
    let pairs: Vec<(f64, f64)> = observations
        .iter()
        .filter_map(|o| Some((o.value("TMAX")?, o.value("TMIN")?)))
        .filter(|(hi, lo)| hi.is_finite() && lo.is_finite())
        .collect();

    let inverted = pairs.iter().filter(|(hi, lo)| hi < lo).count();
    let wide = pairs.iter().filter(|(hi, lo)| hi - lo > MAX_DAILY_RANGE).count();

    let mut issues = Vec::new();
    if inverted > 0 {
        issues.push(issue(
            QaCheck::InternalConsistency,
            &["TMAX", "TMIN"],
            inverted,
            format!("TMAX < TMIN inconsistency: {} days", inverted),
        ));
    }
    if wide > 0 {
        issues.push(issue(
            QaCheck::InternalConsistency,
            &["TMAX", "TMIN"],
            wide,
            format!("extreme daily temperature range: {} days", wide),
        ));
    }
    issues
}

fn temporal_persistence(series: &ElementSeries, max_identical_run: usize) -> Option<QaIssue> {
    if series.len() < MIN_PERSISTENCE_SAMPLE {
        return None;
    }
    let mut longest = 1;
    let mut current = 1;
    for pair in series.points().windows(2) {
        if pair[1].value == pair[0].value {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 1;
        }
    }
    (longest > max_identical_run).then(|| {
        issue(
            QaCheck::TemporalPersistence,
            &[series.element()],
            longest,
            format!(
                "{} excessive persistence: {} consecutive identical values",
                series.element(),
                longest
            ),
        )
    })
}

fn climatological_limits(series: &ElementSeries) -> Option<QaIssue> {
    if series.len() < MIN_CLIMATOLOGY_SAMPLE {
        return None;
    }
    let values: Vec<f64> = series.values().collect();
    let (mean, std) = mean_and_sample_std(&values)?;
    let extremes = values
        .iter()
        .filter(|v| (*v - mean).abs() > CLIMATOLOGY_SIGMAS * std)
        .count();
    (extremes > 0).then(|| {
        issue(
            QaCheck::ClimatologicalLimits,
            &[series.element()],
            extremes,
            format!("{} climatological extremes: {} values", series.element(), extremes),
        )
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
