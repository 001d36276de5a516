/// Station-level report assembled from per-element results.
///
/// This is the structure handed to the formatting / web layer. It is built
/// once per analysis run and only ever serialized afterwards.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::analysis::baseline::mean_and_sample_std;
use crate::analysis::qa::StationQa;
use crate::model::{AnomalyCandidate, ModelKind, UnavailableReason, ValidationNote};
use crate::quality::{QualitySummary, summarize};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalysisPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub station_id: String,
    pub analysis_period: AnalysisPeriod,
    /// Valid element readings dated within the period.
    pub total_records: usize,
    pub total_anomalies: usize,
    pub elements_analyzed: Vec<String>,
    pub elements_with_anomalies: Vec<String>,
    pub confidence_threshold: f64,
    pub validation_notes: Vec<ValidationNote>,
    /// Elements scored statistical-only, and why.
    pub degraded_elements: BTreeMap<String, UnavailableReason>,
    /// Flag quality of every in-period reading.
    pub overall_quality: QualitySummary,
    /// `None` when QA is disabled.
    pub qa: Option<StationQa>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementSummary {
    pub record_count: usize,
    pub anomaly_count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation; `None` below two values.
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Models that fitted for this element, empty when degraded.
    pub ensemble_models: Vec<ModelKind>,
    pub quality: QualitySummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub summary: RunSummary,
    pub element_summaries: BTreeMap<String, ElementSummary>,
    /// Retained candidates ordered by (date, element).
    pub anomalies: Vec<AnomalyCandidate>,
}

/// What the pipeline learned about one element.
#[derive(Debug, Clone)]
pub struct ElementAnalysis {
    pub element: String,
    /// Values dated within the analysis period.
    pub period_values: Vec<f64>,
    /// Raw flag strings of the same readings, index for index.
    pub period_flags: Vec<Option<String>>,
    /// Candidates that passed the confidence gate.
    pub anomalies: Vec<AnomalyCandidate>,
    pub ensemble: Result<Vec<ModelKind>, UnavailableReason>,
}

impl ElementSummary {
    fn from_analysis(analysis: &ElementAnalysis) -> Self {
        let values = &analysis.period_values;
        let stats = mean_and_sample_std(values);
        Self {
            record_count: values.len(),
            anomaly_count: analysis.anomalies.len(),
            mean: stats.map(|(mean, _)| mean),
            std: stats.filter(|_| values.len() >= 2).map(|(_, std)| std),
            min: values.iter().copied().reduce(f64::min),
            max: values.iter().copied().reduce(f64::max),
            ensemble_models: analysis.ensemble.clone().unwrap_or_default(),
            quality: summarize(analysis.period_flags.iter().map(|f| f.as_deref())),
        }
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

impl AnalysisReport {
    /// Collects per-element results, in the order given, into one report.
    pub fn assemble(
        station_id: &str,
        period: AnalysisPeriod,
        confidence_threshold: f64,
        validation_notes: Vec<ValidationNote>,
        elements: Vec<ElementAnalysis>,
        qa: Option<StationQa>,
    ) -> Self {
        let overall_quality = summarize(
            elements
                .iter()
                .flat_map(|a| a.period_flags.iter().map(|f| f.as_deref())),
        );
        let mut element_summaries = BTreeMap::new();
        let mut degraded_elements = BTreeMap::new();
        let mut elements_analyzed = Vec::with_capacity(elements.len());
        let mut elements_with_anomalies = Vec::new();
        let mut total_records = 0;
        let mut anomalies = Vec::new();

        for analysis in elements {
            let summary = ElementSummary::from_analysis(&analysis);
            total_records += summary.record_count;
            if let Err(reason) = analysis.ensemble {
                degraded_elements.insert(analysis.element.clone(), reason);
            }
            if !analysis.anomalies.is_empty() {
                elements_with_anomalies.push(analysis.element.clone());
            }
            elements_analyzed.push(analysis.element.clone());
            element_summaries.insert(analysis.element, summary);
            anomalies.extend(analysis.anomalies);
        }

        anomalies.sort_by(|a: &AnomalyCandidate, b: &AnomalyCandidate| {
            a.date.cmp(&b.date).then_with(|| a.element.cmp(&b.element))
        });

        AnalysisReport {
            summary: RunSummary {
                station_id: station_id.to_string(),
                analysis_period: period,
                total_records,
                total_anomalies: anomalies.len(),
                elements_analyzed,
                elements_with_anomalies,
                confidence_threshold,
                validation_notes,
                degraded_elements,
                overall_quality,
                qa,
            },
            element_summaries,
            anomalies,
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
