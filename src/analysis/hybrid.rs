//! Hybrid aggregation of the statistical and ensemble signals.
//!
//! The statistical signal is binary (1 when the deviation is at least mild);
//! the ensemble signal is the fraction of fitted models that flag the point.
//! Their weighted mean is the combined confidence. When the ensemble is
//! unavailable the statistical signal carries the whole weight.
//!
//! Severity prefers |z|; only when z is undefined does it come from the
//! combined confidence. The confidence gates inclusion in the report.

use crate::alert::severity_for_confidence;
use crate::analysis::series::SeriesPoint;
use crate::analysis::{ensemble, explain, statistical};
use crate::config::AggregationConfig;
use crate::model::{
    AnomalyCandidate, BaselineWindow, ModelVote, Severity, StatisticalResult,
};
use crate::quality;

/// Weighted fusion of the two signals, in [0, 1].
///
/// `votes` is `None` when the ensemble was unavailable for the element.
pub fn combined_confidence(
    statistical: &StatisticalResult,
    votes: Option<&[ModelVote]>,
    config: &AggregationConfig,
) -> f64 {
    let stat = if statistical.severity >= Severity::Mild { 1.0 } else { 0.0 };
    let Some(votes) = votes else {
        return stat;
    };
    let fraction = ensemble::anomaly_fraction(votes);
    let total = config.statistical_weight + config.ensemble_weight;
    if total <= 0.0 {
        return stat;
    }
    ((config.statistical_weight * stat + config.ensemble_weight * fraction) / total).clamp(0.0, 1.0)
}

/// Final severity label for a candidate.
pub fn final_severity(
    statistical: &StatisticalResult,
    combined: f64,
    config: &AggregationConfig,
) -> Severity {
    match statistical.z {
        Some(_) => statistical.severity,
        None => severity_for_confidence(combined, config.confidence_severity_scale),
    }
}

/// Builds the candidate for one observed point that has a baseline.
pub fn aggregate(
    station_id: &str,
    element: &str,
    point: &SeriesPoint,
    baseline: &BaselineWindow,
    votes: Option<Vec<ModelVote>>,
    config: &AggregationConfig,
) -> AnomalyCandidate {
    let statistical = statistical::evaluate(point.value, baseline);
    let combined = combined_confidence(&statistical, votes.as_deref(), config);
    let severity = final_severity(&statistical, combined, config);
    let explanation_text =
        explain::render_explanation(severity, statistical.direction, element, point.value, baseline);

    AnomalyCandidate {
        station_id: station_id.to_string(),
        date: point.date,
        element: element.to_string(),
        observed_value: point.value,
        statistical_z: statistical.z,
        ensemble_votes: votes.unwrap_or_default(),
        combined_confidence: combined,
        severity,
        direction: statistical.direction,
        quality_score: quality::score_optional(point.raw_flags.as_deref()),
        explanation_text,
    }
}

/// The value compared against the confidence threshold.
///
/// Quality never blocks a candidate unless the discount is switched on, in
/// which case confidence is scaled by `quality / 100` first.
pub fn gate_value(candidate: &AnomalyCandidate, config: &AggregationConfig) -> f64 {
    if config.apply_quality_discount {
        candidate.combined_confidence * candidate.quality_score.value / 100.0
    } else {
        candidate.combined_confidence
    }
}

pub fn passes_gate(candidate: &AnomalyCandidate, config: &AggregationConfig) -> bool {
    gate_value(candidate, config) >= config.confidence_threshold
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, ModelKind};
    use chrono::NaiveDate;

    fn baseline(mean: f64, std_dev: f64) -> BaselineWindow {
        BaselineWindow {
            element: "TMAX".to_string(),
            target_date: NaiveDate::from_ymd_opt(2023, 7, 15).unwrap(),
            window_radius_days: 30,
            mean,
            std_dev,
            sample_size: 10,
            min: mean - std_dev,
            max: mean + std_dev,
            p25: mean,
            p75: mean,
        }
    }

    fn point(value: f64, flags: Option<&str>) -> SeriesPoint {
        SeriesPoint {
            date: NaiveDate::from_ymd_opt(2023, 7, 15).unwrap(),
            value,
            raw_flags: flags.map(str::to_string),
        }
    }

    fn votes(flags: &[bool]) -> Vec<ModelVote> {
        let kinds = [
            ModelKind::IsolationForest,
            ModelKind::LocalOutlierFactor,
            ModelKind::OneClassSvm,
        ];
        flags
            .iter()
            .zip(kinds)
            .map(|(&is_anomaly, model)| ModelVote {
                model,
                is_anomaly,
                score: if is_anomaly { 1.0 } else { 0.0 },
            })
            .collect()
    }

    #[test]
    fn test_unavailable_ensemble_gives_statistical_only_confidence() {
        // z = 2.5 with no ensemble: confidence is the full statistical
        // contribution and severity stays moderate.
        let config = AggregationConfig::default();
        let candidate = aggregate("S", "TMAX", &point(35.0, None), &baseline(10.0, 10.0), None, &config);
        assert_eq!(candidate.statistical_z, Some(2.5));
        assert_eq!(candidate.combined_confidence, 1.0);
        assert_eq!(candidate.severity, Severity::Moderate);
        assert!(candidate.ensemble_votes.is_empty());
        assert!(passes_gate(&candidate, &config));
    }

    #[test]
    fn test_degenerate_baseline_severity_comes_from_ensemble() {
        // Constant window, observed equals the constant, all models flag it.
        let config = AggregationConfig::default();
        let candidate = aggregate(
            "S",
            "TMAX",
            &point(10.0, None),
            &baseline(10.0, 0.0),
            Some(votes(&[true, true, true])),
            &config,
        );
        assert_eq!(candidate.statistical_z, None);
        // 0.4 * 0 + 0.6 * 1
        assert!((candidate.combined_confidence - 0.6).abs() < 1e-12);
        assert_eq!(candidate.severity, Severity::Moderate, "0.6 * 4 = 2.4");
    }

    #[test]
    fn test_degenerate_baseline_without_ensemble_is_none() {
        let config = AggregationConfig::default();
        let candidate = aggregate("S", "TMAX", &point(10.0, None), &baseline(10.0, 0.0), None, &config);
        assert_eq!(candidate.combined_confidence, 0.0);
        assert_eq!(candidate.severity, Severity::None);
        assert!(!passes_gate(&candidate, &config));
    }

    #[test]
    fn test_weights_are_configurable() {
        let stat = StatisticalResult {
            z: Some(1.5),
            severity: Severity::Mild,
            direction: Direction::High,
        };
        let v = votes(&[false, false, false]);
        let default = combined_confidence(&stat, Some(&v), &AggregationConfig::default());
        assert!((default - 0.4).abs() < 1e-12);

        let even = AggregationConfig {
            statistical_weight: 1.0,
            ensemble_weight: 1.0,
            ..AggregationConfig::default()
        };
        assert!((combined_confidence(&stat, Some(&v), &even) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_partial_ensemble_agreement() {
        let stat = StatisticalResult {
            z: Some(0.5),
            severity: Severity::None,
            direction: Direction::Low,
        };
        let v = votes(&[true, false]);
        // 0.6 * 0.5
        let c = combined_confidence(&stat, Some(&v), &AggregationConfig::default());
        assert!((c - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_z_is_preferred_over_confidence_for_severity() {
        let config = AggregationConfig::default();
        let candidate = aggregate(
            "S",
            "TMAX",
            &point(45.0, None),
            &baseline(10.0, 10.0),
            Some(votes(&[false, false, false])),
            &config,
        );
        // z = 3.5 is extreme even though confidence is only 0.4.
        assert_eq!(candidate.severity, Severity::Extreme);
        assert!((candidate.combined_confidence - 0.4).abs() < 1e-12);
        assert!(!passes_gate(&candidate, &config));
    }

    #[test]
    fn test_quality_is_attached_but_does_not_gate_by_default() {
        let config = AggregationConfig::default();
        let candidate = aggregate(
            "S",
            "TMAX",
            &point(35.0, Some(",X,S")),
            &baseline(10.0, 10.0),
            None,
            &config,
        );
        assert_eq!(candidate.quality_score.value, 70.0);
        assert!(passes_gate(&candidate, &config));

        let discounted = AggregationConfig {
            apply_quality_discount: true,
            confidence_threshold: 0.75,
            ..AggregationConfig::default()
        };
        assert!((gate_value(&candidate, &discounted) - 0.7).abs() < 1e-12);
        assert!(!passes_gate(&candidate, &discounted));
    }
}
