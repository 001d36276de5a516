/// Integration tests for GHCN-Daily CSV ingest feeding an analysis run
///
/// Tests verify:
/// 1. A daily-summaries CSV parses into a station snapshot
/// 2. Flag strings from `_ATTRIBUTES` columns reach the quality score
/// 3. Unparseable rows surface as parse notes without failing the file
/// 4. QFLAG codes are counted in the element quality summary
///
/// Run with: cargo test --test ghcn_ingest

use chrono::{Duration, NaiveDate};

use addis_service::alert::severity_for_confidence;
use addis_service::analysis::qa::QaCheck;
use addis_service::config::AnalysisConfig;
use addis_service::ingest::ghcn::parse_station_csv;
use addis_service::pipeline::{AnalysisEngine, AnalysisRequest};

const STATION: &str = "USC00118740";

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 6, 1).unwrap()
}

/// Sixty days of precipitation-free, mild TMAX with one flagged outlier on
/// day 40 and a malformed date row at the end.
fn build_csv() -> String {
    let mut csv = String::from(
        "\"STATION\",\"DATE\",\"NAME\",\"TMAX\",\"TMAX_ATTRIBUTES\",\"PRCP\",\"PRCP_ATTRIBUTES\"\n",
    );
    for i in 0..60i64 {
        let date = start() + Duration::days(i);
        let (tmax, flags) = if i == 40 {
            (118, ",X,S")
        } else {
            (80 + (i * 7 % 5) - 2, ",,7")
        };
        csv.push_str(&format!(
            "\"{}\",\"{}\",\"URBANA, IL US\",\"{}\",\"{}\",\"0.00\",\",,7\"\n",
            STATION,
            date.format("%Y-%m-%d"),
            tmax,
            flags
        ));
    }
    csv.push_str(&format!("\"{}\",\"June 31\",\"URBANA, IL US\",\"80\",\",,7\",\"\",\"\"\n", STATION));
    csv
}

#[test]
fn test_csv_parses_into_snapshot() {
    let parsed = parse_station_csv(&build_csv()).expect("CSV should parse");
    assert_eq!(parsed.observations.len(), 60);
    assert_eq!(parsed.notes.len(), 1);
    assert_eq!(parsed.notes[0].row, 60);

    let snapshot = parsed.into_snapshot(STATION);
    assert_eq!(snapshot.len(), 60);
    assert_eq!(snapshot.observations[40].raw_flags("TMAX"), Some(",X,S"));
}

#[test]
fn test_flagged_outlier_carries_discounted_quality() {
    let parsed = parse_station_csv(&build_csv()).unwrap();
    let snapshot = parsed.into_snapshot(STATION);
    let engine = AnalysisEngine::new(AnalysisConfig::default()).unwrap();
    let outlier_date = start() + Duration::days(40);
    let request = AnalysisRequest::new(STATION, outlier_date, outlier_date).with_elements(["TMAX"]);

    let report = engine.analyze(&snapshot, &request).unwrap();
    assert_eq!(report.anomalies.len(), 1, "anomalies: {:#?}", report.anomalies);

    let outlier = &report.anomalies[0];
    assert_eq!(outlier.observed_value, 118.0);
    // Critical quality code X (-20) plus synoptic source S (-10).
    assert_eq!(outlier.quality_score.value, 70.0);
    assert_eq!(outlier.quality_score.penalties.quality, -20.0);
    assert_eq!(outlier.quality_score.penalties.source, -10.0);
    assert!(outlier.combined_confidence >= 0.5);

    let quality = &report.element_summaries["TMAX"].quality;
    assert_eq!(quality.flagged_records, 1);
    assert_eq!(quality.quality_flags["X"].description, Some("Failed bounds check"));

    let qa = report.summary.qa.as_ref().expect("QA runs by default");
    assert!(qa.issues.iter().any(|i| i.check == QaCheck::ClimatologicalLimits && i.elements == ["TMAX"]));
    assert!(!qa.contamination_elevated);
}

#[test]
fn test_flat_precipitation_takes_severity_from_the_ensemble() {
    let parsed = parse_station_csv(&build_csv()).unwrap();
    let snapshot = parsed.into_snapshot(STATION);
    let mut config = AnalysisConfig::default();
    config.aggregation.confidence_threshold = 0.0;
    let engine = AnalysisEngine::new(config).unwrap();
    let request = AnalysisRequest::new(STATION, start(), start() + Duration::days(59))
        .with_elements(["PRCP"]);

    let report = engine.analyze(&snapshot, &request).unwrap();
    assert_eq!(report.anomalies.len(), 60, "threshold 0 keeps every scored date");
    assert_eq!(report.element_summaries["PRCP"].std, Some(0.0));

    // Constant zero: z is undefined, so only the ensemble contributes.
    for candidate in &report.anomalies {
        assert_eq!(candidate.statistical_z, None);
        let flagged = candidate.ensemble_votes.iter().filter(|v| v.is_anomaly).count() as f64;
        let expected = 0.6 * flagged / candidate.ensemble_votes.len() as f64;
        assert!((candidate.combined_confidence - expected).abs() < 1e-12);
        assert_eq!(
            candidate.severity,
            severity_for_confidence(candidate.combined_confidence, 4.0)
        );
    }
}
