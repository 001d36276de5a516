//! Per-element roll-up of provenance-flag quality.
//!
//! Summaries are built from the raw flag strings of the scored readings, so
//! they agree with the per-candidate scores by construction.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{flags, parse_flag_triple, score_optional};
use crate::model::FlagPosition;

/// Readings that carry one QFLAG code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagCount {
    pub count: usize,
    /// `None` for a code missing from the QFLAG table.
    pub description: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySummary {
    pub records: usize,
    pub mean_score: Option<f64>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    /// Readings with any QFLAG set, i.e. that failed a QC check upstream.
    pub flagged_records: usize,
    pub flagged_rate: f64,
    /// Flagged readings by QFLAG code.
    pub quality_flags: BTreeMap<String, FlagCount>,
}

/// Summarizes the flag strings of a set of readings; `None` is a reading
/// without flags.
pub fn summarize<'a, I>(raw_flags: I) -> QualitySummary
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut records = 0usize;
    let mut total = 0.0;
    let mut min_score: Option<f64> = None;
    let mut max_score: Option<f64> = None;
    let mut quality_flags: BTreeMap<String, FlagCount> = BTreeMap::new();

    for raw in raw_flags {
        records += 1;
        let score = score_optional(raw).value;
        total += score;
        min_score = Some(min_score.map_or(score, |m| m.min(score)));
        max_score = Some(max_score.map_or(score, |m| m.max(score)));

        let qflag = raw
            .and_then(|r| parse_flag_triple(r).ok())
            .and_then(|triple| triple.quality);
        if let Some(code) = qflag {
            quality_flags
                .entry(code.to_string())
                .or_insert_with(|| FlagCount {
                    count: 0,
                    description: flags::describe(FlagPosition::Quality, code),
                })
                .count += 1;
        }
    }

    let flagged_records: usize = quality_flags.values().map(|f| f.count).sum();
    QualitySummary {
        records,
        mean_score: (records > 0).then(|| total / records as f64),
        min_score,
        max_score,
        flagged_records,
        flagged_rate: if records > 0 {
            flagged_records as f64 / records as f64
        } else {
            0.0
        },
        quality_flags,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_and_flag_counts_are_rolled_up() {
        let summary = summarize([Some(",,7"), Some(",X,S"), None, Some(",X,0"), Some("H,,0")]);

        assert_eq!(summary.records, 5);
        // 100, 70, 100, 80, 95
        assert_eq!(summary.mean_score, Some(89.0));
        assert_eq!(summary.min_score, Some(70.0));
        assert_eq!(summary.max_score, Some(100.0));
        assert_eq!(summary.flagged_records, 2);
        assert!((summary.flagged_rate - 0.4).abs() < 1e-12);

        let bounds = &summary.quality_flags["X"];
        assert_eq!(bounds.count, 2);
        assert_eq!(bounds.description, Some("Failed bounds check"));
    }

    #[test]
    fn test_unknown_quality_code_is_counted_without_description() {
        let summary = summarize([Some(",Q,")]);
        assert_eq!(summary.flagged_records, 1);
        assert_eq!(summary.quality_flags["Q"].description, None);
    }

    #[test]
    fn test_malformed_strings_are_not_flagged() {
        let summary = summarize([Some("XX,Y,Z")]);
        assert_eq!(summary.flagged_records, 0);
        assert_eq!(summary.mean_score, Some(100.0));
    }

    #[test]
    fn test_empty_input_has_no_scores() {
        let summary = summarize(std::iter::empty::<Option<&str>>());
        assert_eq!(summary.records, 0);
        assert_eq!(summary.mean_score, None);
        assert_eq!(summary.min_score, None);
        assert_eq!(summary.flagged_rate, 0.0);
        assert!(summary.quality_flags.is_empty());
    }
}
