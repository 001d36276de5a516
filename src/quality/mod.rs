//! Observation quality scoring from provenance flags.
//!
//! A score starts at 100 and each flag position contributes the adjustment
//! found in its lookup table (`flags`). Unrecognized codes cost nothing and
//! unparseable strings are scored as empty; both are recorded as
//! annotations so callers can see what was ignored.
//!
//! Submodules:
//! - `flags`   — MFLAG/QFLAG/SFLAG lookup tables
//! - `summary` — per-element roll-up of scores and QFLAG counts

pub mod flags;
pub mod summary;

pub use summary::{QualitySummary, summarize};

use crate::model::{FlagPenalties, FlagPosition, FlagTriple, QualityAnnotation, QualityScore};

const MAX_SCORE: f64 = 100.0;

/// The raw flag string does not fit the `m,q,s` layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed provenance flags '{raw}'")]
pub struct MalformedFlagString {
    pub raw: String,
}

/// Parses a raw `"measurement,quality,source"` string.
///
/// - empty or whitespace-only: all positions empty
/// - a single character with no commas: source flag only
/// - comma-separated: up to three positions, each trimmed
///
/// Anything else (a position longer than one character, more than three
/// parts, or a multi-character bare string) is malformed.
pub fn parse_flag_triple(raw: &str) -> Result<FlagTriple, MalformedFlagString> {
    let malformed = || MalformedFlagString { raw: raw.to_string() };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(FlagTriple::default());
    }

    if !trimmed.contains(',') {
        let source = single_char(trimmed).ok_or_else(malformed)?;
        return Ok(FlagTriple {
            source,
            ..FlagTriple::default()
        });
    }

    let parts: Vec<&str> = trimmed.split(',').collect();
    if parts.len() > 3 {
        return Err(malformed());
    }

    let part = |i: usize| parts.get(i).map(|p| p.trim()).unwrap_or("");
    Ok(FlagTriple {
        measurement: single_char(part(0)).ok_or_else(malformed)?,
        quality: single_char(part(1)).ok_or_else(malformed)?,
        source: single_char(part(2)).ok_or_else(malformed)?,
    })
}

/// `Some(None)` for an empty position, `None` if longer than one char.
fn single_char(s: &str) -> Option<Option<char>> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Some(None),
        (Some(c), None) => Some(Some(c)),
        _ => None,
    }
}

/// Scores a parsed flag triple.
pub fn score_triple(triple: &FlagTriple) -> QualityScore {
    let mut penalties = FlagPenalties::default();
    let mut annotations = Vec::new();

    let positions = [
        (FlagPosition::Measurement, triple.measurement),
        (FlagPosition::Quality, triple.quality),
        (FlagPosition::Source, triple.source),
    ];

    for (position, code) in positions {
        let Some(code) = code else { continue };
        let adjustment = match flags::lookup(position, code) {
            Some(entry) => entry.adjustment,
            None => {
                annotations.push(QualityAnnotation::UnrecognizedCode { position, code });
                0.0
            }
        };
        match position {
            FlagPosition::Measurement => penalties.measurement += adjustment,
            FlagPosition::Quality => penalties.quality += adjustment,
            FlagPosition::Source => penalties.source += adjustment,
        }
    }

    QualityScore {
        value: (MAX_SCORE + penalties.total()).clamp(0.0, MAX_SCORE),
        penalties,
        annotations,
    }
}

/// Scores a raw flag string. Malformed input scores as if empty.
pub fn score_flags(raw: &str) -> QualityScore {
    match parse_flag_triple(raw) {
        Ok(triple) => score_triple(&triple),
        Err(MalformedFlagString { raw }) => {
            let mut score = QualityScore::perfect();
            score.annotations.push(QualityAnnotation::Malformed { raw });
            score
        }
    }
}

/// Scores an optional flag string; an element with no flags is perfect.
pub fn score_optional(raw: Option<&str>) -> QualityScore {
    raw.map(score_flags).unwrap_or_else(QualityScore::perfect)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // --- Parsing ------------------------------------------------------------

    #[test]
    fn test_empty_string_parses_to_empty_triple() {
        assert_eq!(parse_flag_triple(""), Ok(FlagTriple::default()));
        assert_eq!(parse_flag_triple("   "), Ok(FlagTriple::default()));
    }

    #[test]
    fn test_bare_character_is_a_source_flag() {
        let triple = parse_flag_triple("6").expect("single char should parse");
        assert_eq!(triple.source, Some('6'));
        assert_eq!(triple.measurement, None);
        assert_eq!(triple.quality, None);
    }

    #[test]
    fn test_full_triple_parses_in_position_order() {
        let triple = parse_flag_triple("B,D,0").expect("full triple should parse");
        assert_eq!(triple.measurement, Some('B'));
        assert_eq!(triple.quality, Some('D'));
        assert_eq!(triple.source, Some('0'));
    }

    #[test]
    fn test_short_triple_leaves_trailing_positions_empty() {
        let triple = parse_flag_triple("T,").expect("two parts should parse");
        assert_eq!(triple.measurement, Some('T'));
        assert_eq!(triple.quality, None);
        assert_eq!(triple.source, None);
    }

    #[test]
    fn test_multi_character_position_is_malformed() {
        assert!(parse_flag_triple("HH,,0").is_err());
        assert!(parse_flag_triple("abc").is_err());
        assert!(parse_flag_triple("a,b,c,d").is_err());
    }

    // --- Scoring ------------------------------------------------------------

    #[test]
    fn test_clean_flags_score_100() {
        let score = score_flags(",,0");
        assert_eq!(score.value, 100.0);
        assert!(score.annotations.is_empty());
    }

    #[test]
    fn test_one_critical_quality_code_scores_80() {
        let score = score_flags(",X,0");
        assert_eq!(score.value, 80.0, "critical QFLAG should cost exactly 20");
        assert_eq!(score.penalties.quality, -20.0);
    }

    #[test]
    fn test_warning_measurement_code_scores_95() {
        // "H,,0": no quality code, warning MFLAG 'H', neutral source '0'.
        let score = score_flags("H,,0");
        assert_eq!(score.value, 95.0);
        assert_eq!(score.penalties.measurement, -5.0);
        assert_eq!(score.penalties.quality, 0.0);
        assert_eq!(score.penalties.source, 0.0);
    }

    #[test]
    fn test_reliable_source_cannot_push_score_above_100() {
        let score = score_flags(",,R");
        assert_eq!(score.penalties.source, 5.0);
        assert_eq!(score.value, 100.0);
    }

    #[test]
    fn test_penalties_accumulate_across_positions() {
        // trace (-5) + failed bounds (-20) + synoptic source (-10)
        let score = score_flags("T,X,S");
        assert_eq!(score.value, 65.0);
    }

    #[test]
    fn test_unrecognized_code_costs_nothing_but_is_annotated() {
        let score = score_flags("Q,,0");
        assert_eq!(score.value, 100.0);
        assert_eq!(
            score.annotations,
            vec![QualityAnnotation::UnrecognizedCode {
                position: FlagPosition::Measurement,
                code: 'Q'
            }]
        );
    }

    #[test]
    fn test_malformed_string_scores_as_empty_with_annotation() {
        let score = score_flags("XX,YY");
        assert_eq!(score.value, 100.0);
        assert!(matches!(
            score.annotations.as_slice(),
            [QualityAnnotation::Malformed { raw }] if raw == "XX,YY"
        ));
    }

    #[test]
    fn test_missing_flags_score_perfect() {
        assert_eq!(score_optional(None).value, 100.0);
    }

    proptest! {
        #[test]
        fn prop_score_is_always_within_bounds(raw in "[A-Za-z0-9, ]{0,8}") {
            let score = score_flags(&raw);
            prop_assert!(score.value >= 0.0 && score.value <= 100.0);
        }

        #[test]
        fn prop_scoring_is_deterministic(m in "[A-Z]?", q in "[A-Z]?", s in "[A-Za-z0-9]?") {
            let raw = format!("{},{},{}", m, q, s);
            prop_assert_eq!(score_flags(&raw), score_flags(&raw));
        }
    }
}
