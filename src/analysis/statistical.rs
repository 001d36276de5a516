//! Z-score deviation test against a baseline window.

use crate::alert::severity_for_magnitude;
use crate::model::{BaselineWindow, Direction, Severity, StatisticalResult};

/// Tests `observed` against `baseline`.
///
/// A zero (or non-finite) standard deviation leaves the z-score undefined:
/// severity is `None` and the direction falls back to the sign of the raw
/// difference from the mean.
pub fn evaluate(observed: f64, baseline: &BaselineWindow) -> StatisticalResult {
    let diff = observed - baseline.mean;

    if !(baseline.std_dev > 0.0) || !baseline.std_dev.is_finite() {
        return StatisticalResult {
            z: None,
            severity: Severity::None,
            direction: direction_of(diff),
        };
    }

    let z = diff / baseline.std_dev;
    StatisticalResult {
        z: Some(z),
        severity: severity_for_magnitude(z),
        direction: direction_of(z),
    }
}

fn direction_of(signed: f64) -> Direction {
    if signed > 0.0 {
        Direction::High
    } else {
        Direction::Low
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
