//! Severity tier cut points.
//!
//! One ladder serves both labeling paths: a defined |z| reads through it
//! directly, and combined confidence reads through it after being scaled
//! onto the |z| axis.

use crate::model::Severity;

/// |z| above which a deviation is mild.
pub const MILD_CUTOFF: f64 = 1.0;
/// |z| above which a deviation is moderate.
pub const MODERATE_CUTOFF: f64 = 2.0;
/// |z| above which a deviation is extreme.
pub const EXTREME_CUTOFF: f64 = 3.0;

/// Maps a deviation magnitude to its tier. Cut points are exclusive:
/// exactly 2.0 is mild, not moderate.
///
/// An infinite magnitude is extreme; NaN maps to `None`.
pub fn severity_for_magnitude(magnitude: f64) -> Severity {
    let m = magnitude.abs();
    if m.is_nan() {
        Severity::None
    } else if m > EXTREME_CUTOFF {
        Severity::Extreme
    } else if m > MODERATE_CUTOFF {
        Severity::Moderate
    } else if m > MILD_CUTOFF {
        Severity::Mild
    } else {
        Severity::None
    }
}

/// Severity implied by a combined confidence when no z-score exists.
pub fn severity_for_confidence(confidence: f64, scale: f64) -> Severity {
    severity_for_magnitude(confidence.clamp(0.0, 1.0) * scale)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
