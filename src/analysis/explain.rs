//! Human-readable rationale for a scored observation.

use crate::elements;
use crate::model::{BaselineWindow, Direction, Severity};

/// Renders
/// `"{severity} {direction} {element_name}: observed {value}{unit} vs. typical {mean}±{std}{unit}."`
/// with every number at one decimal place. Output depends only on the
/// arguments.
pub fn render_explanation(
    severity: Severity,
    direction: Direction,
    element: &str,
    observed: f64,
    baseline: &BaselineWindow,
) -> String {
    let (name, unit) = elements::display_metadata(element);
    format!(
        "{} {} {}: observed {:.1}{} vs. typical {:.1}±{:.1}{}.",
        severity, direction, name, observed, unit, baseline.mean, baseline.std_dev, unit
    )
}
