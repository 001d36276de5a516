//! Windowed baseline statistics.
//!
//! For a target date the baseline sample is every value of the element
//! dated within `radius` days of the target, excluding the target date
//! itself. Fewer than `MIN_BASELINE_SAMPLE` values means no baseline.

use chrono::{Duration, NaiveDate};

use super::series::ElementSeries;
use crate::model::BaselineWindow;

/// Smallest sample a baseline may be computed from.
pub const MIN_BASELINE_SAMPLE: usize = 5;

/// Computes the baseline for `target_date`, or `None` when the window holds
/// fewer than `MIN_BASELINE_SAMPLE` values.
pub fn compute_baseline(
    series: &ElementSeries,
    target_date: NaiveDate,
    radius_days: u32,
) -> Option<BaselineWindow> {
    let radius = Duration::days(i64::from(radius_days));
    let start = target_date.checked_sub_signed(radius).unwrap_or(NaiveDate::MIN);
    let end = target_date.checked_add_signed(radius).unwrap_or(NaiveDate::MAX);

    let mut sample: Vec<f64> = series.points()[series.range_between(start, end)]
        .iter()
        .filter(|p| p.date != target_date)
        .map(|p| p.value)
        .filter(|v| v.is_finite())
        .collect();

    if sample.len() < MIN_BASELINE_SAMPLE {
        return None;
    }

    let (mean, std_dev) = mean_and_sample_std(&sample)?;
    sample.sort_by(f64::total_cmp);

    Some(BaselineWindow {
        element: series.element().to_string(),
        target_date,
        window_radius_days: radius_days,
        mean,
        std_dev,
        sample_size: sample.len(),
        min: sample[0],
        max: sample[sample.len() - 1],
        p25: percentile_sorted(&sample, 0.25),
        p75: percentile_sorted(&sample, 0.75),
    })
}

/// Arithmetic mean and the n−1 sample standard deviation.
///
/// `None` for an empty slice; the deviation is 0 for a single value.
pub fn mean_and_sample_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() == 1 {
        return Some((mean, 0.0));
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((mean, (ss / (n - 1.0)).sqrt()))
}

/// Percentile of an ascending slice by linear interpolation between the
/// closest ranks (`rank = p * (n - 1)`).
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::series::SeriesPoint;

    fn series_from(start: NaiveDate, values: &[f64]) -> ElementSeries {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &value)| SeriesPoint {
                date: start + Duration::days(i as i64),
                value,
                raw_flags: None,
            })
            .collect();
        ElementSeries::from_points("TMAX", points)
    }

    fn jan(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_target_date_is_excluded_from_its_own_sample() {
        // Target value is wildly different; if it leaked in, the mean would move.
        let series = series_from(jan(1), &[10.0, 10.0, 10.0, 1000.0, 10.0, 10.0, 10.0]);
        let baseline = compute_baseline(&series, jan(4), 30).expect("6 values in window");
        assert_eq!(baseline.sample_size, 6);
        assert_eq!(baseline.mean, 10.0);
        assert_eq!(baseline.max, 10.0);
    }

    #[test]
    fn test_four_values_yield_no_baseline() {
        let series = series_from(jan(1), &[1.0, 2.0, 3.0, 4.0, 5.0]);
        // Excluding the target leaves 4 values.
        assert!(compute_baseline(&series, jan(3), 30).is_none());
    }

    #[test]
    fn test_five_values_yield_a_baseline() {
        let series = series_from(jan(1), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let baseline = compute_baseline(&series, jan(6), 30).expect("5 prior values");
        assert_eq!(baseline.sample_size, 5);
        assert_eq!(baseline.mean, 3.0);
    }

    #[test]
    fn test_window_radius_bounds_the_sample() {
        let values: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let series = series_from(jan(1), &values);
        let baseline = compute_baseline(&series, jan(10), 3).expect("6 values within ±3 days");
        assert_eq!(baseline.sample_size, 6);
        assert_eq!(baseline.min, 6.0);
        assert_eq!(baseline.max, 12.0);
    }

    #[test]
    fn test_target_without_its_own_observation_still_gets_a_baseline() {
        let series = series_from(jan(1), &[5.0; 10]);
        let mid_jan = jan(15);
        let baseline = compute_baseline(&series, mid_jan, 30).expect("all 10 values in window");
        assert_eq!(baseline.sample_size, 10);
    }

    #[test]
    fn test_sample_std_uses_n_minus_one() {
        let (mean, std) = mean_and_sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(mean, 5.0);
        // population std is 2.0; sample std is sqrt(32/7)
        assert!((std - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_constant_window_has_zero_std() {
        let series = series_from(jan(1), &[10.0; 11]);
        let baseline = compute_baseline(&series, jan(6), 30).unwrap();
        assert_eq!(baseline.std_dev, 0.0);
    }

    #[test]
    fn test_percentiles_interpolate_linearly() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&sorted, 0.25), 2.0);
        assert_eq!(percentile_sorted(&sorted, 0.75), 4.0);
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile_sorted(&sorted, 0.25), 1.75);
        assert_eq!(percentile_sorted(&sorted, 0.75), 3.25);
    }
}
