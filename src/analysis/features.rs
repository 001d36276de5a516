//! Feature rows for the ensemble models.
//!
//! Each point of an element series becomes one standardized row:
//!
//! | column | feature                                             |
//! |--------|-----------------------------------------------------|
//! | 0      | observed value                                      |
//! | 1      | trailing rolling mean (partial windows allowed)     |
//! | 2      | day of year                                         |
//! | 3      | deviation from the element's mean for that month    |
//!
//! Columns are z-scored over the whole series (population deviation);
//! a constant column becomes all zeros.

use chrono::Datelike;

use super::series::ElementSeries;

pub const N_FEATURES: usize = 4;

/// Dense row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    data: Vec<f64>,
    n_features: usize,
}

impl FeatureMatrix {
    /// Builds a matrix from row-major data. `data.len()` must be a multiple
    /// of `n_features`.
    pub fn from_rows(data: Vec<f64>, n_features: usize) -> Self {
        debug_assert!(n_features > 0 && data.len() % n_features == 0);
        Self { data, n_features }
    }

    pub fn n_rows(&self) -> usize {
        self.data.len() / self.n_features
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_features..(i + 1) * self.n_features]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.n_features)
    }

    /// Variance over every entry of the matrix.
    pub fn total_variance(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let n = self.data.len() as f64;
        let mean = self.data.iter().sum::<f64>() / n;
        self.data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
    }

    /// At most `max_rows` rows taken at an even stride, first row included.
    pub fn strided(&self, max_rows: usize) -> FeatureMatrix {
        let n = self.n_rows();
        if n <= max_rows || max_rows == 0 {
            return self.clone();
        }
        let mut data = Vec::with_capacity(max_rows * self.n_features);
        for k in 0..max_rows {
            let i = k * n / max_rows;
            data.extend_from_slice(self.row(i));
        }
        FeatureMatrix::from_rows(data, self.n_features)
    }
}

/// Squared Euclidean distance between two rows.
pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Builds the standardized feature matrix for a series.
pub fn build_features(series: &ElementSeries, rolling_window: usize) -> FeatureMatrix {
    let points = series.points();
    let n = points.len();
    let window = rolling_window.max(1);

    // Month means over the whole series.
    let mut month_sum = [0.0f64; 12];
    let mut month_count = [0usize; 12];
    for p in points {
        let m = p.date.month0() as usize;
        month_sum[m] += p.value;
        month_count[m] += 1;
    }

    let mut columns: [Vec<f64>; N_FEATURES] = Default::default();
    for col in columns.iter_mut() {
        col.reserve(n);
    }

    let mut running = 0.0;
    for (i, p) in points.iter().enumerate() {
        running += p.value;
        if i >= window {
            running -= points[i - window].value;
        }
        let in_window = (i + 1).min(window) as f64;

        let m = p.date.month0() as usize;
        let month_mean = month_sum[m] / month_count[m] as f64;

        columns[0].push(p.value);
        columns[1].push(running / in_window);
        columns[2].push(f64::from(p.date.ordinal()));
        columns[3].push(p.value - month_mean);
    }

    for col in columns.iter_mut() {
        standardize(col);
    }

    let mut data = Vec::with_capacity(n * N_FEATURES);
    for i in 0..n {
        for col in &columns {
            data.push(col[i]);
        }
    }
    FeatureMatrix::from_rows(data, N_FEATURES)
}

fn standardize(col: &mut [f64]) {
    if col.is_empty() {
        return;
    }
    let n = col.len() as f64;
    let mean = col.iter().sum::<f64>() / n;
    let std = (col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    // Relative tolerance; rolling sums can leave round-off in a constant column.
    if std <= 1e-12 * mean.abs().max(1.0) {
        col.iter_mut().for_each(|v| *v = 0.0);
    } else {
        col.iter_mut().for_each(|v| *v = (*v - mean) / std);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::series::SeriesPoint;
    use chrono::{Duration, NaiveDate};

    fn series(values: &[f64]) -> ElementSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
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

    #[test]
    fn test_one_row_per_point() {
        let m = build_features(&series(&[1.0, 2.0, 3.0, 4.0]), 7);
        assert_eq!(m.n_rows(), 4);
        assert_eq!(m.n_features(), N_FEATURES);
    }

    #[test]
    fn test_columns_are_standardized() {
        let values: Vec<f64> = (0..50).map(|i| (i as f64 * 0.3).sin() * 10.0 + 50.0).collect();
        let m = build_features(&series(&values), 7);
        for c in 0..N_FEATURES {
            let col: Vec<f64> = m.rows().map(|r| r[c]).collect();
            let mean = col.iter().sum::<f64>() / col.len() as f64;
            assert!(mean.abs() < 1e-9, "column {} mean {}", c, mean);
        }
    }

    #[test]
    fn test_constant_series_gives_zero_value_columns() {
        let m = build_features(&series(&[5.0; 20]), 7);
        for row in m.rows() {
            assert_eq!(row[0], 0.0);
            assert_eq!(row[1], 0.0);
            assert_eq!(row[3], 0.0);
        }
    }

    #[test]
    fn test_strided_keeps_first_row_and_caps_length() {
        let data: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let m = FeatureMatrix::from_rows(data, 1);
        let s = m.strided(5);
        assert_eq!(s.n_rows(), 5);
        assert_eq!(s.row(0), &[0.0]);
        assert_eq!(s.row(1), &[2.0]);
        assert_eq!(m.strided(20).n_rows(), 10);
    }

    #[test]
    fn test_squared_distance() {
        assert_eq!(squared_distance(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
    }
}
