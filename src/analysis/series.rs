//! Per-element views of a station's observations.
//!
//! Everything downstream (baseline windows, feature construction, ensemble
//! fitting) assumes a strictly date-sorted series of finite values.
//! `extract_element_series` copies the element's points out of the caller's
//! snapshot and sorts the copy; the snapshot itself is never reordered.

use chrono::NaiveDate;

use crate::model::Observation;

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub raw_flags: Option<String>,
}

/// Strictly date-sorted, finite points of one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSeries {
    element: String,
    points: Vec<SeriesPoint>,
}

impl ElementSeries {
    /// Builds a series from points in any order.
    ///
    /// Non-finite values are dropped. Points are stably sorted by date and,
    /// when a date repeats, the first point in input order is kept.
    pub fn from_points(element: &str, points: Vec<SeriesPoint>) -> Self {
        let mut points: Vec<SeriesPoint> =
            points.into_iter().filter(|p| p.value.is_finite()).collect();
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Self {
            element: element.to_string(),
            points,
        }
    }

    pub fn element(&self) -> &str {
        &self.element
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }

    /// Half-open index range of points with `start <= date <= end`.
    pub fn range_between(&self, start: NaiveDate, end: NaiveDate) -> std::ops::Range<usize> {
        let lo = self.points.partition_point(|p| p.date < start);
        let hi = self.points.partition_point(|p| p.date <= end);
        lo..hi.max(lo)
    }
}

/// Builds the sorted series for `element` from a station snapshot.
///
/// Observations are expected to be unique per date (validation upstream
/// drops duplicates); if two survive anyway the first in snapshot order wins.
pub fn extract_element_series(observations: &[Observation], element: &str) -> ElementSeries {
    let points: Vec<SeriesPoint> = observations
        .iter()
        .filter_map(|obs| {
            let value = obs.value(element)?;
            Some(SeriesPoint {
                date: obs.date,
                value,
                raw_flags: obs.raw_flags(element).map(str::to_string),
            })
        })
        .collect();
    ElementSeries::from_points(element, points)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
