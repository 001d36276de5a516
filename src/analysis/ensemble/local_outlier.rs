//! Local outlier factor.
//!
//! LOF compares a point's local reachability density with that of its k
//! nearest neighbours; values well above 1 mean the point sits in a sparser
//! region than its neighbours do.
//!
//! Training points are scored leave-self-out: when the queried row is
//! bit-identical to a training row, that one row is skipped as a neighbour.

use super::{AnomalyModel, FittedModel, contamination_threshold, insufficient};
use crate::analysis::features::{FeatureMatrix, squared_distance};
use crate::config::LocalOutlierConfig;
use crate::model::{ModelFitError, ModelKind, ModelVote};

const DENSITY_GUARD: f64 = 1e-10;

pub struct LocalOutlierFactor {
    config: LocalOutlierConfig,
}

impl LocalOutlierFactor {
    pub fn new(config: LocalOutlierConfig) -> Self {
        Self { config }
    }
}

impl AnomalyModel for LocalOutlierFactor {
    fn kind(&self) -> ModelKind {
        ModelKind::LocalOutlierFactor
    }

    fn min_points(&self) -> usize {
        2 * self.config.n_neighbors
    }

    fn fit(&self, features: &FeatureMatrix) -> Result<Box<dyn FittedModel>, ModelFitError> {
        let n = features.n_rows();
        let required = self.min_points();
        if n < required {
            return Err(insufficient(self.kind(), required, n));
        }

        let k = self.config.n_neighbors;
        let train = features.clone();

        let neighbours: Vec<Vec<(usize, f64)>> =
            (0..n).map(|i| nearest(&train, train.row(i), k, Some(i))).collect();

        let k_distance: Vec<f64> = neighbours
            .iter()
            .map(|nb| nb.last().map_or(0.0, |&(_, d)| d))
            .collect();

        let lrd: Vec<f64> = neighbours
            .iter()
            .map(|nb| reachability_density(nb, &k_distance))
            .collect();

        let training_lof: Vec<f64> = neighbours
            .iter()
            .zip(&lrd)
            .map(|(nb, &own)| outlier_factor(nb, own, &lrd))
            .collect();

        let threshold = contamination_threshold(&training_lof, self.config.contamination);

        Ok(Box::new(FittedLocalOutlier {
            train,
            k,
            k_distance,
            lrd,
            threshold,
        }))
    }
}

/// The `k` nearest training rows to `query` as `(index, distance)`, nearest
/// first; ties break on index. `skip` excludes one training index.
fn nearest(
    train: &FeatureMatrix,
    query: &[f64],
    k: usize,
    skip: Option<usize>,
) -> Vec<(usize, f64)> {
    let mut all: Vec<(usize, f64)> = train
        .rows()
        .enumerate()
        .filter(|(j, _)| Some(*j) != skip)
        .map(|(j, row)| (j, squared_distance(query, row).sqrt()))
        .collect();

    let by_distance =
        |a: &(usize, f64), b: &(usize, f64)| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0));
    let k = k.min(all.len());
    if k == 0 {
        return Vec::new();
    }
    if k < all.len() {
        all.select_nth_unstable_by(k - 1, by_distance);
        all.truncate(k);
    }
    all.sort_by(by_distance);
    all
}

fn reachability_density(neighbours: &[(usize, f64)], k_distance: &[f64]) -> f64 {
    if neighbours.is_empty() {
        return 1.0 / DENSITY_GUARD;
    }
    let mean_reach = neighbours
        .iter()
        .map(|&(j, d)| d.max(k_distance[j]))
        .sum::<f64>()
        / neighbours.len() as f64;
    1.0 / (mean_reach + DENSITY_GUARD)
}

fn outlier_factor(neighbours: &[(usize, f64)], own_lrd: f64, lrd: &[f64]) -> f64 {
    if neighbours.is_empty() {
        return 1.0;
    }
    let mean_neighbour_lrd =
        neighbours.iter().map(|&(j, _)| lrd[j]).sum::<f64>() / neighbours.len() as f64;
    mean_neighbour_lrd / own_lrd
}

struct FittedLocalOutlier {
    train: FeatureMatrix,
    k: usize,
    k_distance: Vec<f64>,
    lrd: Vec<f64>,
    threshold: f64,
}

impl FittedLocalOutlier {
    fn identical_training_row(&self, row: &[f64]) -> Option<usize> {
        self.train.rows().position(|t| {
            t.len() == row.len()
                && t.iter().zip(row).all(|(a, b)| a.to_bits() == b.to_bits())
        })
    }
}

impl FittedModel for FittedLocalOutlier {
    fn kind(&self) -> ModelKind {
        ModelKind::LocalOutlierFactor
    }

    fn score(&self, row: &[f64]) -> ModelVote {
        let skip = self.identical_training_row(row);
        let neighbours = nearest(&self.train, row, self.k, skip);
        let own = reachability_density(&neighbours, &self.k_distance);
        let lof = outlier_factor(&neighbours, own, &self.lrd);
        ModelVote {
            model: ModelKind::LocalOutlierFactor,
            is_anomaly: lof > self.threshold,
            score: lof,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_with_outlier() -> FeatureMatrix {
        let mut data = Vec::new();
        for x in 0..8 {
            for y in 0..8 {
                data.push(x as f64 * 0.1);
                data.push(y as f64 * 0.1);
            }
        }
        data.push(5.0);
        data.push(5.0);
        FeatureMatrix::from_rows(data, 2)
    }

    fn small_k() -> LocalOutlierConfig {
        LocalOutlierConfig {
            n_neighbors: 5,
            contamination: 0.1,
        }
    }

    #[test]
    fn test_minimum_is_twice_the_neighbourhood() {
        let model = LocalOutlierFactor::new(LocalOutlierConfig::default());
        assert_eq!(model.min_points(), 40);
        let features = FeatureMatrix::from_rows(vec![0.0; 39], 1);
        assert!(matches!(
            model.fit(&features),
            Err(ModelFitError::InsufficientPoints { required: 40, actual: 39, .. })
        ));
    }

    #[test]
    fn test_isolated_point_has_high_lof() {
        let features = grid_with_outlier();
        let fitted = LocalOutlierFactor::new(small_k()).fit(&features).unwrap();
        let outlier = fitted.score(features.row(64));
        let interior = fitted.score(features.row(27));
        assert!(outlier.is_anomaly, "outlier LOF {}", outlier.score);
        assert!(outlier.score > 5.0, "outlier LOF {}", outlier.score);
        assert!((interior.score - 1.0).abs() < 0.5, "interior LOF {}", interior.score);
    }

    #[test]
    fn test_in_sample_score_skips_itself() {
        let features = grid_with_outlier();
        let fitted = LocalOutlierFactor::new(small_k()).fit(&features).unwrap();
        // Scoring a training row as if it were new would find itself at
        // distance 0 and inflate its density.
        let vote = fitted.score(features.row(0));
        assert!(vote.score.is_finite());
        assert!(vote.score > 0.5, "corner LOF {}", vote.score);
    }

    #[test]
    fn test_identical_points_are_not_flagged() {
        let features = FeatureMatrix::from_rows(vec![1.0; 20], 1);
        let fitted = LocalOutlierFactor::new(small_k()).fit(&features).unwrap();
        assert!(!fitted.score(features.row(3)).is_anomaly);
    }

    #[test]
    fn test_nearest_breaks_ties_on_index() {
        let train = FeatureMatrix::from_rows(vec![1.0, -1.0, 1.0, 3.0], 1);
        let nb = nearest(&train, &[0.0], 2, None);
        assert_eq!(nb, vec![(0, 1.0), (1, 1.0)]);
    }
}
