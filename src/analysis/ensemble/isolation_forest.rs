//! Isolation forest.
//!
//! Trees split on a random feature at a uniformly random threshold until a
//! point is isolated or the height limit `ceil(log2(max_samples))` is hit.
//! Anomalies isolate in few splits, so the normalized score
//! `2^(-E[h(x)] / c(psi))` approaches 1 for them and sits around 0.5 or below
//! for inliers.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use super::{AnomalyModel, FittedModel, contamination_threshold, insufficient};
use crate::analysis::features::FeatureMatrix;
use crate::config::IsolationForestConfig;
use crate::model::{ModelFitError, ModelKind, ModelVote};

const MIN_POINTS: usize = 10;
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Arena-allocated tree; node 0 is the root.
#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(
        features: &FeatureMatrix,
        sample: &mut [usize],
        height_limit: usize,
        rng: &mut StdRng,
    ) -> Self {
        let mut tree = IsolationTree { nodes: Vec::new() };
        tree.grow(features, sample, 0, height_limit, rng);
        tree
    }

    fn grow(
        &mut self,
        features: &FeatureMatrix,
        sample: &mut [usize],
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: sample.len() });

        if depth >= height_limit || sample.len() <= 1 {
            return id;
        }

        // Only features that still vary within this node can split it.
        let ranges: Vec<(usize, f64, f64)> = (0..features.n_features())
            .filter_map(|f| {
                let (lo, hi) = sample.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                    let v = features.row(i)[f];
                    (lo.min(v), hi.max(v))
                });
                (hi > lo).then_some((f, lo, hi))
            })
            .collect();
        if ranges.is_empty() {
            return id;
        }

        let (feature, lo, hi) = ranges[rng.gen_range(0..ranges.len())];
        let threshold = rng.gen_range(lo..hi);

        // In-place partition: [0, mid) goes left.
        let mut mid = 0;
        for k in 0..sample.len() {
            if features.row(sample[k])[feature] < threshold {
                sample.swap(k, mid);
                mid += 1;
            }
        }

        let (left_sample, right_sample) = sample.split_at_mut(mid);
        let left = self.grow(features, left_sample, depth + 1, height_limit, rng);
        let right = self.grow(features, right_sample, depth + 1, height_limit, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn path_length(&self, row: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

pub struct IsolationForest {
    config: IsolationForestConfig,
}

impl IsolationForest {
    pub fn new(config: IsolationForestConfig) -> Self {
        Self { config }
    }
}

impl AnomalyModel for IsolationForest {
    fn kind(&self) -> ModelKind {
        ModelKind::IsolationForest
    }

    fn min_points(&self) -> usize {
        MIN_POINTS
    }

    fn fit(&self, features: &FeatureMatrix) -> Result<Box<dyn FittedModel>, ModelFitError> {
        let n = features.n_rows();
        if n < MIN_POINTS {
            return Err(insufficient(self.kind(), MIN_POINTS, n));
        }

        let sample_size = self.config.max_samples.min(n);
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let trees: Vec<IsolationTree> = (0..self.config.n_trees)
            .map(|_| {
                let mut sample = index::sample(&mut rng, n, sample_size).into_vec();
                IsolationTree::build(features, &mut sample, height_limit, &mut rng)
            })
            .collect();

        let mut fitted = FittedIsolationForest {
            trees,
            normalizer: average_path_length(sample_size),
            threshold: f64::INFINITY,
        };
        let training: Vec<f64> = features.rows().map(|row| fitted.raw_score(row)).collect();
        fitted.threshold = contamination_threshold(&training, self.config.contamination);

        Ok(Box::new(fitted))
    }
}

struct FittedIsolationForest {
    trees: Vec<IsolationTree>,
    normalizer: f64,
    threshold: f64,
}

impl FittedIsolationForest {
    fn raw_score(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() || self.normalizer <= 0.0 {
            return 0.5;
        }
        let mean_path =
            self.trees.iter().map(|t| t.path_length(row)).sum::<f64>() / self.trees.len() as f64;
        2f64.powf(-mean_path / self.normalizer)
    }
}

impl FittedModel for FittedIsolationForest {
    fn kind(&self) -> ModelKind {
        ModelKind::IsolationForest
    }

    fn score(&self, row: &[f64]) -> ModelVote {
        let score = self.raw_score(row);
        ModelVote {
            model: ModelKind::IsolationForest,
            is_anomaly: score > self.threshold,
            score,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
