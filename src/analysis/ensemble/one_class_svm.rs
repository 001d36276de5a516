//! One-class support vector machine with an RBF kernel.
//!
//! Solves the ν-formulation dual
//!
//! ```text
//! min ½ αᵀQα   s.t.  0 ≤ αᵢ ≤ 1,  Σαᵢ = ν·l,  Qᵢⱼ = exp(−γ‖xᵢ − xⱼ‖²)
//! ```
//!
//! by sequential minimal optimization over maximal-violating pairs. The
//! decision function is `f(x) = Σ αᵢ K(xᵢ, x) − ρ`; points with `f(x) < 0`
//! fall outside the learned support and are flagged. `γ = 1 / (d · var(X))`.

use super::{AnomalyModel, FittedModel, insufficient};
use crate::analysis::features::{FeatureMatrix, squared_distance};
use crate::config::OneClassSvmConfig;
use crate::model::{ModelFitError, ModelKind, ModelVote};

const MIN_POINTS: usize = 10;
const TAU: f64 = 1e-12;

pub struct OneClassSvm {
    config: OneClassSvmConfig,
}

impl OneClassSvm {
    pub fn new(config: OneClassSvmConfig) -> Self {
        Self { config }
    }
}

impl AnomalyModel for OneClassSvm {
    fn kind(&self) -> ModelKind {
        ModelKind::OneClassSvm
    }

    fn min_points(&self) -> usize {
        MIN_POINTS.max((1.0 / self.config.nu).ceil() as usize)
    }

    fn fit(&self, features: &FeatureMatrix) -> Result<Box<dyn FittedModel>, ModelFitError> {
        let n = features.n_rows();
        let required = self.min_points();
        if n < required {
            return Err(insufficient(self.kind(), required, n));
        }

        let train = features.strided(self.config.max_train);
        let variance = train.total_variance();
        let gamma = if variance > 0.0 {
            1.0 / (train.n_features() as f64 * variance)
        } else {
            1.0
        };
        if !gamma.is_finite() {
            return Err(ModelFitError::Degenerate {
                model: self.kind(),
                reason: format!("kernel width is not finite (variance {})", variance),
            });
        }

        let kernel = KernelMatrix::new(&train, gamma);
        let solution = solve(&kernel, self.config.nu, self.config.tolerance, self.config.max_iterations);
        if !solution.rho.is_finite() {
            return Err(ModelFitError::Degenerate {
                model: self.kind(),
                reason: "offset did not converge to a finite value".to_string(),
            });
        }
        if !solution.converged {
            tracing::debug!(
                iterations = self.config.max_iterations,
                "one-class SVM hit its iteration cap; using the current solution"
            );
        }

        // Keep only the support vectors.
        let mut support = Vec::new();
        let mut coefficients = Vec::new();
        for (i, &alpha) in solution.alpha.iter().enumerate() {
            if alpha > 0.0 {
                support.extend_from_slice(train.row(i));
                coefficients.push(alpha);
            }
        }

        Ok(Box::new(FittedOneClassSvm {
            support: FeatureMatrix::from_rows(support, train.n_features()),
            coefficients,
            gamma,
            rho: solution.rho,
        }))
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

struct KernelMatrix {
    l: usize,
    values: Vec<f64>,
}

impl KernelMatrix {
    fn new(train: &FeatureMatrix, gamma: f64) -> Self {
        let l = train.n_rows();
        let mut values = vec![0.0; l * l];
        for i in 0..l {
            values[i * l + i] = 1.0;
            for j in (i + 1)..l {
                let k = (-gamma * squared_distance(train.row(i), train.row(j))).exp();
                values[i * l + j] = k;
                values[j * l + i] = k;
            }
        }
        Self { l, values }
    }

    fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.l..(i + 1) * self.l]
    }

    fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.l + j]
    }
}

struct Solution {
    alpha: Vec<f64>,
    rho: f64,
    converged: bool,
}

fn solve(kernel: &KernelMatrix, nu: f64, tolerance: f64, max_iterations: usize) -> Solution {
    let l = kernel.l;
    const C: f64 = 1.0;

    // Feasible start: the first ⌊ν·l⌋ multipliers at the bound, one partial.
    let total = nu * l as f64;
    let full = (total.floor() as usize).min(l);
    let mut alpha = vec![0.0; l];
    for a in alpha.iter_mut().take(full) {
        *a = C;
    }
    if full < l {
        alpha[full] = total - full as f64;
    }

    // Gradient of the objective: G = Qα.
    let mut gradient = vec![0.0; l];
    for (i, &a) in alpha.iter().enumerate() {
        if a > 0.0 {
            for (g, q) in gradient.iter_mut().zip(kernel.row(i)) {
                *g += a * q;
            }
        }
    }

    let mut converged = false;
    for _ in 0..max_iterations {
        // i: smallest gradient among multipliers that can grow.
        // j: largest gradient among multipliers that can shrink.
        let mut i = None;
        let mut g_min = f64::INFINITY;
        let mut j = None;
        let mut g_max = f64::NEG_INFINITY;
        for t in 0..l {
            if alpha[t] < C && gradient[t] < g_min {
                g_min = gradient[t];
                i = Some(t);
            }
            if alpha[t] > 0.0 && gradient[t] > g_max {
                g_max = gradient[t];
                j = Some(t);
            }
        }

        let (Some(i), Some(j)) = (i, j) else {
            converged = true;
            break;
        };
        if g_max - g_min < tolerance {
            converged = true;
            break;
        }

        let quad = (kernel.get(i, i) + kernel.get(j, j) - 2.0 * kernel.get(i, j)).max(TAU);
        let step = ((g_max - g_min) / quad).min(C - alpha[i]).min(alpha[j]);
        if step <= 0.0 {
            converged = true;
            break;
        }

        alpha[i] += step;
        alpha[j] -= step;
        // Snap to the bounds so the free/bound tests below stay exact.
        if alpha[i] > C - 1e-15 {
            alpha[i] = C;
        }
        if alpha[j] < 1e-15 {
            alpha[j] = 0.0;
        }

        let row_i = kernel.row(i);
        let row_j = kernel.row(j);
        for t in 0..l {
            gradient[t] += step * (row_i[t] - row_j[t]);
        }
    }

    let rho = offset(&alpha, &gradient, C);
    Solution {
        alpha,
        rho,
        converged,
    }
}

/// ρ is the mean gradient over free multipliers; with none free it is the
/// midpoint of the feasible interval the bounded ones leave.
fn offset(alpha: &[f64], gradient: &[f64], c: f64) -> f64 {
    let mut free_sum = 0.0;
    let mut free = 0usize;
    let mut upper = f64::INFINITY;
    let mut lower = f64::NEG_INFINITY;
    for (&a, &g) in alpha.iter().zip(gradient) {
        if a >= c {
            lower = lower.max(g);
        } else if a <= 0.0 {
            upper = upper.min(g);
        } else {
            free_sum += g;
            free += 1;
        }
    }
    if free > 0 {
        free_sum / free as f64
    } else if upper.is_finite() && lower.is_finite() {
        (upper + lower) / 2.0
    } else if lower.is_finite() {
        lower
    } else {
        upper
    }
}

// ---------------------------------------------------------------------------
// Fitted model
// ---------------------------------------------------------------------------

struct FittedOneClassSvm {
    support: FeatureMatrix,
    coefficients: Vec<f64>,
    gamma: f64,
    rho: f64,
}

impl FittedOneClassSvm {
    fn decision(&self, row: &[f64]) -> f64 {
        let sum: f64 = self
            .support
            .rows()
            .zip(&self.coefficients)
            .map(|(sv, &a)| a * (-self.gamma * squared_distance(sv, row)).exp())
            .sum();
        sum - self.rho
    }
}

impl FittedModel for FittedOneClassSvm {
    fn kind(&self) -> ModelKind {
        ModelKind::OneClassSvm
    }

    fn score(&self, row: &[f64]) -> ModelVote {
        let f = self.decision(row);
        ModelVote {
            model: ModelKind::OneClassSvm,
            is_anomaly: f < 0.0,
            score: -f,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_with_outlier() -> FeatureMatrix {
        let mut data = Vec::new();
        for i in 0..80 {
            let t = i as f64 * 0.23;
            data.push(t.sin() * (1.0 + 0.1 * (i % 5) as f64));
            data.push(t.cos() * (1.0 + 0.1 * (i % 3) as f64));
        }
        data.push(6.0);
        data.push(6.0);
        FeatureMatrix::from_rows(data, 2)
    }

    #[test]
    fn test_minimum_follows_nu() {
        let model = OneClassSvm::new(OneClassSvmConfig::default());
        assert_eq!(model.min_points(), 10);
        let strict = OneClassSvm::new(OneClassSvmConfig {
            nu: 0.05,
            ..OneClassSvmConfig::default()
        });
        assert_eq!(strict.min_points(), 20);
    }

    #[test]
    fn test_far_point_is_outside_the_support() {
        let features = ring_with_outlier();
        let fitted = OneClassSvm::new(OneClassSvmConfig::default()).fit(&features).unwrap();
        let outlier = fitted.score(features.row(80));
        assert!(outlier.is_anomaly, "decision {}", -outlier.score);
        assert!(outlier.score > 0.0);
    }

    #[test]
    fn test_most_training_points_are_inside() {
        let features = ring_with_outlier();
        let fitted = OneClassSvm::new(OneClassSvmConfig::default()).fit(&features).unwrap();
        let flagged = features.rows().filter(|r| fitted.score(r).is_anomaly).count();
        // ν bounds the fraction of margin errors; allow slack for the boundary.
        assert!(flagged <= 20, "flagged {} of 81", flagged);
    }

    #[test]
    fn test_dual_constraints_hold() {
        let features = ring_with_outlier();
        let kernel = KernelMatrix::new(&features, 0.5);
        let solution = solve(&kernel, 0.1, 1e-3, 100_000);
        assert!(solution.converged);
        let sum: f64 = solution.alpha.iter().sum();
        assert!((sum - 0.1 * 81.0).abs() < 1e-9, "Σα = {}", sum);
        assert!(solution.alpha.iter().all(|&a| (0.0..=1.0).contains(&a)));
    }

    #[test]
    fn test_identical_points_fit_without_flags() {
        let features = FeatureMatrix::from_rows(vec![2.0; 30], 1);
        let fitted = OneClassSvm::new(OneClassSvmConfig::default()).fit(&features).unwrap();
        assert!(!fitted.score(features.row(0)).is_anomaly);
    }

    #[test]
    fn test_offset_with_no_free_multipliers_is_midpoint() {
        let rho = offset(&[1.0, 0.0], &[0.2, 0.6], 1.0);
        assert!((rho - 0.4).abs() < 1e-12);
    }
}
