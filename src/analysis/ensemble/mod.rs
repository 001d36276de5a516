//! Unsupervised ensemble over an element's feature rows.
//!
//! Every variant implements [`AnomalyModel`]: fit once on the full series,
//! get back a [`FittedModel`] that votes on individual rows. The detector
//! fits whichever variants the series is long enough for and reports the
//! ensemble as unavailable when none of them fit.
//!
//! Submodules:
//! - `isolation_forest` — random-split isolation depth
//! - `local_outlier`   — k-nearest-neighbour local density ratio
//! - `one_class_svm`   — RBF-kernel support boundary

pub mod isolation_forest;
pub mod local_outlier;
pub mod one_class_svm;

use std::time::{Duration, Instant};

pub use isolation_forest::IsolationForest;
pub use local_outlier::LocalOutlierFactor;
pub use one_class_svm::OneClassSvm;

use super::baseline::percentile_sorted;
use super::features::FeatureMatrix;
use crate::config::EnsembleConfig;
use crate::logging;
use crate::model::{ModelFitError, ModelKind, ModelVote, UnavailableReason};

// ---------------------------------------------------------------------------
// Model seam
// ---------------------------------------------------------------------------

/// An ensemble variant before fitting. Holds only hyperparameters.
pub trait AnomalyModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Fewest rows `fit` accepts.
    fn min_points(&self) -> usize;

    fn fit(&self, features: &FeatureMatrix) -> Result<Box<dyn FittedModel>, ModelFitError>;
}

/// Fitted state of one variant. Scoring never mutates it.
pub trait FittedModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Votes on one standardized feature row. Higher score = more anomalous.
    fn score(&self, row: &[f64]) -> ModelVote;
}

pub(crate) fn insufficient(model: ModelKind, required: usize, actual: usize) -> ModelFitError {
    ModelFitError::InsufficientPoints {
        model,
        required,
        actual,
    }
}

/// Score above which a training point counts as anomalous: the
/// `(1 - contamination)` quantile of the training scores.
pub(crate) fn contamination_threshold(training_scores: &[f64], contamination: f64) -> f64 {
    let mut sorted: Vec<f64> = training_scores.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, 1.0 - contamination)
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Wall-clock cutoff for a station run. `Deadline::none()` never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn none() -> Self {
        Deadline(None)
    }

    pub fn after(budget: Duration) -> Self {
        Deadline(Instant::now().checked_add(budget))
    }

    pub fn from_budget_ms(budget_ms: Option<u64>) -> Self {
        match budget_ms {
            Some(ms) => Deadline::after(Duration::from_millis(ms)),
            None => Deadline::none(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// The fitted variants for one element, in configuration order.
pub struct FittedEnsemble {
    models: Vec<Box<dyn FittedModel>>,
}

impl FittedEnsemble {
    pub fn kinds(&self) -> Vec<ModelKind> {
        self.models.iter().map(|m| m.kind()).collect()
    }

    /// One vote per fitted model, in fit order.
    pub fn votes(&self, row: &[f64]) -> Vec<ModelVote> {
        self.models.iter().map(|m| m.score(row)).collect()
    }
}

impl std::fmt::Debug for FittedEnsemble {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FittedEnsemble")
            .field("models", &self.kinds())
            .finish()
    }
}

#[derive(Debug)]
pub enum EnsembleOutcome {
    Available(FittedEnsemble),
    Unavailable(UnavailableReason),
}

/// Share of votes that flag the point. Zero for an empty vote.
pub fn anomaly_fraction(votes: &[ModelVote]) -> f64 {
    if votes.is_empty() {
        return 0.0;
    }
    let flagged = votes.iter().filter(|v| v.is_anomaly).count();
    flagged as f64 / votes.len() as f64
}

pub struct EnsembleDetector {
    models: Vec<Box<dyn AnomalyModel>>,
}

impl EnsembleDetector {
    pub fn new(models: Vec<Box<dyn AnomalyModel>>) -> Self {
        Self { models }
    }

    /// The three standard variants configured from `config`.
    pub fn from_config(config: &EnsembleConfig) -> Self {
        Self::new(vec![
            Box::new(IsolationForest::new(config.isolation_forest.clone())),
            Box::new(LocalOutlierFactor::new(config.local_outlier.clone())),
            Box::new(OneClassSvm::new(config.one_class_svm.clone())),
        ])
    }

    /// Smallest series any variant can fit.
    pub fn min_points(&self) -> usize {
        self.models.iter().map(|m| m.min_points()).min().unwrap_or(usize::MAX)
    }

    /// Fits every variant the series supports.
    ///
    /// The deadline is checked before each fit. Once it has passed the
    /// element is reported as `BudgetExhausted` and models already fitted for
    /// it are discarded, so an element is either fully ensembled or scored
    /// statistical-only.
    pub fn fit(
        &self,
        features: &FeatureMatrix,
        deadline: Deadline,
        station_id: &str,
        element: &str,
    ) -> EnsembleOutcome {
        let n = features.n_rows();
        if n < self.min_points() {
            return EnsembleOutcome::Unavailable(UnavailableReason::TooFewPoints);
        }

        let mut fitted = Vec::with_capacity(self.models.len());
        for model in &self.models {
            if deadline.is_expired() {
                return EnsembleOutcome::Unavailable(UnavailableReason::BudgetExhausted);
            }
            match model.fit(features) {
                Ok(m) => fitted.push(m),
                Err(err) => logging::log_fit_failure(station_id, element, &err),
            }
        }

        if fitted.is_empty() {
            return EnsembleOutcome::Unavailable(UnavailableReason::AllModelsFailed);
        }

        let ensemble = FittedEnsemble { models: fitted };
        logging::log_ensemble_fitted(station_id, element, &ensemble.kinds(), n);
        EnsembleOutcome::Available(ensemble)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
