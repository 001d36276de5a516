//! Analysis configuration.
//!
//! Loaded from a TOML file; every section and field has a default so a
//! partial (or empty) file is valid. Call `validate` before handing a config
//! to the engine. `AnalysisEngine::new` does this for you.
//!
//! ```toml
//! [baseline]
//! window_radius_days = 30
//!
//! [aggregation]
//! statistical_weight = 0.4
//! ensemble_weight = 0.6
//! confidence_threshold = 0.5
//!
//! [ensemble.local_outlier]
//! n_neighbors = 20
//!
//! [runtime]
//! station_budget_ms = 5000
//! ```

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub baseline: BaselineConfig,
    pub aggregation: AggregationConfig,
    pub ensemble: EnsembleConfig,
    pub qa: QaConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Days on either side of the target date included in its baseline.
    pub window_radius_days: u32,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            window_radius_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub statistical_weight: f64,
    pub ensemble_weight: f64,
    /// Minimum combined confidence for a candidate to be reported.
    pub confidence_threshold: f64,
    /// Gate on `confidence * quality / 100` instead of raw confidence.
    /// Off by default: quality is attached to each record for the caller.
    pub apply_quality_discount: bool,
    /// Multiplier that puts combined confidence on the |z| scale when the
    /// z-score is undefined and severity must come from confidence.
    pub confidence_severity_scale: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            statistical_weight: 0.4,
            ensemble_weight: 0.6,
            confidence_threshold: 0.5,
            apply_quality_discount: false,
            confidence_severity_scale: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Points in the trailing rolling-mean feature.
    pub rolling_window: usize,
    pub isolation_forest: IsolationForestConfig,
    pub local_outlier: LocalOutlierConfig,
    pub one_class_svm: OneClassSvmConfig,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            rolling_window: 7,
            isolation_forest: IsolationForestConfig::default(),
            local_outlier: LocalOutlierConfig::default(),
            one_class_svm: OneClassSvmConfig::default(),
        }
    }
}

impl EnsembleConfig {
    /// Copy with every model's contamination (and the SVM's ν) raised to at
    /// least `floor`.
    pub fn with_min_contamination(&self, floor: f64) -> Self {
        let mut raised = self.clone();
        raised.isolation_forest.contamination = raised.isolation_forest.contamination.max(floor);
        raised.local_outlier.contamination = raised.local_outlier.contamination.max(floor);
        raised.one_class_svm.nu = raised.one_class_svm.nu.max(floor);
        raised
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IsolationForestConfig {
    pub contamination: f64,
    pub n_trees: usize,
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            n_trees: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocalOutlierConfig {
    pub n_neighbors: usize,
    pub contamination: f64,
}

impl Default for LocalOutlierConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 20,
            contamination: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OneClassSvmConfig {
    /// Upper bound on the fraction of margin errors (the sensitivity).
    pub nu: f64,
    /// Largest training set; longer series are evenly strided down.
    pub max_train: usize,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for OneClassSvmConfig {
    fn default() -> Self {
        Self {
            nu: 0.1,
            max_train: 1000,
            tolerance: 1e-3,
            max_iterations: 100_000,
        }
    }
}

/// Station QA checks run before the ensemble is fitted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    pub enabled: bool,
    /// A station with more QA issues than this is fitted with
    /// `elevated_contamination`.
    pub issue_limit: usize,
    pub elevated_contamination: f64,
    /// Longest run of identical consecutive temperatures that is not
    /// reported as persistence.
    pub max_identical_run: usize,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            issue_limit: 5,
            elevated_contamination: 0.15,
            max_identical_run: 7,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker threads for model fitting. `None` uses rayon's default.
    pub workers: Option<usize>,
    /// Wall-clock budget per station analysis, in milliseconds.
    pub station_budget_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

/// Parses configuration from TOML text.
pub fn parse_config(text: &str) -> Result<AnalysisConfig, ConfigError> {
    let config: AnalysisConfig = toml::from_str(text)?;
    Ok(config)
}

/// Reads and parses a TOML configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<AnalysisConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&text)
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn check_fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 0.5 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be in (0, 0.5], got {}", value)))
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baseline.window_radius_days == 0 {
            return Err(invalid("baseline.window_radius_days", "must be at least 1"));
        }

        let agg = &self.aggregation;
        if !(0.0..=1.0).contains(&agg.confidence_threshold) {
            return Err(invalid(
                "aggregation.confidence_threshold",
                format!("must be in [0, 1], got {}", agg.confidence_threshold),
            ));
        }
        if agg.statistical_weight < 0.0 || agg.ensemble_weight < 0.0 {
            return Err(invalid("aggregation weights", "must not be negative"));
        }
        if agg.statistical_weight + agg.ensemble_weight <= 0.0 {
            return Err(invalid("aggregation weights", "must have a positive sum"));
        }
        // Statistical-only fallback renormalizes onto the statistical signal,
        // so it needs a weight of its own.
        if agg.statistical_weight == 0.0 {
            return Err(invalid("aggregation.statistical_weight", "must be positive"));
        }
        if !(agg.confidence_severity_scale > 0.0) {
            return Err(invalid("aggregation.confidence_severity_scale", "must be positive"));
        }

        let ens = &self.ensemble;
        if ens.rolling_window == 0 {
            return Err(invalid("ensemble.rolling_window", "must be at least 1"));
        }
        check_fraction("ensemble.isolation_forest.contamination", ens.isolation_forest.contamination)?;
        if ens.isolation_forest.n_trees == 0 {
            return Err(invalid("ensemble.isolation_forest.n_trees", "must be at least 1"));
        }
        if ens.isolation_forest.max_samples < 2 {
            return Err(invalid("ensemble.isolation_forest.max_samples", "must be at least 2"));
        }
        check_fraction("ensemble.local_outlier.contamination", ens.local_outlier.contamination)?;
        if ens.local_outlier.n_neighbors == 0 {
            return Err(invalid("ensemble.local_outlier.n_neighbors", "must be at least 1"));
        }
        check_fraction("ensemble.one_class_svm.nu", ens.one_class_svm.nu)?;
        if ens.one_class_svm.max_train < 2 {
            return Err(invalid("ensemble.one_class_svm.max_train", "must be at least 2"));
        }
        if !(ens.one_class_svm.tolerance > 0.0) {
            return Err(invalid("ensemble.one_class_svm.tolerance", "must be positive"));
        }

        check_fraction("qa.elevated_contamination", self.qa.elevated_contamination)?;
        if self.qa.max_identical_run == 0 {
            return Err(invalid("qa.max_identical_run", "must be at least 1"));
        }

        if self.runtime.workers == Some(0) {
            return Err(invalid("runtime.workers", "must be at least 1 when set"));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
