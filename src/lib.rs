//! Per-station weather anomaly detection.
//!
//! Scores daily GHCN observations against windowed baselines and an
//! unsupervised model ensemble, weighs in provenance-flag quality, and
//! assembles an explainable station report.
//!
//! Entry point for callers is `pipeline::AnalysisEngine`.

pub mod alert;
pub mod analysis;
pub mod config;
pub mod elements;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod quality;
pub mod report;
