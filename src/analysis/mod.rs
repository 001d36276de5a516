//! Numeric core of the anomaly engine.
//!
//! Every function here is pure over an immutable element series; nothing
//! reads process-wide state or performs I/O.
//!
//! Submodules:
//! - `series`      — sorted per-element views of a station snapshot
//! - `qa`          — station-level quality-assurance checks
//! - `baseline`    — windowed summary statistics around a target date
//! - `statistical` — z-score deviation test against a baseline
//! - `features`    — standardized feature rows for the ensemble
//! - `ensemble`    — unsupervised model variants and the detector
//! - `hybrid`      — fuses the signals into one candidate
//! - `explain`     — rationale text for a candidate

pub mod baseline;
pub mod ensemble;
pub mod explain;
pub mod features;
pub mod hybrid;
pub mod qa;
pub mod series;
pub mod statistical;
