//! Severity policy shared by the statistical detector and the aggregator.
//!
//! Report gating (which candidates are kept) lives with the aggregator;
//! this module only knows how big a deviation has to be for each tier.

pub mod severity;

pub use severity::{severity_for_confidence, severity_for_magnitude};
