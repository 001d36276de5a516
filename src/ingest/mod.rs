//! Adapters from already-fetched station data to domain records.
//!
//! Fetching is the acquisition layer's job; these modules only parse bytes
//! the caller hands in and package them as an immutable `StationSnapshot`.
//!
//! Submodules:
//! - `ghcn` — NCEI GHCN-Daily CSV (value and `_ATTRIBUTES` column pairs)

pub mod ghcn;

use std::sync::Arc;

use crate::model::Observation;

/// Failures that make a whole input file unusable.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("required column '{0}' is missing")]
    MissingColumn(&'static str),
}

/// Immutable observations for one station, shared read-only across workers.
#[derive(Debug, Clone)]
pub struct StationSnapshot {
    pub station_id: String,
    pub observations: Arc<[Observation]>,
}

impl StationSnapshot {
    pub fn new(station_id: impl Into<String>, observations: Vec<Observation>) -> Self {
        Self {
            station_id: station_id.into(),
            observations: observations.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
