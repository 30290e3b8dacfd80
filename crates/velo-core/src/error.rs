//! Error types for `velo-core`.
//!
//! [`Error`] covers failures that abort a whole stage (one source's
//! consolidation, or the aggregation run). [`MappingError`] and
//! [`ResolutionWarning`] are record-level: they are collected into the run
//! summary and never abort a batch.

use serde::Serialize;
use thiserror::Error;

use crate::source::Source;

#[derive(Debug, Error)]
pub enum Error {
  /// The raw snapshot for a source is missing or is not a record collection.
  #[error("ingestion error for {feed}: {reason}")]
  Ingestion { feed: Source, reason: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn ingestion(feed: Source, reason: impl Into<String>) -> Self {
    Self::Ingestion { feed, reason: reason.into() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why a single raw record was dropped by an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingError {
  #[error("record {index} is not a JSON object")]
  NotAnObject { index: usize },

  #[error("record {index} is missing required field `{field}`")]
  MissingField { index: usize, field: &'static str },

  #[error("record {index} has invalid `{field}`: {value}")]
  InvalidField {
    index: usize,
    field: &'static str,
    value: String,
  },
}

impl MappingError {
  /// Position of the offending record in the raw collection.
  pub fn index(&self) -> usize {
    match self {
      Self::NotAnObject { index }
      | Self::MissingField { index, .. }
      | Self::InvalidField { index, .. } => *index,
    }
  }
}

/// A station feed named a city that the registry does not know. The stations
/// are kept with the unaffiliated sentinel code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionWarning {
  /// The name as it appeared in the feed (lowercased and trimmed).
  pub city_name:     String,
  /// How many stations of the batch carried that name.
  pub station_count: usize,
}

impl std::fmt::Display for ResolutionWarning {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "no city code found for {:?} ({} station(s) left unaffiliated)",
      self.city_name, self.station_count
    )
  }
}
