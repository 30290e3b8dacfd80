//! Pipeline error type.

use std::path::PathBuf;

use thiserror::Error;
use velo_core::source::Source;

/// A failure that aborts one stage of a run: one source's consolidation, or
/// the aggregation.
#[derive(Debug, Error)]
pub enum PipelineError {
  /// The raw snapshot file could not be read.
  #[error("ingestion error for {feed}: cannot read {}: {source}", path.display())]
  Ingestion {
    feed:   Source,
    path:   PathBuf,
    source: std::io::Error,
  },

  /// The raw snapshot was read but is not a record collection.
  #[error(transparent)]
  Core(#[from] velo_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PipelineError {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  /// The store error behind this failure, if it is one of type `E`.
  pub fn store_error<E>(&self) -> Option<&E>
  where
    E: std::error::Error + 'static,
  {
    match self {
      Self::Store(e) => e.downcast_ref::<E>(),
      _ => None,
    }
  }

  /// True for failures caused by a missing or unreadable raw snapshot.
  pub fn is_ingestion(&self) -> bool {
    matches!(
      self,
      Self::Ingestion { .. } | Self::Core(velo_core::Error::Ingestion { .. })
    )
  }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
