//! Staged daily pipeline for Velo.
//!
//! Drives any [`velo_core::store::AggregateStore`]: each source is
//! consolidated on its own, so one failing source never blocks the others,
//! and aggregation then runs over whatever did consolidate.
//!
//! ```rust,ignore
//! let pipeline = Pipeline::new(&store, SnapshotLayout::new("data/raw"));
//! let sources: Vec<Source> = Source::iter().collect();
//! let summary = pipeline.run(&sources, date).await;
//! ```

pub mod aggregate;
pub mod consolidate;
pub mod error;
pub mod summary;

use chrono::NaiveDate;
use order::consolidation_order;
use tracing::{error, info};
use velo_core::{
  source::{SnapshotLayout, Source},
  store::AggregateStore,
};

pub use aggregate::AggregationEngine;
pub use consolidate::Consolidator;
pub use error::{PipelineError, Result};
pub use summary::{AggregationOutcome, AggregationReport, RunSummary, SourceOutcome, SourceReport};

/// Consolidation followed by aggregation against one store.
#[derive(Debug)]
pub struct Pipeline<'s, S> {
  consolidator: Consolidator<'s, S>,
  engine:       AggregationEngine<'s, S>,
}

impl<'s, S: AggregateStore> Pipeline<'s, S> {
  pub fn new(store: &'s S, layout: SnapshotLayout) -> Self {
    Self {
      consolidator: Consolidator::new(store, layout),
      engine:       AggregationEngine::new(store),
    }
  }

  /// Consolidate the saved snapshots of `sources` for `date`, one at a time.
  /// The city registry always goes first so the station feeds resolve
  /// against it.
  pub async fn consolidate(&self, sources: &[Source], date: NaiveDate) -> Vec<SourceOutcome> {
    let mut outcomes = Vec::with_capacity(sources.len());
    for source in consolidation_order(sources) {
      let outcome = match self.consolidator.consolidate_file(source, date).await {
        Ok(report) => SourceOutcome::Consolidated(report),
        Err(e) => {
          error!(%source, %date, error = %e, "consolidation failed");
          SourceOutcome::Failed { source, error: e }
        }
      };
      outcomes.push(outcome);
    }
    outcomes
  }

  /// Refresh the derived tables, stamping facts with `run_date`.
  pub async fn aggregate(&self, run_date: NaiveDate) -> AggregationOutcome {
    let result = self.engine.run(run_date).await;
    if let Err(e) = &result {
      error!(%run_date, error = %e, "aggregation failed");
    }
    result.into()
  }

  /// Consolidate `sources` then aggregate, all for `date`.
  pub async fn run(&self, sources: &[Source], date: NaiveDate) -> RunSummary {
    info!(%date, "pipeline run started");
    let mut summary = RunSummary::new(date);
    summary.sources = self.consolidate(sources, date).await;
    summary.aggregation = Some(self.aggregate(date).await);
    info!(%date, success = summary.is_success(), "pipeline run finished");
    summary
  }
}

mod order {
  use velo_core::source::Source;

  /// `sources` deduplicated, with the city registry moved to the front.
  pub fn consolidation_order(sources: &[Source]) -> Vec<Source> {
    let mut ordered: Vec<Source> = Vec::with_capacity(sources.len());
    if sources.contains(&Source::CityRegistry) {
      ordered.push(Source::CityRegistry);
    }
    for &source in sources {
      if !ordered.contains(&source) {
        ordered.push(source);
      }
    }
    ordered
  }

  #[cfg(test)]
  mod tests {
    use super::*;

    #[test]
    fn registry_goes_first_and_duplicates_are_dropped() {
      let order = consolidation_order(&[
        Source::Toulouse,
        Source::Paris,
        Source::CityRegistry,
        Source::Toulouse,
      ]);
      assert_eq!(order, vec![Source::CityRegistry, Source::Toulouse, Source::Paris]);
    }
  }
}

#[cfg(test)]
mod tests;
