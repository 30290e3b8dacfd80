//! Reports produced by a pipeline run.
//!
//! Record-level problems never abort a stage; they are collected here so the
//! caller can inspect or print them once the run is over.

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use velo_core::{source::Source, MappingError, ResolutionWarning};
use velo_feeds::UnknownStatus;

use crate::error::PipelineError;

/// What one source's consolidation wrote and dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
  pub source:           Source,
  pub snapshot_date:    NaiveDate,
  pub stations:         usize,
  pub statements:       usize,
  pub cities:           usize,
  /// Records in the raw snapshot repeating a key already seen.
  pub duplicates:       usize,
  pub rejected:         Vec<MappingError>,
  pub unresolved:       Vec<ResolutionWarning>,
  pub unknown_statuses: Vec<UnknownStatus>,
}

impl SourceReport {
  pub(crate) fn new(source: Source, snapshot_date: NaiveDate) -> Self {
    Self {
      source,
      snapshot_date,
      stations: 0,
      statements: 0,
      cities: 0,
      duplicates: 0,
      rejected: Vec::new(),
      unresolved: Vec::new(),
      unknown_statuses: Vec::new(),
    }
  }
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SourceOutcome {
  Consolidated(SourceReport),
  Failed {
    source: Source,
    #[serde(serialize_with = "display")]
    error:  PipelineError,
  },
}

impl SourceOutcome {
  pub fn is_success(&self) -> bool { matches!(self, Self::Consolidated(_)) }
}

/// Snapshot dates read and rows written by one aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationReport {
  pub run_date:              NaiveDate,
  pub station_snapshot:      Option<NaiveDate>,
  pub city_snapshot:         Option<NaiveDate>,
  pub statement_snapshot:    Option<NaiveDate>,
  pub dim_stations:          usize,
  pub dim_cities:            usize,
  pub facts:                 usize,
  /// Rows discarded because another row shared their key and date.
  pub tie_breaks:            usize,
  /// Statements of stations carrying the unaffiliated city code.
  pub excluded_unaffiliated: usize,
  /// Statements whose station is not in the latest station snapshot.
  pub missing_station:       usize,
  /// Statements whose station's city is not in the latest city snapshot.
  pub missing_city:          usize,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AggregationOutcome {
  Completed(AggregationReport),
  Failed {
    #[serde(serialize_with = "display")]
    error: PipelineError,
  },
}

impl From<Result<AggregationReport, PipelineError>> for AggregationOutcome {
  fn from(result: Result<AggregationReport, PipelineError>) -> Self {
    match result {
      Ok(report) => Self::Completed(report),
      Err(error) => Self::Failed { error },
    }
  }
}

/// Everything a daily run did.
#[derive(Debug, Serialize)]
pub struct RunSummary {
  pub run_date:    NaiveDate,
  pub sources:     Vec<SourceOutcome>,
  /// `None` when aggregation was not requested.
  pub aggregation: Option<AggregationOutcome>,
}

impl RunSummary {
  pub fn new(run_date: NaiveDate) -> Self {
    Self { run_date, sources: Vec::new(), aggregation: None }
  }

  /// False when any source or the aggregation failed.
  pub fn is_success(&self) -> bool {
    self.sources.iter().all(SourceOutcome::is_success)
      && !matches!(self.aggregation, Some(AggregationOutcome::Failed { .. }))
  }

  pub fn failures(&self) -> impl Iterator<Item = &PipelineError> {
    let sources = self.sources.iter().filter_map(|o| match o {
      SourceOutcome::Failed { error, .. } => Some(error),
      SourceOutcome::Consolidated(_) => None,
    });
    let aggregation = match &self.aggregation {
      Some(AggregationOutcome::Failed { error }) => Some(error),
      _ => None,
    };
    sources.chain(aggregation)
  }

  pub fn report_for(&self, source: Source) -> Option<&SourceReport> {
    self.sources.iter().find_map(|o| match o {
      SourceOutcome::Consolidated(r) if r.source == source => Some(r),
      _ => None,
    })
  }

  pub fn aggregation_report(&self) -> Option<&AggregationReport> {
    match &self.aggregation {
      Some(AggregationOutcome::Completed(r)) => Some(r),
      _ => None,
    }
  }
}

fn display<T: std::fmt::Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
  s.collect_str(value)
}
