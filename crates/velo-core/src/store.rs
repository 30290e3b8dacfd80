//! The store traits and the table registry.
//!
//! [`ConsolidationStore`] owns the three consolidated tables and their
//! snapshot-versioned history. [`AggregateStore`] adds the dimension and fact
//! tables, which only the aggregation engine writes. Backends (e.g.
//! `velo-store-sqlite`) implement both; the pipeline depends on these
//! abstractions, not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::{
  city::CanonicalCity,
  station::{CanonicalStation, CanonicalStationStatement},
  warehouse::{DimCity, DimStation, FactStationStatement},
};

// ─── Tables ──────────────────────────────────────────────────────────────────

/// Every table the pipeline reads or writes.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Table {
  ConsolidateStation,
  ConsolidateCity,
  ConsolidateStationStatement,
  DimStation,
  DimCity,
  FactStationStatement,
}

impl Table {
  /// The SQL name of the table.
  pub fn name(self) -> &'static str {
    match self {
      Self::ConsolidateStation => "CONSOLIDATE_STATION",
      Self::ConsolidateCity => "CONSOLIDATE_CITY",
      Self::ConsolidateStationStatement => "CONSOLIDATE_STATION_STATEMENT",
      Self::DimStation => "DIM_STATION",
      Self::DimCity => "DIM_CITY",
      Self::FactStationStatement => "FACT_STATION_STATEMENT",
    }
  }

  /// Columns forming the natural key. For consolidated tables the key is
  /// always combined with `created_date`.
  pub fn natural_key(self) -> &'static [&'static str] {
    match self {
      Self::ConsolidateStation | Self::ConsolidateCity => &["id", "created_date"],
      Self::ConsolidateStationStatement => &["station_id", "created_date"],
      Self::DimStation | Self::DimCity => &["id"],
      Self::FactStationStatement => &["station_id", "created_date"],
    }
  }
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Snapshot-versioned storage of canonical records.
///
/// Every upsert follows the same rule: a record whose natural key and
/// `created_date` already exist replaces that row in place; any other record
/// is appended. Rows of a different `created_date` are never touched, so the
/// full history of every snapshot is retained.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait ConsolidationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Verify that every table the pipeline needs exists. Fails with the
  /// backend's schema error naming the first missing table.
  fn check_schema(
    &self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Upsert stations keyed by `(id, created_date)`. Returns the number of
  /// records written. The batch is atomic: on error nothing is written.
  fn upsert_stations(
    &self,
    records: Vec<CanonicalStation>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Upsert cities keyed by `(id, created_date)`.
  fn upsert_cities(
    &self,
    records: Vec<CanonicalCity>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Upsert statements keyed by `(station_id, created_date)`.
  fn upsert_statements(
    &self,
    records: Vec<CanonicalStationStatement>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Upsert one station feed's stations and statements as a single atomic
  /// batch, so a failure leaves neither table holding part of the snapshot.
  /// Returns the number of stations and statements written.
  fn upsert_station_snapshot(
    &self,
    stations: Vec<CanonicalStation>,
    statements: Vec<CanonicalStationStatement>,
  ) -> impl Future<Output = Result<(usize, usize), Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The most recent `created_date` present in a consolidated table,
  /// optionally restricted to dates on or before `as_of`. `None` when the
  /// table holds no matching row.
  fn latest_snapshot_date(
    &self,
    table: Table,
    as_of: Option<NaiveDate>,
  ) -> impl Future<Output = Result<Option<NaiveDate>, Self::Error>> + Send + '_;

  /// All stations of the snapshot taken on `date`.
  fn stations_on(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Vec<CanonicalStation>, Self::Error>> + Send + '_;

  /// All cities of the snapshot taken on `date`.
  fn cities_on(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Vec<CanonicalCity>, Self::Error>> + Send + '_;

  /// All statements of the snapshot taken on `date`.
  fn statements_on(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Vec<CanonicalStationStatement>, Self::Error>>
  + Send
  + '_;

  /// Number of rows in `table`, optionally restricted to one `created_date`.
  /// Dimension tables ignore `date`.
  fn count_rows(
    &self,
    table: Table,
    date: Option<NaiveDate>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}

/// Storage of the derived dimension and fact tables.
pub trait AggregateStore: ConsolidationStore {
  /// Replace the whole content of `DIM_STATION` with `rows`, atomically.
  fn replace_dim_stations(
    &self,
    rows: Vec<DimStation>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Replace the whole content of `DIM_CITY` with `rows`, atomically.
  fn replace_dim_cities(
    &self,
    rows: Vec<DimCity>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Replace the fact rows stamped `run_date` with `rows`. Rows of other
  /// dates are left untouched.
  fn replace_fact_snapshot(
    &self,
    run_date: NaiveDate,
    rows: Vec<FactStationStatement>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn dim_stations(
    &self,
  ) -> impl Future<Output = Result<Vec<DimStation>, Self::Error>> + Send + '_;

  fn dim_cities(
    &self,
  ) -> impl Future<Output = Result<Vec<DimCity>, Self::Error>> + Send + '_;

  /// Fact rows stamped `run_date`.
  fn facts_on(
    &self,
    run_date: NaiveDate,
  ) -> impl Future<Output = Result<Vec<FactStationStatement>, Self::Error>>
  + Send
  + '_;
}
