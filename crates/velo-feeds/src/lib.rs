//! Source adapters for Velo.
//!
//! Converts raw open-data snapshots (JSON arrays of loosely-typed objects)
//! into [`velo_core`] canonical records. Pure synchronous; no HTTP or
//! database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use velo_feeds::{ParisFeed, SourceAdapter};
//!
//! let raw = std::fs::read_to_string("paris_realtime_bicycle_data.json").unwrap();
//! let date = NaiveDate::from_ymd_opt(2024, 10, 19).unwrap();
//! let snapshot = ParisFeed.adapt(&raw, date).unwrap();
//! println!("{} stations, {} dropped", snapshot.stations.len(), snapshot.rejected.len());
//! ```

mod field;
mod paris;
mod registry;
mod station;
mod toulouse;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use velo_core::{
  city::CanonicalCity,
  source::Source,
  station::{CanonicalStation, CanonicalStationStatement},
  Error, MappingError, ResolutionWarning, Result,
};

pub use paris::ParisFeed;
pub use registry::CityRegistryFeed;
pub use toulouse::ToulouseFeed;

// ─── Public types ────────────────────────────────────────────────────────────

/// Maps one source's raw snapshot into canonical records for one date.
pub trait SourceAdapter {
  type Snapshot;

  /// Map a raw snapshot taken on `date`.
  ///
  /// Fails only when `raw` is not a JSON array; individual unusable records
  /// are reported in the returned snapshot.
  fn adapt(&self, raw: &str, date: NaiveDate) -> Result<Self::Snapshot>;
}

/// Stations and statements mapped from one station-feed snapshot.
#[derive(Debug, Clone, Default)]
pub struct StationSnapshot {
  pub stations:         Vec<CanonicalStation>,
  pub statements:       Vec<CanonicalStationStatement>,
  /// Records dropped for lack of an id-forming field or a coordinate.
  pub rejected:         Vec<MappingError>,
  /// City names that matched no registry entry.
  pub unresolved:       Vec<ResolutionWarning>,
  /// Stations kept with a null status because the feed used a literal we do
  /// not recognise.
  pub unknown_statuses: Vec<UnknownStatus>,
}

/// Cities mapped from one registry snapshot.
#[derive(Debug, Clone, Default)]
pub struct CitySnapshot {
  pub cities:     Vec<CanonicalCity>,
  pub rejected:   Vec<MappingError>,
  /// Records repeating a code already seen earlier in the same snapshot.
  pub duplicates: usize,
}

/// A status literal outside the source's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownStatus {
  pub station_id: String,
  pub value:      String,
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Parse a raw payload into its records. Anything but a JSON array is an
/// untrustworthy file and fails the whole snapshot.
pub(crate) fn parse_records(source: Source, raw: &str) -> Result<Vec<Value>> {
  let value: Value = serde_json::from_str(raw)
    .map_err(|e| Error::ingestion(source, format!("invalid JSON: {e}")))?;
  match value {
    Value::Array(records) => Ok(records),
    other => Err(Error::ingestion(
      source,
      format!("expected a JSON array of records, found {}", kind_of(&other)),
    )),
  }
}

fn kind_of(v: &Value) -> &'static str {
  match v {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}
