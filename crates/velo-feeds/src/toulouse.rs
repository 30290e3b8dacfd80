//! Toulouse (Velo Toulouse) real-time availability feed.
//!
//! The feed only names its contract (`"toulouse"`), so each station's city
//! code is resolved against the consolidated city registry. Resolution runs
//! once per distinct name and is broadcast to every station sharing it.

use chrono::NaiveDate;
use serde_json::Value;
use velo_core::{
  city::UNAFFILIATED_CITY_CODE,
  resolver::CityResolver,
  source::Source,
  station::StationStatus,
  Result,
};

use crate::{
  parse_records,
  station::{map_records, StationFields, StatusReading},
  SourceAdapter,
  StationSnapshot,
};

const FIELDS: StationFields = StationFields {
  code:           "number",
  name:           "name",
  city_name:      "contract_name",
  address:        Some("address"),
  longitude:      "position.lon",
  latitude:       "position.lat",
  status:         "status",
  capacity:       "bike_stands",
  docks:          "available_bike_stands",
  bikes:          "available_bikes",
  last_statement: "last_update",
};

/// Adapter for the Toulouse feed, bound to the city snapshot used for
/// resolution.
#[derive(Debug, Clone, Copy)]
pub struct ToulouseFeed<'a> {
  resolver: &'a CityResolver,
}

impl<'a> ToulouseFeed<'a> {
  pub fn new(resolver: &'a CityResolver) -> Self { Self { resolver } }
}

impl SourceAdapter for ToulouseFeed<'_> {
  type Snapshot = StationSnapshot;

  fn adapt(&self, raw: &str, date: NaiveDate) -> Result<StationSnapshot> {
    let records = parse_records(Source::Toulouse, raw)?;
    let mut snapshot = map_records(Source::Toulouse, &FIELDS, records, date, read_status, |_| {
      UNAFFILIATED_CITY_CODE
    });

    let batch = self
      .resolver
      .resolve_batch(snapshot.stations.iter().filter_map(|s| s.city_name.as_deref()));
    for station in &mut snapshot.stations {
      if let Some(name) = station.city_name.as_deref() {
        station.city_code = batch.city_code(name);
      }
    }
    snapshot.unresolved = batch.warnings;

    Ok(snapshot)
  }
}

fn read_status(v: &Value) -> StatusReading {
  match v.as_str().map(|s| s.trim().to_ascii_uppercase()) {
    Some(s) if s == "OPEN" => StatusReading::Known(StationStatus::Open),
    Some(s) if s == "CLOSE" || s == "CLOSED" => StatusReading::Known(StationStatus::Closed),
    _ => StatusReading::Unknown(v.as_str().map_or_else(|| v.to_string(), str::to_owned)),
  }
}
