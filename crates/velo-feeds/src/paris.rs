//! Paris (Velib') real-time availability feed.
//!
//! Each record carries both the station description and its current
//! availability, plus the official commune code, so no name resolution is
//! needed.

use chrono::NaiveDate;
use serde_json::Value;
use velo_core::{city::UNAFFILIATED_CITY_CODE, source::Source, station::StationStatus, Result};

use crate::{
  field,
  parse_records,
  station::{map_records, StationFields, StatusReading},
  SourceAdapter,
  StationSnapshot,
};

const FIELDS: StationFields = StationFields {
  code:           "stationcode",
  name:           "name",
  city_name:      "nom_arrondissement_communes",
  address:        None,
  longitude:      "coordonnees_geo.lon",
  latitude:       "coordonnees_geo.lat",
  status:         "is_installed",
  capacity:       "capacity",
  docks:          "numdocksavailable",
  bikes:          "numbikesavailable",
  last_statement: "duedate",
};

const CITY_CODE: &str = "code_insee_commune";

/// Adapter for the Paris feed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParisFeed;

impl SourceAdapter for ParisFeed {
  type Snapshot = StationSnapshot;

  fn adapt(&self, raw: &str, date: NaiveDate) -> Result<StationSnapshot> {
    let records = parse_records(Source::Paris, raw)?;
    Ok(map_records(Source::Paris, &FIELDS, records, date, read_status, |record| {
      field::optional(record, CITY_CODE, field::integer).unwrap_or(UNAFFILIATED_CITY_CODE)
    }))
  }
}

/// `is_installed` has been published as a boolean, as `"OUI"`/`"NON"`, and
/// as `0`/`1`.
fn read_status(v: &Value) -> StatusReading {
  match v {
    Value::Bool(b) => StatusReading::Known((*b).into()),
    Value::Number(n) => match n.as_i64() {
      Some(1) => StatusReading::Known(StationStatus::Open),
      Some(0) => StatusReading::Known(StationStatus::Closed),
      _ => StatusReading::Unknown(n.to_string()),
    },
    Value::String(s) => match s.trim().to_ascii_uppercase().as_str() {
      "OUI" | "TRUE" | "YES" => StatusReading::Known(StationStatus::Open),
      "NON" | "FALSE" | "NO" => StatusReading::Known(StationStatus::Closed),
      _ => StatusReading::Unknown(s.clone()),
    },
    other => StatusReading::Unknown(other.to_string()),
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use velo_core::MappingError;

  use super::*;

  fn date() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 10, 19).unwrap() }

  fn record() -> Value {
    json!({
      "stationcode": "16107",
      "name": "Benjamin Godard - Victor Hugo",
      "is_installed": "OUI",
      "capacity": 35,
      "numdocksavailable": 30,
      "numbikesavailable": 4,
      "duedate": "2024-10-19T09:12:05+00:00",
      "coordonnees_geo": { "lon": 2.275725, "lat": 48.865983 },
      "nom_arrondissement_communes": "Paris",
      "code_insee_commune": "75056"
    })
  }

  fn adapt(records: Vec<Value>) -> StationSnapshot {
    ParisFeed.adapt(&Value::Array(records).to_string(), date()).unwrap()
  }

  #[test]
  fn maps_a_complete_record() {
    let snapshot = adapt(vec![record()]);
    assert!(snapshot.rejected.is_empty());

    let station = &snapshot.stations[0];
    assert_eq!(station.id, "1-16107");
    assert_eq!(station.code, "16107");
    assert_eq!(station.city_name.as_deref(), Some("Paris"));
    assert_eq!(station.city_code, 75056);
    assert_eq!(station.address, None);
    assert_eq!(station.longitude, 2.275725);
    assert_eq!(station.latitude, 48.865983);
    assert_eq!(station.status, Some(StationStatus::Open));
    assert_eq!(station.capacity, Some(35));
    assert_eq!(station.created_date, date());

    let statement = &snapshot.statements[0];
    assert_eq!(statement.station_id, "1-16107");
    assert_eq!(statement.bicycle_docks_available, Some(30));
    assert_eq!(statement.bicycle_available, Some(4));
    assert_eq!(
      statement.last_statement_date.map(|t| t.to_rfc3339()).as_deref(),
      Some("2024-10-19T09:12:05+00:00")
    );
  }

  #[test]
  fn boolean_installed_flag_is_normalised() {
    let mut open = record();
    open["is_installed"] = json!(true);
    let mut closed = record();
    closed["stationcode"] = json!("2");
    closed["is_installed"] = json!("NON");

    let snapshot = adapt(vec![open, closed]);
    assert_eq!(snapshot.stations[0].status, Some(StationStatus::Open));
    assert_eq!(snapshot.stations[1].status, Some(StationStatus::Closed));
  }

  #[test]
  fn unknown_status_is_kept_as_null() {
    let mut r = record();
    r["is_installed"] = json!("MAINTENANCE");
    let snapshot = adapt(vec![r]);
    assert_eq!(snapshot.stations[0].status, None);
    assert_eq!(snapshot.unknown_statuses[0].value, "MAINTENANCE");
    assert_eq!(snapshot.unknown_statuses[0].station_id, "1-16107");
  }

  #[test]
  fn record_without_coordinates_is_dropped() {
    let mut r = record();
    r["coordonnees_geo"] = Value::Null;
    let snapshot = adapt(vec![r, record()]);

    assert_eq!(snapshot.stations.len(), 1);
    assert_eq!(snapshot.statements.len(), 1);
    assert_eq!(snapshot.rejected, vec![MappingError::MissingField {
      index: 0,
      field: "coordonnees_geo.lon",
    }]);
  }

  #[test]
  fn record_without_code_is_dropped() {
    let mut r = record();
    r.as_object_mut().unwrap().remove("stationcode");
    let snapshot = adapt(vec![r]);
    assert!(snapshot.stations.is_empty());
    assert_eq!(snapshot.rejected[0].index(), 0);
  }

  #[test]
  fn optional_nulls_are_retained() {
    let mut r = record();
    for key in ["name", "capacity", "numbikesavailable", "duedate", "is_installed"] {
      r[key] = Value::Null;
    }
    let snapshot = adapt(vec![r]);

    assert!(snapshot.rejected.is_empty());
    let station = &snapshot.stations[0];
    assert_eq!(station.name, None);
    assert_eq!(station.capacity, None);
    assert_eq!(station.status, None);
    assert!(snapshot.unknown_statuses.is_empty());
    assert_eq!(snapshot.statements[0].bicycle_available, None);
    assert_eq!(snapshot.statements[0].last_statement_date, None);
  }

  #[test]
  fn missing_commune_code_is_unaffiliated() {
    let mut r = record();
    r["code_insee_commune"] = Value::Null;
    let snapshot = adapt(vec![r]);
    assert!(snapshot.stations[0].is_unaffiliated());
  }

  #[test]
  fn non_object_record_is_dropped() {
    let snapshot = adapt(vec![json!("garbage"), record()]);
    assert_eq!(snapshot.stations.len(), 1);
    assert_eq!(snapshot.rejected, vec![MappingError::NotAnObject { index: 0 }]);
  }
}
