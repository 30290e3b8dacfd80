//! Mapping shared by every station feed.
//!
//! Each feed describes where its fields live ([`StationFields`]) and how it
//! spells station status; the walk over records, the required-field policy,
//! and the id construction are common.

use chrono::NaiveDate;
use serde_json::Value;
use velo_core::{
  source::Source,
  station::{CanonicalStation, CanonicalStationStatement, StationStatus},
  MappingError,
};

use crate::{
  field::{self, Record},
  StationSnapshot, UnknownStatus,
};

/// Field paths of one station feed.
pub(crate) struct StationFields {
  pub code:           &'static str,
  pub name:           &'static str,
  pub city_name:      &'static str,
  /// `None` when the feed publishes no address.
  pub address:        Option<&'static str>,
  pub longitude:      &'static str,
  pub latitude:       &'static str,
  pub status:         &'static str,
  pub capacity:       &'static str,
  pub docks:          &'static str,
  pub bikes:          &'static str,
  pub last_statement: &'static str,
}

/// What a feed's status field said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StatusReading {
  Known(StationStatus),
  Unknown(String),
}

/// Map every record of a station feed.
///
/// `read_status` translates the feed's vocabulary; `city_code` derives the
/// municipal code from the record (feeds that need name resolution return
/// the sentinel here and fix it up afterwards).
pub(crate) fn map_records(
  source: Source,
  fields: &StationFields,
  records: Vec<Value>,
  date: NaiveDate,
  read_status: fn(&Value) -> StatusReading,
  city_code: impl Fn(&Record) -> i64,
) -> StationSnapshot {
  let mut snapshot = StationSnapshot::default();

  for (index, value) in records.into_iter().enumerate() {
    let Value::Object(record) = value else {
      snapshot.rejected.push(MappingError::NotAnObject { index });
      continue;
    };

    match map_one(source, fields, &record, index, date, &city_code) {
      Ok((mut station, statement)) => {
        if let Some(raw) = field::lookup(&record, fields.status) {
          match read_status(raw) {
            StatusReading::Known(status) => station.status = Some(status),
            StatusReading::Unknown(value) => snapshot.unknown_statuses.push(UnknownStatus {
              station_id: station.id.clone(),
              value,
            }),
          }
        }
        snapshot.stations.push(station);
        snapshot.statements.push(statement);
      }
      Err(e) => snapshot.rejected.push(e),
    }
  }

  snapshot
}

fn map_one(
  source: Source,
  fields: &StationFields,
  record: &Record,
  index: usize,
  date: NaiveDate,
  city_code: &impl Fn(&Record) -> i64,
) -> Result<(CanonicalStation, CanonicalStationStatement), MappingError> {
  let code = field::required(record, index, fields.code, field::text)?;
  let longitude = field::required(record, index, fields.longitude, field::float)?;
  let latitude = field::required(record, index, fields.latitude, field::float)?;
  let id = source.station_id(&code).ok_or(MappingError::InvalidField {
    index,
    field: fields.code,
    value: format!("{source} does not publish stations"),
  })?;

  let station = CanonicalStation {
    id:           id.clone(),
    code,
    name:         field::optional(record, fields.name, field::text),
    city_name:    field::optional(record, fields.city_name, field::text),
    city_code:    city_code(record),
    address:      fields
      .address
      .and_then(|path| field::optional(record, path, field::text)),
    longitude,
    latitude,
    status:       None,
    capacity:     field::optional(record, fields.capacity, field::integer),
    created_date: date,
  };

  let statement = CanonicalStationStatement {
    station_id:              id,
    bicycle_docks_available: field::optional(record, fields.docks, field::integer),
    bicycle_available:       field::optional(record, fields.bikes, field::integer),
    last_statement_date:     field::optional(
      record,
      fields.last_statement,
      field::timestamp,
    ),
    created_date:            date,
  };

  Ok((station, statement))
}
