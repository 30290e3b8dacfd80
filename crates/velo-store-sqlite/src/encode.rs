//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Snapshot dates are stored as `YYYY-MM-DD` strings, so that lexical order
//! is chronological and `MAX(created_date)` picks the latest snapshot.
//! Timestamps are stored as RFC 3339 UTC strings; station status as its
//! canonical uppercase literal.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use velo_core::{
  city::CanonicalCity,
  station::{CanonicalStation, CanonicalStationStatement, StationStatus},
  warehouse::{DimStation, FactStationStatement},
};

use crate::{Error, Result};

// ─── NaiveDate ───────────────────────────────────────────────────────────────

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::Decode(format!("invalid date {s:?}: {e}")))
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("invalid timestamp {s:?}: {e}")))
}

// ─── StationStatus ───────────────────────────────────────────────────────────

pub fn encode_status(s: StationStatus) -> String { s.to_string() }

pub fn decode_status(s: &str) -> Result<StationStatus> {
  StationStatus::from_str(s).map_err(|_| Error::Decode(format!("unknown station status: {s:?}")))
}

fn decode_opt<T>(s: Option<String>, decode: fn(&str) -> Result<T>) -> Result<Option<T>> {
  s.as_deref().map(decode).transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column values of a `CONSOLIDATE_STATION` row.
pub struct RawStation {
  pub id:           String,
  pub code:         String,
  pub name:         Option<String>,
  pub city_name:    Option<String>,
  pub city_code:    i64,
  pub address:      Option<String>,
  pub longitude:    f64,
  pub latitude:     f64,
  pub status:       Option<String>,
  pub capacity:     Option<i64>,
  pub created_date: String,
}

impl From<CanonicalStation> for RawStation {
  fn from(s: CanonicalStation) -> Self {
    Self {
      id:           s.id,
      code:         s.code,
      name:         s.name,
      city_name:    s.city_name,
      city_code:    s.city_code,
      address:      s.address,
      longitude:    s.longitude,
      latitude:     s.latitude,
      status:       s.status.map(encode_status),
      capacity:     s.capacity,
      created_date: encode_date(s.created_date),
    }
  }
}

impl RawStation {
  pub fn into_station(self) -> Result<CanonicalStation> {
    Ok(CanonicalStation {
      id:           self.id,
      code:         self.code,
      name:         self.name,
      city_name:    self.city_name,
      city_code:    self.city_code,
      address:      self.address,
      longitude:    self.longitude,
      latitude:     self.latitude,
      status:       decode_opt(self.status, decode_status)?,
      capacity:     self.capacity,
      created_date: decode_date(&self.created_date)?,
    })
  }
}

/// Column values of a `CONSOLIDATE_CITY` row.
pub struct RawCity {
  pub id:             i64,
  pub name:           Option<String>,
  pub nb_inhabitants: Option<i64>,
  pub created_date:   String,
}

impl From<CanonicalCity> for RawCity {
  fn from(c: CanonicalCity) -> Self {
    Self {
      id:             c.id,
      name:           c.name,
      nb_inhabitants: c.nb_inhabitants,
      created_date:   encode_date(c.created_date),
    }
  }
}

impl RawCity {
  pub fn into_city(self) -> Result<CanonicalCity> {
    Ok(CanonicalCity {
      id:             self.id,
      name:           self.name,
      nb_inhabitants: self.nb_inhabitants,
      created_date:   decode_date(&self.created_date)?,
    })
  }
}

/// Column values of a `CONSOLIDATE_STATION_STATEMENT` row. Also used for
/// fact rows, which add `city_id`.
pub struct RawStatement {
  pub station_id:              String,
  pub city_id:                 Option<i64>,
  pub bicycle_docks_available: Option<i64>,
  pub bicycle_available:       Option<i64>,
  pub last_statement_date:     Option<String>,
  pub created_date:            String,
}

impl From<CanonicalStationStatement> for RawStatement {
  fn from(s: CanonicalStationStatement) -> Self {
    Self {
      station_id:              s.station_id,
      city_id:                 None,
      bicycle_docks_available: s.bicycle_docks_available,
      bicycle_available:       s.bicycle_available,
      last_statement_date:     s.last_statement_date.map(encode_dt),
      created_date:            encode_date(s.created_date),
    }
  }
}

impl From<FactStationStatement> for RawStatement {
  fn from(f: FactStationStatement) -> Self {
    Self {
      station_id:              f.station_id,
      city_id:                 Some(f.city_id),
      bicycle_docks_available: f.bicycle_docks_available,
      bicycle_available:       f.bicycle_available,
      last_statement_date:     f.last_statement_date.map(encode_dt),
      created_date:            encode_date(f.created_date),
    }
  }
}

impl RawStatement {
  pub fn into_statement(self) -> Result<CanonicalStationStatement> {
    Ok(CanonicalStationStatement {
      station_id:              self.station_id,
      bicycle_docks_available: self.bicycle_docks_available,
      bicycle_available:       self.bicycle_available,
      last_statement_date:     decode_opt(self.last_statement_date, decode_dt)?,
      created_date:            decode_date(&self.created_date)?,
    })
  }

  pub fn into_fact(self) -> Result<FactStationStatement> {
    let city_id = self
      .city_id
      .ok_or_else(|| Error::Decode(format!("fact row {} has no city_id", self.station_id)))?;
    Ok(FactStationStatement {
      station_id: self.station_id,
      city_id,
      bicycle_docks_available: self.bicycle_docks_available,
      bicycle_available: self.bicycle_available,
      last_statement_date: decode_opt(self.last_statement_date, decode_dt)?,
      created_date: decode_date(&self.created_date)?,
    })
  }
}

/// Column values of a `DIM_STATION` row.
pub struct RawDimStation {
  pub id:        String,
  pub code:      String,
  pub name:      Option<String>,
  pub address:   Option<String>,
  pub longitude: f64,
  pub latitude:  f64,
  pub status:    Option<String>,
  pub capacity:  Option<i64>,
}

impl From<DimStation> for RawDimStation {
  fn from(s: DimStation) -> Self {
    Self {
      id:        s.id,
      code:      s.code,
      name:      s.name,
      address:   s.address,
      longitude: s.longitude,
      latitude:  s.latitude,
      status:    s.status.map(encode_status),
      capacity:  s.capacity,
    }
  }
}

impl RawDimStation {
  pub fn into_dim(self) -> Result<DimStation> {
    Ok(DimStation {
      id:        self.id,
      code:      self.code,
      name:      self.name,
      address:   self.address,
      longitude: self.longitude,
      latitude:  self.latitude,
      status:    decode_opt(self.status, decode_status)?,
      capacity:  self.capacity,
    })
  }
}
