//! Dimension and fact rows derived from the consolidated tables.
//!
//! These are never written by the consolidation step; the aggregation engine
//! recomputes them from the latest snapshot of each consolidated table.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  city::CanonicalCity,
  station::{CanonicalStation, StationStatus},
};

// ─── Dimensions ──────────────────────────────────────────────────────────────

/// Current descriptive attributes of a station (`DIM_STATION`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimStation {
  pub id:        String,
  pub code:      String,
  pub name:      Option<String>,
  pub address:   Option<String>,
  pub longitude: f64,
  pub latitude:  f64,
  pub status:    Option<StationStatus>,
  pub capacity:  Option<i64>,
}

impl From<CanonicalStation> for DimStation {
  fn from(s: CanonicalStation) -> Self {
    Self {
      id:        s.id,
      code:      s.code,
      name:      s.name,
      address:   s.address,
      longitude: s.longitude,
      latitude:  s.latitude,
      status:    s.status,
      capacity:  s.capacity,
    }
  }
}

/// Current descriptive attributes of a city (`DIM_CITY`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimCity {
  pub id:             i64,
  pub name:           Option<String>,
  pub nb_inhabitants: Option<i64>,
}

impl From<CanonicalCity> for DimCity {
  fn from(c: CanonicalCity) -> Self {
    Self { id: c.id, name: c.name, nb_inhabitants: c.nb_inhabitants }
  }
}

// ─── Fact ────────────────────────────────────────────────────────────────────

/// One availability measurement joined to its station and city
/// (`FACT_STATION_STATEMENT`).
///
/// `created_date` is the date of the aggregation run that produced the row,
/// not the date of the snapshots it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactStationStatement {
  pub station_id:              String,
  pub city_id:                 i64,
  pub bicycle_docks_available: Option<i64>,
  pub bicycle_available:       Option<i64>,
  pub last_statement_date:     Option<DateTime<Utc>>,
  pub created_date:            NaiveDate,
}
