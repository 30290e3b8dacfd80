//! Canonical station and station-statement records.
//!
//! Every station feed is mapped into these shapes before it reaches a store.
//! Optional fields stay `None` when the feed leaves them out.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::city::UNAFFILIATED_CITY_CODE;

/// Whether a station is in service. Source vocabularies (booleans,
/// `"OUI"`/`"NON"`, `"OPEN"`/`"CLOSE"`) are all translated into this.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum StationStatus {
  Open,
  Closed,
}

impl From<bool> for StationStatus {
  fn from(in_service: bool) -> Self {
    if in_service { Self::Open } else { Self::Closed }
  }
}

/// A station as seen by one source on one snapshot date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalStation {
  /// `"{source prefix}-{native code}"`; unique across sources.
  pub id:           String,
  /// The native code as published by the source.
  pub code:         String,
  pub name:         Option<String>,
  pub city_name:    Option<String>,
  /// Official municipal code, or [`UNAFFILIATED_CITY_CODE`].
  pub city_code:    i64,
  pub address:      Option<String>,
  pub longitude:    f64,
  pub latitude:     f64,
  pub status:       Option<StationStatus>,
  pub capacity:     Option<i64>,
  pub created_date: NaiveDate,
}

impl CanonicalStation {
  /// Whether this station could not be tied to a known city.
  pub fn is_unaffiliated(&self) -> bool {
    self.city_code == UNAFFILIATED_CITY_CODE
  }
}

/// An availability reading for one station on one snapshot date.
///
/// `station_id` is not required to match a consolidated station; dangling
/// statements are stored and simply never reach the fact table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalStationStatement {
  pub station_id:              String,
  pub bicycle_docks_available: Option<i64>,
  pub bicycle_available:       Option<i64>,
  pub last_statement_date:     Option<DateTime<Utc>>,
  pub created_date:            NaiveDate,
}
