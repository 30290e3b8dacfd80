//! Canonical city records from the municipal registry.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// City code given to stations whose city could not be resolved. Such
/// stations are kept in the station tables but never reach the fact table.
pub const UNAFFILIATED_CITY_CODE: i64 = 0;

/// A municipality as published by the registry on one snapshot date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalCity {
  /// Official municipal (INSEE) code.
  pub id:             i64,
  pub name:           Option<String>,
  pub nb_inhabitants: Option<i64>,
  pub created_date:   NaiveDate,
}
