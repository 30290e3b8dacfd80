//! The source registry and the on-disk layout of raw snapshots.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Every feed the pipeline knows how to consolidate.
///
/// The station feeds carry a fixed prefix that is prepended to their native
/// station codes, so that two cities using the same numbering never collide.
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
  EnumIter,
  EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Source {
  /// Velib' real-time availability (Paris open data).
  Paris,
  /// Velo Toulouse real-time availability (Toulouse Metropole open data).
  Toulouse,
  /// French municipal registry (geo.api.gouv.fr communes).
  CityRegistry,
}

impl Source {
  /// The station-id prefix for station feeds; `None` for the city registry.
  pub fn city_prefix(self) -> Option<u32> {
    match self {
      Self::Paris => Some(1),
      Self::Toulouse => Some(2),
      Self::CityRegistry => None,
    }
  }

  /// File name of the raw snapshot inside a dated directory.
  pub fn file_name(self) -> &'static str {
    match self {
      Self::Paris => "paris_realtime_bicycle_data.json",
      Self::Toulouse => "toulouse_realtime_bicycle_data.json",
      Self::CityRegistry => "city_data.json",
    }
  }

  /// Where the ingestion step downloads this source from unless configured
  /// otherwise.
  pub fn default_url(self) -> &'static str {
    match self {
      Self::Paris => {
        "https://opendata.paris.fr/api/explore/v2.1/catalog/datasets/velib-disponibilite-en-temps-reel/exports/json"
      }
      Self::Toulouse => {
        "https://data.toulouse-metropole.fr/api/explore/v2.1/catalog/datasets/api-velo-toulouse-temps-reel/exports/json"
      }
      Self::CityRegistry => "https://geo.api.gouv.fr/communes",
    }
  }

  /// Build the globally unique station id from a native station code.
  ///
  /// Returns `None` for the city registry, which has no stations.
  pub fn station_id(self, native_code: &str) -> Option<String> {
    self
      .city_prefix()
      .map(|prefix| format!("{prefix}-{native_code}"))
  }
}

/// Raw snapshots live at `{root}/{YYYY-MM-DD}/{file_name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotLayout {
  root: PathBuf,
}

impl SnapshotLayout {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  /// Directory holding every snapshot taken on `date`.
  pub fn day_dir(&self, date: NaiveDate) -> PathBuf {
    self.root.join(date.format("%Y-%m-%d").to_string())
  }

  /// Path of the raw snapshot of `source` taken on `date`.
  pub fn path(&self, source: Source, date: NaiveDate) -> PathBuf {
    self.day_dir(date).join(source.file_name())
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use strum::IntoEnumIterator;

  use super::*;

  #[test]
  fn station_prefixes_are_distinct() {
    let prefixes: Vec<u32> =
      Source::iter().filter_map(Source::city_prefix).collect();
    let mut deduped = prefixes.clone();
    deduped.sort_unstable();
    deduped.dedup();
    assert_eq!(prefixes.len(), deduped.len());
  }

  #[test]
  fn station_id_is_prefixed() {
    assert_eq!(Source::Paris.station_id("16107").as_deref(), Some("1-16107"));
    assert_eq!(Source::Toulouse.station_id("00003").as_deref(), Some("2-00003"));
    assert_eq!(Source::CityRegistry.station_id("1"), None);
  }

  #[test]
  fn names_round_trip_through_strum() {
    for source in Source::iter() {
      let name = source.to_string();
      assert_eq!(Source::from_str(&name).unwrap(), source);
    }
    assert_eq!(Source::CityRegistry.to_string(), "city-registry");
  }

  #[test]
  fn layout_uses_dated_directories() {
    let layout = SnapshotLayout::new("data/raw_data");
    let date = NaiveDate::from_ymd_opt(2024, 10, 19).unwrap();
    assert_eq!(
      layout.path(Source::CityRegistry, date),
      PathBuf::from("data/raw_data/2024-10-19/city_data.json")
    );
  }
}
