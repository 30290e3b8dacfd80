//! Resolution of free-text city names to official municipal codes.
//!
//! Some feeds only publish a contract or commune name. The resolver matches
//! those names, case-insensitively, against a consolidated city snapshot and
//! falls back to [`UNAFFILIATED_CITY_CODE`] when nothing matches.

use std::collections::{BTreeMap, HashMap};

use crate::{
  city::{CanonicalCity, UNAFFILIATED_CITY_CODE},
  error::ResolutionWarning,
};

/// The outcome of resolving one city name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
  Resolved(i64),
  Unaffiliated,
}

impl Resolution {
  /// The code to persist on the station.
  pub fn city_code(self) -> i64 {
    match self {
      Self::Resolved(code) => code,
      Self::Unaffiliated => UNAFFILIATED_CITY_CODE,
    }
  }
}

/// Lookup table from normalised city name to municipal code.
#[derive(Debug, Clone, Default)]
pub struct CityResolver {
  by_name: HashMap<String, Candidate>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
  id:             i64,
  nb_inhabitants: Option<i64>,
}

impl Candidate {
  /// Homonymous communes: the most populated wins, then the smallest code.
  fn beats(&self, other: &Candidate) -> bool {
    match self.nb_inhabitants.cmp(&other.nb_inhabitants) {
      std::cmp::Ordering::Greater => true,
      std::cmp::Ordering::Less => false,
      std::cmp::Ordering::Equal => self.id < other.id,
    }
  }
}

fn normalise(name: &str) -> String { name.trim().to_lowercase() }

impl CityResolver {
  /// Build a resolver over one city snapshot. Cities without a name cannot
  /// be matched and are skipped.
  pub fn new<'a>(cities: impl IntoIterator<Item = &'a CanonicalCity>) -> Self {
    let mut by_name: HashMap<String, Candidate> = HashMap::new();
    for city in cities {
      let Some(name) = city.name.as_deref() else { continue };
      let candidate = Candidate { id: city.id, nb_inhabitants: city.nb_inhabitants };
      by_name
        .entry(normalise(name))
        .and_modify(|current| {
          if candidate.beats(current) {
            *current = candidate;
          }
        })
        .or_insert(candidate);
    }
    Self { by_name }
  }

  /// Number of distinct names the resolver can match.
  pub fn len(&self) -> usize { self.by_name.len() }

  pub fn is_empty(&self) -> bool { self.by_name.is_empty() }

  /// Resolve a single name.
  pub fn resolve(&self, name: &str) -> Resolution {
    self
      .by_name
      .get(&normalise(name))
      .map_or(Resolution::Unaffiliated, |c| Resolution::Resolved(c.id))
  }

  /// Resolve every distinct name of a batch once.
  ///
  /// `names` holds one entry per station (repetitions expected). Each
  /// distinct unresolved name yields a single warning carrying the number of
  /// stations affected.
  pub fn resolve_batch<'a>(
    &self,
    names: impl IntoIterator<Item = &'a str>,
  ) -> BatchResolution {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for name in names {
      *counts.entry(normalise(name)).or_default() += 1;
    }

    let mut codes = BTreeMap::new();
    let mut warnings = Vec::new();
    for (name, station_count) in counts {
      let resolution = self.resolve(&name);
      if resolution == Resolution::Unaffiliated {
        warnings.push(ResolutionWarning { city_name: name.clone(), station_count });
      }
      codes.insert(name, resolution);
    }

    BatchResolution { codes, warnings }
  }
}

/// Per-name resolutions for one adapter run.
#[derive(Debug, Clone, Default)]
pub struct BatchResolution {
  codes:        BTreeMap<String, Resolution>,
  pub warnings: Vec<ResolutionWarning>,
}

impl BatchResolution {
  /// The city code for a name that was part of the batch. Names outside the
  /// batch are reported as unaffiliated.
  pub fn city_code(&self, name: &str) -> i64 {
    self
      .codes
      .get(&normalise(name))
      .copied()
      .unwrap_or(Resolution::Unaffiliated)
      .city_code()
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn city(id: i64, name: &str, nb_inhabitants: Option<i64>) -> CanonicalCity {
    CanonicalCity {
      id,
      name: Some(name.into()),
      nb_inhabitants,
      created_date: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
    }
  }

  #[test]
  fn resolves_case_insensitively() {
    let cities = [city(31555, "Toulouse", Some(504_078))];
    let resolver = CityResolver::new(&cities);
    assert_eq!(resolver.resolve("toulouse"), Resolution::Resolved(31555));
    assert_eq!(resolver.resolve("  TOULOUSE "), Resolution::Resolved(31555));
  }

  #[test]
  fn unknown_name_is_unaffiliated() {
    let resolver = CityResolver::new(&[city(31555, "Toulouse", None)]);
    let r = resolver.resolve("unknown-city");
    assert_eq!(r, Resolution::Unaffiliated);
    assert_eq!(r.city_code(), UNAFFILIATED_CITY_CODE);
  }

  #[test]
  fn partial_names_do_not_match() {
    let resolver = CityResolver::new(&[city(31555, "Toulouse", None)]);
    assert_eq!(resolver.resolve("toul"), Resolution::Unaffiliated);
  }

  #[test]
  fn homonyms_prefer_most_populated_then_smallest_code() {
    let cities = [
      city(2, "Saint-Denis", Some(100)),
      city(93066, "Saint-Denis", Some(113_000)),
      city(1, "Saint-Denis", Some(100)),
      city(7, "Nowhere", None),
      city(5, "Nowhere", None),
    ];
    let resolver = CityResolver::new(&cities);
    assert_eq!(resolver.resolve("saint-denis"), Resolution::Resolved(93066));
    assert_eq!(resolver.resolve("nowhere"), Resolution::Resolved(5));
    assert_eq!(resolver.len(), 2);
  }

  #[test]
  fn batch_resolves_each_name_once_and_counts_stations() {
    let resolver = CityResolver::new(&[city(31555, "Toulouse", None)]);
    let batch = resolver.resolve_batch([
      "toulouse",
      "Toulouse",
      "unknown-city",
      "unknown-city",
      "UNKNOWN-CITY",
    ]);

    assert_eq!(batch.city_code("TOULOUSE"), 31555);
    assert_eq!(batch.city_code("unknown-city"), UNAFFILIATED_CITY_CODE);
    assert_eq!(batch.warnings, vec![ResolutionWarning {
      city_name:     "unknown-city".into(),
      station_count: 3,
    }]);
  }

  #[test]
  fn empty_registry_leaves_everything_unaffiliated() {
    let resolver = CityResolver::default();
    assert!(resolver.is_empty());
    let batch = resolver.resolve_batch(["toulouse"]);
    assert_eq!(batch.city_code("toulouse"), UNAFFILIATED_CITY_CODE);
    assert_eq!(batch.warnings.len(), 1);
  }
}
