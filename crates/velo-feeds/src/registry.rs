//! Municipal registry feed (geo.api.gouv.fr `communes`).

use std::collections::HashSet;

use chrono::NaiveDate;
use serde_json::Value;
use velo_core::{city::CanonicalCity, source::Source, MappingError, Result};

use crate::{field, parse_records, CitySnapshot, SourceAdapter};

/// Adapter for the city registry.
///
/// Codes must be numeric: the few alphanumeric codes (Corsican communes such
/// as `2A004`) are rejected as invalid id fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct CityRegistryFeed;

impl SourceAdapter for CityRegistryFeed {
  type Snapshot = CitySnapshot;

  fn adapt(&self, raw: &str, date: NaiveDate) -> Result<CitySnapshot> {
    let records = parse_records(Source::CityRegistry, raw)?;
    let mut snapshot = CitySnapshot::default();
    let mut seen = HashSet::new();

    for (index, value) in records.into_iter().enumerate() {
      let Value::Object(record) = value else {
        snapshot.rejected.push(MappingError::NotAnObject { index });
        continue;
      };

      let id = match field::required(&record, index, "code", field::integer) {
        Ok(id) => id,
        Err(e) => {
          snapshot.rejected.push(e);
          continue;
        }
      };

      if !seen.insert(id) {
        snapshot.duplicates += 1;
        continue;
      }

      snapshot.cities.push(CanonicalCity {
        id,
        name: field::optional(&record, "nom", field::text),
        nb_inhabitants: field::optional(&record, "population", field::integer),
        created_date: date,
      });
    }

    Ok(snapshot)
  }
}
