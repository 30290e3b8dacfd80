//! Derives the dimension and fact tables from the latest consolidated
//! snapshots.
//!
//! Dimensions are rebuilt from scratch on every run. Facts are stamped with
//! the run date and replace only the rows of that date, so a same-day rerun
//! overwrites and a later run appends.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};
use velo_core::{
  city::CanonicalCity,
  station::{CanonicalStation, CanonicalStationStatement},
  store::{AggregateStore, Table},
  warehouse::{DimCity, DimStation, FactStationStatement},
};

use crate::{
  error::{PipelineError, Result},
  summary::AggregationReport,
};

/// Recomputes `DIM_CITY`, `DIM_STATION` and `FACT_STATION_STATEMENT`.
#[derive(Debug)]
pub struct AggregationEngine<'s, S> {
  store: &'s S,
}

impl<'s, S: AggregateStore> AggregationEngine<'s, S> {
  pub fn new(store: &'s S) -> Self { Self { store } }

  /// Refresh every derived table, stamping facts with `run_date`.
  ///
  /// Empty consolidated tables yield empty derived tables; only store
  /// failures are errors.
  pub async fn run(&self, run_date: NaiveDate) -> Result<AggregationReport> {
    self.store.check_schema().await.map_err(PipelineError::store)?;

    let city_snapshot = self.latest(Table::ConsolidateCity).await?;
    let station_snapshot = self.latest(Table::ConsolidateStation).await?;
    let statement_snapshot = self.latest(Table::ConsolidateStationStatement).await?;

    let mut report = AggregationReport {
      run_date,
      station_snapshot,
      city_snapshot,
      statement_snapshot,
      dim_stations: 0,
      dim_cities: 0,
      facts: 0,
      tie_breaks: 0,
      excluded_unaffiliated: 0,
      missing_station: 0,
      missing_city: 0,
    };

    // DIM_CITY
    let cities = match city_snapshot {
      Some(d) => self.store.cities_on(d).await.map_err(PipelineError::store)?,
      None => Vec::new(),
    };
    let (cities, ties) = pick_one_per_key(cities, |c| c.id)?;
    report.tie_breaks += ties;
    report.dim_cities = self
      .store
      .replace_dim_cities(cities.iter().cloned().map(DimCity::from).collect())
      .await
      .map_err(PipelineError::store)?;

    // DIM_STATION
    let stations = match station_snapshot {
      Some(d) => self.store.stations_on(d).await.map_err(PipelineError::store)?,
      None => Vec::new(),
    };
    let (stations, ties) = pick_one_per_key(stations, |s| s.id.clone())?;
    report.tie_breaks += ties;
    report.dim_stations = self
      .store
      .replace_dim_stations(stations.iter().cloned().map(DimStation::from).collect())
      .await
      .map_err(PipelineError::store)?;

    // FACT_STATION_STATEMENT
    let statements = match statement_snapshot {
      Some(d) => self.store.statements_on(d).await.map_err(PipelineError::store)?,
      None => Vec::new(),
    };
    let (statements, ties) = pick_one_per_key(statements, |s| s.station_id.clone())?;
    report.tie_breaks += ties;

    let join = join_facts(&stations, &cities, statements, run_date);
    report.excluded_unaffiliated = join.excluded_unaffiliated;
    report.missing_station = join.missing_station;
    report.missing_city = join.missing_city;
    report.facts = self
      .store
      .replace_fact_snapshot(run_date, join.facts)
      .await
      .map_err(PipelineError::store)?;

    if report.tie_breaks > 0 {
      warn!(tie_breaks = report.tie_breaks, "duplicate keys in latest snapshots");
    }
    info!(
      %run_date,
      dim_cities = report.dim_cities,
      dim_stations = report.dim_stations,
      facts = report.facts,
      excluded_unaffiliated = report.excluded_unaffiliated,
      "aggregation complete"
    );
    Ok(report)
  }

  async fn latest(&self, table: Table) -> Result<Option<NaiveDate>> {
    let date = self
      .store
      .latest_snapshot_date(table, None)
      .await
      .map_err(PipelineError::store)?;
    debug!(%table, ?date, "latest snapshot");
    Ok(date)
  }
}

// ─── Pure helpers ────────────────────────────────────────────────────────────

/// Keep one row per key. When several rows share a key, the one whose
/// compact JSON serialisation sorts first wins. Returns the kept rows in key
/// order and the number of rows discarded.
pub fn pick_one_per_key<T, K, F>(rows: Vec<T>, key: F) -> Result<(Vec<T>, usize)>
where
  T: Serialize,
  K: Ord,
  F: Fn(&T) -> K,
{
  let mut kept: BTreeMap<K, (String, T)> = BTreeMap::new();
  let mut discarded = 0;

  for row in rows {
    let serialised = serde_json::to_string(&row).map_err(velo_core::Error::from)?;
    let k = key(&row);
    match kept.get(&k) {
      Some((best, _)) => {
        discarded += 1;
        if serialised < *best {
          kept.insert(k, (serialised, row));
        }
      }
      None => {
        kept.insert(k, (serialised, row));
      }
    }
  }

  Ok((kept.into_values().map(|(_, row)| row).collect(), discarded))
}

/// Fact rows built from one join, plus what the join left out.
#[derive(Debug, Default, PartialEq)]
pub struct FactJoin {
  pub facts:                 Vec<FactStationStatement>,
  pub excluded_unaffiliated: usize,
  pub missing_station:       usize,
  pub missing_city:          usize,
}

/// Inner-join statements to stations to cities. Stations carrying the
/// unaffiliated city code never produce a fact row.
pub fn join_facts(
  stations: &[CanonicalStation],
  cities: &[CanonicalCity],
  statements: Vec<CanonicalStationStatement>,
  run_date: NaiveDate,
) -> FactJoin {
  let stations: HashMap<&str, &CanonicalStation> =
    stations.iter().map(|s| (s.id.as_str(), s)).collect();
  let cities: HashSet<i64> = cities.iter().map(|c| c.id).collect();
  let mut join = FactJoin::default();

  for statement in statements {
    let Some(station) = stations.get(statement.station_id.as_str()) else {
      join.missing_station += 1;
      continue;
    };
    if station.is_unaffiliated() {
      join.excluded_unaffiliated += 1;
      continue;
    }
    if !cities.contains(&station.city_code) {
      join.missing_city += 1;
      continue;
    }

    join.facts.push(FactStationStatement {
      station_id:              statement.station_id,
      city_id:                 station.city_code,
      bicycle_docks_available: statement.bicycle_docks_available,
      bicycle_available:       statement.bicycle_available,
      last_statement_date:     statement.last_statement_date,
      created_date:            run_date,
    });
  }

  join
}
