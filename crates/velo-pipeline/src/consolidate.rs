//! Per-source consolidation: raw snapshot → adapter → consolidated tables.

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use velo_core::{
  resolver::CityResolver,
  source::{SnapshotLayout, Source},
  store::{ConsolidationStore, Table},
};
use velo_feeds::{CityRegistryFeed, ParisFeed, SourceAdapter, StationSnapshot, ToulouseFeed};

use crate::{
  error::{PipelineError, Result},
  summary::SourceReport,
};

/// Consolidates the saved snapshots of one date into a store.
#[derive(Debug)]
pub struct Consolidator<'s, S> {
  store:  &'s S,
  layout: SnapshotLayout,
}

impl<'s, S: ConsolidationStore> Consolidator<'s, S> {
  pub fn new(store: &'s S, layout: SnapshotLayout) -> Self { Self { store, layout } }

  /// Read `source`'s snapshot for `date` from the layout and consolidate it.
  pub async fn consolidate_file(&self, source: Source, date: NaiveDate) -> Result<SourceReport> {
    let path = self.layout.path(source, date);
    debug!(%source, path = %path.display(), "reading raw snapshot");
    let raw = tokio::fs::read_to_string(&path)
      .await
      .map_err(|e| PipelineError::Ingestion { feed: source, path, source: e })?;
    self.consolidate_raw(source, &raw, date).await
  }

  /// Consolidate an in-memory raw snapshot of `source` taken on `date`.
  pub async fn consolidate_raw(
    &self,
    source: Source,
    raw: &str,
    date: NaiveDate,
  ) -> Result<SourceReport> {
    self.store.check_schema().await.map_err(PipelineError::store)?;

    let report = match source {
      Source::CityRegistry => self.consolidate_cities(raw, date).await?,
      Source::Paris => {
        let snapshot = ParisFeed.adapt(raw, date)?;
        self.write_stations(source, snapshot, date).await?
      }
      Source::Toulouse => {
        let resolver = self.resolver_for(date).await?;
        let snapshot = ToulouseFeed::new(&resolver).adapt(raw, date)?;
        self.write_stations(source, snapshot, date).await?
      }
    };

    for rejected in &report.rejected {
      warn!(%source, %rejected, "record dropped");
    }
    for unresolved in &report.unresolved {
      warn!(%source, %unresolved, "city not resolved");
    }
    for unknown in &report.unknown_statuses {
      warn!(%source, station = %unknown.station_id, value = %unknown.value, "unknown status");
    }
    info!(
      %source,
      %date,
      stations = report.stations,
      statements = report.statements,
      cities = report.cities,
      rejected = report.rejected.len(),
      "source consolidated"
    );
    Ok(report)
  }

  /// A resolver over the latest city snapshot taken on or before `date`.
  /// Empty when no city snapshot exists yet.
  pub async fn resolver_for(&self, date: NaiveDate) -> Result<CityResolver> {
    let latest = self
      .store
      .latest_snapshot_date(Table::ConsolidateCity, Some(date))
      .await
      .map_err(PipelineError::store)?;

    let Some(city_date) = latest else {
      warn!(%date, "no city snapshot available, every city will be unaffiliated");
      return Ok(CityResolver::default());
    };
    let cities = self.store.cities_on(city_date).await.map_err(PipelineError::store)?;
    debug!(%city_date, cities = cities.len(), "city resolver loaded");
    Ok(CityResolver::new(&cities))
  }

  async fn consolidate_cities(&self, raw: &str, date: NaiveDate) -> Result<SourceReport> {
    let snapshot = CityRegistryFeed.adapt(raw, date)?;
    let mut report = SourceReport::new(Source::CityRegistry, date);
    report.duplicates = snapshot.duplicates;
    report.rejected = snapshot.rejected;
    report.cities = self
      .store
      .upsert_cities(snapshot.cities)
      .await
      .map_err(PipelineError::store)?;
    Ok(report)
  }

  async fn write_stations(
    &self,
    source: Source,
    snapshot: StationSnapshot,
    date: NaiveDate,
  ) -> Result<SourceReport> {
    let mut report = SourceReport::new(source, date);
    report.rejected = snapshot.rejected;
    report.unresolved = snapshot.unresolved;
    report.unknown_statuses = snapshot.unknown_statuses;

    (report.stations, report.statements) = self
      .store
      .upsert_station_snapshot(snapshot.stations, snapshot.statements)
      .await
      .map_err(PipelineError::store)?;
    Ok(report)
  }
}
