//! End-to-end pipeline tests against an in-memory `SqliteStore`.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde_json::{json, Value};
use velo_core::{
  city::UNAFFILIATED_CITY_CODE,
  source::{SnapshotLayout, Source},
  station::StationStatus,
  store::{AggregateStore, ConsolidationStore, Table},
};
use velo_store_sqlite::SqliteStore;

use crate::{AggregationEngine, AggregationOutcome, Consolidator, Pipeline, SourceOutcome};

// ─── Fixtures ────────────────────────────────────────────────────────────────

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn day(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, 10, d).unwrap() }

/// A layout nothing has been written to.
fn empty_layout() -> SnapshotLayout {
  SnapshotLayout::new(std::env::temp_dir().join("velo-tests-nothing-here"))
}

fn cities() -> String {
  json!([
    { "nom": "Toulouse", "code": "31555", "population": 504078 },
    { "nom": "Paris", "code": "75056", "population": 2133111 }
  ])
  .to_string()
}

fn toulouse_record(number: &str, contract: &str, bikes: i64) -> Value {
  json!({
    "number": number,
    "contract_name": contract,
    "name": format!("{number} - STATION"),
    "address": "1 RUE DE METZ",
    "position": { "lon": 1.444, "lat": 43.604 },
    "status": "OPEN",
    "bike_stands": 15,
    "available_bike_stands": 15 - bikes,
    "available_bikes": bikes,
    "last_update": "2024-10-19T09:10:00+00:00"
  })
}

fn paris_record(code: &str, installed: Value) -> Value {
  json!({
    "stationcode": code,
    "name": "Benjamin Godard - Victor Hugo",
    "nom_arrondissement_communes": "Paris",
    "code_insee_commune": "75056",
    "coordonnees_geo": { "lon": 2.275725, "lat": 48.865983 },
    "is_installed": installed,
    "capacity": 35,
    "numdocksavailable": 30,
    "numbikesavailable": 5,
    "duedate": "2024-10-19T09:08:00+00:00"
  })
}

fn toulouse(records: Vec<Value>) -> String { Value::Array(records).to_string() }

fn paris(records: Vec<Value>) -> String { Value::Array(records).to_string() }

// ─── Consolidation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn toulouse_station_resolves_against_earlier_city_snapshot() {
  let s = store().await;
  let c = Consolidator::new(&s, empty_layout());

  c.consolidate_raw(Source::CityRegistry, &cities(), day(1)).await.unwrap();
  let report = c
    .consolidate_raw(
      Source::Toulouse,
      &toulouse(vec![
        toulouse_record("00003", "toulouse", 5),
        toulouse_record("00004", "unknown-city", 2),
      ]),
      day(2),
    )
    .await
    .unwrap();

  assert_eq!(report.stations, 2);
  assert_eq!(report.unresolved.len(), 1);
  assert_eq!(report.unresolved[0].city_name, "unknown-city");

  let stations = s.stations_on(day(2)).await.unwrap();
  let known = stations.iter().find(|st| st.id == "2-00003").unwrap();
  assert_eq!(known.city_code, 31555);
  assert_eq!(known.status, Some(StationStatus::Open));
  let unknown = stations.iter().find(|st| st.id == "2-00004").unwrap();
  assert_eq!(unknown.city_code, UNAFFILIATED_CITY_CODE);

  // Stage 3: aggregation.
  let agg = AggregationEngine::new(&s).run(day(2)).await.unwrap();
  assert_eq!(agg.city_snapshot, Some(day(1)));
  assert_eq!(agg.station_snapshot, Some(day(2)));
  assert_eq!(agg.excluded_unaffiliated, 1);

  let facts = s.facts_on(day(2)).await.unwrap();
  assert_eq!(facts.len(), 1);
  assert_eq!(facts[0].station_id, "2-00003");
  assert_eq!(facts[0].city_id, 31555);
  assert_eq!(facts[0].bicycle_available, Some(5));
  assert_eq!(facts[0].created_date, day(2));

  let dims: Vec<String> = s.dim_stations().await.unwrap().into_iter().map(|d| d.id).collect();
  assert_eq!(dims, vec!["2-00003".to_string(), "2-00004".to_string()]);
}

#[tokio::test]
async fn city_snapshot_after_the_station_date_is_not_used() {
  let s = store().await;
  let c = Consolidator::new(&s, empty_layout());

  c.consolidate_raw(Source::CityRegistry, &cities(), day(5)).await.unwrap();
  c.consolidate_raw(Source::Toulouse, &toulouse(vec![toulouse_record("1", "toulouse", 1)]), day(2))
    .await
    .unwrap();

  let stations = s.stations_on(day(2)).await.unwrap();
  assert_eq!(stations[0].city_code, UNAFFILIATED_CITY_CODE);
}

#[tokio::test]
async fn station_ids_are_unique_across_sources() {
  let s = store().await;
  let c = Consolidator::new(&s, empty_layout());

  c.consolidate_raw(Source::Paris, &paris(vec![paris_record("42", json!(true))]), day(1))
    .await
    .unwrap();
  c.consolidate_raw(Source::Toulouse, &toulouse(vec![toulouse_record("42", "toulouse", 1)]), day(1))
    .await
    .unwrap();

  let mut ids: Vec<String> = s.stations_on(day(1)).await.unwrap().into_iter().map(|st| st.id).collect();
  ids.sort();
  assert_eq!(ids, vec!["1-42".to_string(), "2-42".to_string()]);
}

#[tokio::test]
async fn installed_flag_and_open_literal_normalise_alike() {
  let s = store().await;
  let c = Consolidator::new(&s, empty_layout());

  c.consolidate_raw(
    Source::Paris,
    &paris(vec![paris_record("1", json!(true)), paris_record("2", json!("OUI"))]),
    day(1),
  )
  .await
  .unwrap();
  c.consolidate_raw(Source::Toulouse, &toulouse(vec![toulouse_record("1", "toulouse", 1)]), day(1))
    .await
    .unwrap();

  for station in s.stations_on(day(1)).await.unwrap() {
    assert_eq!(station.status, Some(StationStatus::Open), "{}", station.id);
  }
}

#[tokio::test]
async fn same_day_consolidation_is_idempotent() {
  let s = store().await;
  let c = Consolidator::new(&s, empty_layout());
  let raw = paris(vec![paris_record("1", json!(true)), paris_record("2", json!(false))]);

  c.consolidate_raw(Source::Paris, &raw, day(1)).await.unwrap();
  c.consolidate_raw(Source::Paris, &raw, day(1)).await.unwrap();

  assert_eq!(s.count_rows(Table::ConsolidateStation, Some(day(1))).await.unwrap(), 2);
  assert_eq!(
    s.count_rows(Table::ConsolidateStationStatement, Some(day(1)))
      .await
      .unwrap(),
    2
  );
}

#[tokio::test]
async fn next_day_leaves_previous_snapshot_untouched() {
  let s = store().await;
  let c = Consolidator::new(&s, empty_layout());

  c.consolidate_raw(Source::Paris, &paris(vec![paris_record("1", json!(true))]), day(1))
    .await
    .unwrap();
  let before = s.stations_on(day(1)).await.unwrap();

  c.consolidate_raw(Source::Paris, &paris(vec![paris_record("1", json!(false))]), day(2))
    .await
    .unwrap();

  assert_eq!(s.stations_on(day(1)).await.unwrap(), before);
  assert_eq!(
    s.stations_on(day(2)).await.unwrap()[0].status,
    Some(StationStatus::Closed)
  );
}

#[tokio::test]
async fn unusable_records_are_reported_not_fatal() {
  let s = store().await;
  let c = Consolidator::new(&s, empty_layout());
  let mut no_coords = paris_record("2", json!(true));
  no_coords["coordonnees_geo"] = Value::Null;

  let report = c
    .consolidate_raw(
      Source::Paris,
      &paris(vec![paris_record("1", json!(true)), no_coords, json!("junk")]),
      day(1),
    )
    .await
    .unwrap();

  assert_eq!(report.stations, 1);
  assert_eq!(report.statements, 1);
  assert_eq!(report.rejected.len(), 2);
}

#[tokio::test]
async fn malformed_payload_fails_the_source() {
  let s = store().await;
  let err = Consolidator::new(&s, empty_layout())
    .consolidate_raw(Source::Paris, "{\"results\": []}", day(1))
    .await
    .unwrap_err();
  assert!(err.is_ingestion(), "{err}");
}

#[tokio::test]
async fn missing_snapshot_file_fails_the_source() {
  let s = store().await;
  let err = Consolidator::new(&s, empty_layout())
    .consolidate_file(Source::Toulouse, day(1))
    .await
    .unwrap_err();
  assert!(err.is_ingestion(), "{err}");
  assert!(err.to_string().contains(Source::Toulouse.file_name()), "{err}");
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn aggregation_over_empty_tables_is_empty() {
  let s = store().await;
  let report = AggregationEngine::new(&s).run(day(1)).await.unwrap();
  assert_eq!(report.facts, 0);
  assert_eq!(report.dim_stations, 0);
  assert_eq!(report.station_snapshot, None);
  assert!(s.facts_on(day(1)).await.unwrap().is_empty());
}

#[tokio::test]
async fn first_run_without_cities_yields_no_facts() {
  let s = store().await;
  Consolidator::new(&s, empty_layout())
    .consolidate_raw(Source::Paris, &paris(vec![paris_record("1", json!(true))]), day(1))
    .await
    .unwrap();

  let report = AggregationEngine::new(&s).run(day(1)).await.unwrap();
  assert_eq!(report.dim_stations, 1);
  assert_eq!(report.facts, 0);
  assert_eq!(report.missing_city, 1);
}

#[tokio::test]
async fn dim_station_reflects_only_the_latest_snapshot() {
  let s = store().await;
  let c = Consolidator::new(&s, empty_layout());

  c.consolidate_raw(
    Source::Paris,
    &paris(vec![paris_record("1", json!(true)), paris_record("2", json!(true))]),
    day(1),
  )
  .await
  .unwrap();
  c.consolidate_raw(Source::Paris, &paris(vec![paris_record("3", json!(false))]), day(2))
    .await
    .unwrap();

  AggregationEngine::new(&s).run(day(2)).await.unwrap();
  let dims = s.dim_stations().await.unwrap();
  assert_eq!(dims.len(), 1);
  assert_eq!(dims[0].id, "1-3");
  assert_eq!(dims[0].status, Some(StationStatus::Closed));
}

#[tokio::test]
async fn dim_city_reflects_only_the_latest_snapshot() {
  let s = store().await;
  let c = Consolidator::new(&s, empty_layout());

  c.consolidate_raw(Source::CityRegistry, &cities(), day(1)).await.unwrap();
  let later = json!([
    { "nom": "Toulouse", "code": "31555", "population": 511684 },
    { "nom": "Lyon", "code": "69123", "population": 522250 }
  ]);
  c.consolidate_raw(Source::CityRegistry, &later.to_string(), day(2))
    .await
    .unwrap();

  let report = AggregationEngine::new(&s).run(day(2)).await.unwrap();
  assert_eq!(report.city_snapshot, Some(day(2)));

  let dims = s.dim_cities().await.unwrap();
  let ids: Vec<i64> = dims.iter().map(|c| c.id).collect();
  assert_eq!(ids, vec![31555, 69123]);
  assert_eq!(dims[0].nb_inhabitants, Some(511_684));
}

#[tokio::test]
async fn facts_are_overwritten_same_day_and_appended_next_day() {
  let s = store().await;
  let c = Consolidator::new(&s, empty_layout());
  let engine = AggregationEngine::new(&s);

  c.consolidate_raw(Source::CityRegistry, &cities(), day(1)).await.unwrap();
  c.consolidate_raw(Source::Paris, &paris(vec![paris_record("1", json!(true))]), day(1))
    .await
    .unwrap();

  engine.run(day(1)).await.unwrap();
  engine.run(day(1)).await.unwrap();
  assert_eq!(s.facts_on(day(1)).await.unwrap().len(), 1);

  engine.run(day(2)).await.unwrap();
  assert_eq!(s.facts_on(day(1)).await.unwrap().len(), 1);
  assert_eq!(s.facts_on(day(2)).await.unwrap().len(), 1);
  assert_eq!(s.count_rows(Table::FactStationStatement, None).await.unwrap(), 2);
}

#[tokio::test]
async fn unaffiliated_stations_never_reach_the_fact_table() {
  let s = store().await;
  let c = Consolidator::new(&s, empty_layout());
  let mut orphan = paris_record("9", json!(true));
  orphan["code_insee_commune"] = Value::Null;

  c.consolidate_raw(Source::CityRegistry, &cities(), day(1)).await.unwrap();
  c.consolidate_raw(Source::Paris, &paris(vec![paris_record("1", json!(true)), orphan]), day(1))
    .await
    .unwrap();
  c.consolidate_raw(
    Source::Toulouse,
    &toulouse(vec![toulouse_record("7", "nowhere", 3)]),
    day(1),
  )
  .await
  .unwrap();

  AggregationEngine::new(&s).run(day(1)).await.unwrap();

  let unaffiliated: Vec<String> = s
    .stations_on(day(1))
    .await
    .unwrap()
    .into_iter()
    .filter(|st| st.is_unaffiliated())
    .map(|st| st.id)
    .collect();
  assert_eq!(unaffiliated.len(), 2);

  let facts = s.facts_on(day(1)).await.unwrap();
  assert!(facts.iter().all(|f| !unaffiliated.contains(&f.station_id)));
  assert!(facts.iter().all(|f| f.city_id != UNAFFILIATED_CITY_CODE));
  assert_eq!(facts.len(), 1);
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_schema_aborts_every_stage() {
  let s = SqliteStore::connect_in_memory().await.unwrap();

  let err = Consolidator::new(&s, empty_layout())
    .consolidate_raw(Source::CityRegistry, &cities(), day(1))
    .await
    .unwrap_err();
  let store_err = err.store_error::<velo_store_sqlite::Error>().expect("store error");
  assert!(store_err.is_schema(), "{store_err}");

  let err = AggregationEngine::new(&s).run(day(1)).await.unwrap_err();
  assert!(err
    .store_error::<velo_store_sqlite::Error>()
    .is_some_and(velo_store_sqlite::Error::is_schema));
}

// ─── Full run ────────────────────────────────────────────────────────────────

async fn write_snapshot(layout: &SnapshotLayout, source: Source, date: NaiveDate, raw: &str) {
  let path = layout.path(source, date);
  tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
  tokio::fs::write(path, raw).await.unwrap();
}

fn scratch_dir(name: &str) -> PathBuf {
  std::env::temp_dir().join(format!("velo-pipeline-{name}-{}", std::process::id()))
}

#[tokio::test]
async fn failed_source_does_not_block_the_others() {
  let root = scratch_dir("partial");
  let _ = tokio::fs::remove_dir_all(&root).await;
  let layout = SnapshotLayout::new(&root);

  // Toulouse has no snapshot on disk.
  write_snapshot(&layout, Source::CityRegistry, day(3), &cities()).await;
  write_snapshot(&layout, Source::Paris, day(3), &paris(vec![paris_record("1", json!(true))]))
    .await;

  let s = store().await;
  let pipeline = Pipeline::new(&s, layout);
  let summary = pipeline
    .run(&[Source::Paris, Source::Toulouse, Source::CityRegistry], day(3))
    .await;

  let order: Vec<Source> = summary
    .sources
    .iter()
    .map(|o| match o {
      SourceOutcome::Consolidated(r) => r.source,
      SourceOutcome::Failed { source, .. } => *source,
    })
    .collect();
  assert_eq!(order, vec![Source::CityRegistry, Source::Paris, Source::Toulouse]);
  assert!(!summary.is_success());
  assert_eq!(summary.failures().count(), 1);
  assert!(summary.report_for(Source::Paris).is_some());

  let Some(AggregationOutcome::Completed(agg)) = &summary.aggregation else {
    panic!("aggregation should run: {:?}", summary.aggregation);
  };
  assert_eq!(agg.facts, 1);
  assert_eq!(s.facts_on(day(3)).await.unwrap()[0].station_id, "1-1");

  let json = serde_json::to_value(&summary).unwrap();
  assert_eq!(json["sources"][2]["outcome"], "failed");
  assert_eq!(json["aggregation"]["outcome"], "completed");

  tokio::fs::remove_dir_all(&root).await.unwrap();
}

#[tokio::test]
async fn complete_run_succeeds() {
  let root = scratch_dir("complete");
  let _ = tokio::fs::remove_dir_all(&root).await;
  let layout = SnapshotLayout::new(&root);

  write_snapshot(&layout, Source::CityRegistry, day(4), &cities()).await;
  write_snapshot(&layout, Source::Paris, day(4), &paris(vec![paris_record("1", json!(1))])).await;
  write_snapshot(
    &layout,
    Source::Toulouse,
    day(4),
    &toulouse(vec![toulouse_record("00003", "Toulouse", 4)]),
  )
  .await;

  let s = store().await;
  let summary = Pipeline::new(&s, layout)
    .run(&[Source::Paris, Source::Toulouse, Source::CityRegistry], day(4))
    .await;

  assert!(summary.is_success(), "{:?}", summary.failures().collect::<Vec<_>>());
  let agg = summary.aggregation_report().unwrap();
  assert_eq!(agg.facts, 2);
  assert_eq!(agg.dim_cities, 2);
  assert_eq!(agg.tie_breaks, 0);

  tokio::fs::remove_dir_all(&root).await.unwrap();
}
