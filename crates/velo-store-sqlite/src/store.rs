//! [`SqliteStore`], the SQLite implementation of [`ConsolidationStore`] and
//! [`AggregateStore`].

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::OptionalExtension as _;
use velo_core::{
  city::CanonicalCity,
  station::{CanonicalStation, CanonicalStationStatement},
  store::{AggregateStore, ConsolidationStore, Table},
  warehouse::{DimCity, DimStation, FactStationStatement},
};

use crate::{
  encode::{
    decode_date, encode_date, RawCity, RawDimStation, RawStation, RawStatement,
  },
  error::classify,
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Velo warehouse backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted. The store
/// expects a single writer: two pipeline runs against the same file are not
/// coordinated.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and bootstrap the schema.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let store = Self::connect(path).await?;
    store.bootstrap().await?;
    Ok(store)
  }

  /// Open an in-memory store with the schema bootstrapped, for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let store = Self::connect_in_memory().await?;
    store.bootstrap().await?;
    Ok(store)
  }

  /// Open a store at `path` without touching its schema.
  pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Ok(Self { conn })
  }

  /// Open an empty in-memory store without any table.
  pub async fn connect_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Ok(Self { conn })
  }

  /// Create all six tables if they do not exist yet.
  pub async fn bootstrap(&self) -> Result<()> {
    self
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
  }

  /// Run `function` on the connection thread, classifying failures.
  async fn call<F, R>(&self, function: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection) -> tokio_rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    self.conn.call(function).await.map_err(classify)
  }
}

/// Tables carrying a `created_date` column.
fn require_dated(table: Table) -> Result<()> {
  match table {
    Table::DimStation | Table::DimCity => {
      Err(Error::Schema(format!("{table} has no created_date column")))
    }
    _ => Ok(()),
  }
}

/// `ON CONFLICT` target of an upsert into `table`: its natural key.
fn conflict_target(table: Table) -> String { table.natural_key().join(", ") }

fn insert_stations(
  tx: &rusqlite::Transaction<'_>,
  rows: &[RawStation],
) -> rusqlite::Result<usize> {
  let mut stmt = tx.prepare(&format!(
    "INSERT INTO {table} (
       id, code, name, city_name, city_code, address,
       longitude, latitude, status, capacity, created_date
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
     ON CONFLICT ({key}) DO UPDATE SET
       code      = excluded.code,
       name      = excluded.name,
       city_name = excluded.city_name,
       city_code = excluded.city_code,
       address   = excluded.address,
       longitude = excluded.longitude,
       latitude  = excluded.latitude,
       status    = excluded.status,
       capacity  = excluded.capacity",
    table = Table::ConsolidateStation,
    key = conflict_target(Table::ConsolidateStation),
  ))?;
  for r in rows {
    stmt.execute(rusqlite::params![
      r.id,
      r.code,
      r.name,
      r.city_name,
      r.city_code,
      r.address,
      r.longitude,
      r.latitude,
      r.status,
      r.capacity,
      r.created_date,
    ])?;
  }
  Ok(rows.len())
}

fn insert_statements(
  tx: &rusqlite::Transaction<'_>,
  rows: &[RawStatement],
) -> rusqlite::Result<usize> {
  let mut stmt = tx.prepare(&format!(
    "INSERT INTO {table} (
       station_id, bicycle_docks_available, bicycle_available,
       last_statement_date, created_date
     ) VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT ({key}) DO UPDATE SET
       bicycle_docks_available = excluded.bicycle_docks_available,
       bicycle_available       = excluded.bicycle_available,
       last_statement_date     = excluded.last_statement_date",
    table = Table::ConsolidateStationStatement,
    key = conflict_target(Table::ConsolidateStationStatement),
  ))?;
  for r in rows {
    stmt.execute(rusqlite::params![
      r.station_id,
      r.bicycle_docks_available,
      r.bicycle_available,
      r.last_statement_date,
      r.created_date,
    ])?;
  }
  Ok(rows.len())
}

fn read_station(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawStation> {
  Ok(RawStation {
    id:           row.get(0)?,
    code:         row.get(1)?,
    name:         row.get(2)?,
    city_name:    row.get(3)?,
    city_code:    row.get(4)?,
    address:      row.get(5)?,
    longitude:    row.get(6)?,
    latitude:     row.get(7)?,
    status:       row.get(8)?,
    capacity:     row.get(9)?,
    created_date: row.get(10)?,
  })
}

fn read_statement(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawStatement> {
  Ok(RawStatement {
    station_id:              row.get(0)?,
    city_id:                 row.get(1)?,
    bicycle_docks_available: row.get(2)?,
    bicycle_available:       row.get(3)?,
    last_statement_date:     row.get(4)?,
    created_date:            row.get(5)?,
  })
}

// ─── ConsolidationStore impl ─────────────────────────────────────────────────

impl ConsolidationStore for SqliteStore {
  type Error = Error;

  async fn check_schema(&self) -> Result<()> {
    let missing: Option<&'static str> = self
      .call(|conn| {
        let mut stmt = conn
          .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
        for table in [
          Table::ConsolidateStation,
          Table::ConsolidateCity,
          Table::ConsolidateStationStatement,
          Table::DimStation,
          Table::DimCity,
          Table::FactStationStatement,
        ] {
          let found = stmt
            .query_row(rusqlite::params![table.name()], |_| Ok(()))
            .optional()?;
          if found.is_none() {
            return Ok(Some(table.name()));
          }
        }
        Ok(None)
      })
      .await?;

    match missing {
      Some(name) => Err(Error::Schema(format!("missing table {name}"))),
      None => Ok(()),
    }
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn upsert_stations(&self, records: Vec<CanonicalStation>) -> Result<usize> {
    let rows: Vec<RawStation> = records.into_iter().map(RawStation::from).collect();

    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let written = insert_stations(&tx, &rows)?;
        tx.commit()?;
        Ok(written)
      })
      .await
  }

  async fn upsert_cities(&self, records: Vec<CanonicalCity>) -> Result<usize> {
    let rows: Vec<RawCity> = records.into_iter().map(RawCity::from).collect();

    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(&format!(
            "INSERT INTO {table} (id, name, nb_inhabitants, created_date)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT ({key}) DO UPDATE SET
               name           = excluded.name,
               nb_inhabitants = excluded.nb_inhabitants",
            table = Table::ConsolidateCity,
            key = conflict_target(Table::ConsolidateCity),
          ))?;
          for r in &rows {
            stmt.execute(rusqlite::params![r.id, r.name, r.nb_inhabitants, r.created_date])?;
          }
        }
        tx.commit()?;
        Ok(rows.len())
      })
      .await
  }

  async fn upsert_statements(
    &self,
    records: Vec<CanonicalStationStatement>,
  ) -> Result<usize> {
    let rows: Vec<RawStatement> = records.into_iter().map(RawStatement::from).collect();

    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let written = insert_statements(&tx, &rows)?;
        tx.commit()?;
        Ok(written)
      })
      .await
  }

  async fn upsert_station_snapshot(
    &self,
    stations: Vec<CanonicalStation>,
    statements: Vec<CanonicalStationStatement>,
  ) -> Result<(usize, usize)> {
    let stations: Vec<RawStation> = stations.into_iter().map(RawStation::from).collect();
    let statements: Vec<RawStatement> = statements.into_iter().map(RawStatement::from).collect();

    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let written = (insert_stations(&tx, &stations)?, insert_statements(&tx, &statements)?);
        tx.commit()?;
        Ok(written)
      })
      .await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn latest_snapshot_date(
    &self,
    table: Table,
    as_of: Option<NaiveDate>,
  ) -> Result<Option<NaiveDate>> {
    require_dated(table)?;
    // Table names come from the closed `Table` enum; values stay bound.
    let sql = format!(
      "SELECT MAX(created_date) FROM {} WHERE ?1 IS NULL OR created_date <= ?1",
      table.name()
    );
    let as_of_str = as_of.map(encode_date);

    let latest: Option<String> = self
      .call(move |conn| {
        Ok(conn.query_row(&sql, rusqlite::params![as_of_str], |row| row.get(0))?)
      })
      .await?;

    latest.as_deref().map(decode_date).transpose()
  }

  async fn stations_on(&self, date: NaiveDate) -> Result<Vec<CanonicalStation>> {
    let date_str = encode_date(date);

    let raws: Vec<RawStation> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, code, name, city_name, city_code, address,
                  longitude, latitude, status, capacity, created_date
           FROM CONSOLIDATE_STATION
           WHERE created_date = ?1
           ORDER BY id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![date_str], read_station)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStation::into_station).collect()
  }

  async fn cities_on(&self, date: NaiveDate) -> Result<Vec<CanonicalCity>> {
    let date_str = encode_date(date);

    let raws: Vec<RawCity> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, name, nb_inhabitants, created_date
           FROM CONSOLIDATE_CITY
           WHERE created_date = ?1
           ORDER BY id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![date_str], |row| {
            Ok(RawCity {
              id:             row.get(0)?,
              name:           row.get(1)?,
              nb_inhabitants: row.get(2)?,
              created_date:   row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCity::into_city).collect()
  }

  async fn statements_on(
    &self,
    date: NaiveDate,
  ) -> Result<Vec<CanonicalStationStatement>> {
    let date_str = encode_date(date);

    let raws: Vec<RawStatement> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT station_id, NULL, bicycle_docks_available, bicycle_available,
                  last_statement_date, created_date
           FROM CONSOLIDATE_STATION_STATEMENT
           WHERE created_date = ?1
           ORDER BY station_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![date_str], read_statement)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStatement::into_statement).collect()
  }

  async fn count_rows(&self, table: Table, date: Option<NaiveDate>) -> Result<usize> {
    let dated = require_dated(table).is_ok();
    let sql = if dated {
      format!(
        "SELECT COUNT(*) FROM {} WHERE ?1 IS NULL OR created_date = ?1",
        table.name()
      )
    } else {
      format!("SELECT COUNT(*) FROM {}", table.name())
    };
    let date_str = date.map(encode_date);

    let count: i64 = self
      .call(move |conn| {
        let count = if dated {
          conn.query_row(&sql, rusqlite::params![date_str], |row| row.get(0))?
        } else {
          conn.query_row(&sql, [], |row| row.get(0))?
        };
        Ok(count)
      })
      .await?;

    usize::try_from(count).map_err(|e| Error::Decode(e.to_string()))
  }
}

// ─── AggregateStore impl ─────────────────────────────────────────────────────

impl AggregateStore for SqliteStore {
  async fn replace_dim_stations(&self, rows: Vec<DimStation>) -> Result<usize> {
    let rows: Vec<RawDimStation> = rows.into_iter().map(RawDimStation::from).collect();

    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM DIM_STATION", [])?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO DIM_STATION (
               id, code, name, address, longitude, latitude, status, capacity
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          )?;
          for r in &rows {
            stmt.execute(rusqlite::params![
              r.id,
              r.code,
              r.name,
              r.address,
              r.longitude,
              r.latitude,
              r.status,
              r.capacity,
            ])?;
          }
        }
        tx.commit()?;
        Ok(rows.len())
      })
      .await
  }

  async fn replace_dim_cities(&self, rows: Vec<DimCity>) -> Result<usize> {
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM DIM_CITY", [])?;
        {
          let mut stmt = tx
            .prepare("INSERT INTO DIM_CITY (id, name, nb_inhabitants) VALUES (?1, ?2, ?3)")?;
          for r in &rows {
            stmt.execute(rusqlite::params![r.id, r.name, r.nb_inhabitants])?;
          }
        }
        tx.commit()?;
        Ok(rows.len())
      })
      .await
  }

  async fn replace_fact_snapshot(
    &self,
    run_date: NaiveDate,
    rows: Vec<FactStationStatement>,
  ) -> Result<usize> {
    let run_date_str = encode_date(run_date);
    let rows: Vec<RawStatement> = rows
      .into_iter()
      .map(|fact| RawStatement::from(FactStationStatement { created_date: run_date, ..fact }))
      .collect();

    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM FACT_STATION_STATEMENT WHERE created_date = ?1",
          rusqlite::params![run_date_str],
        )?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO FACT_STATION_STATEMENT (
               station_id, city_id, bicycle_docks_available, bicycle_available,
               last_statement_date, created_date
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          )?;
          for r in &rows {
            stmt.execute(rusqlite::params![
              r.station_id,
              r.city_id,
              r.bicycle_docks_available,
              r.bicycle_available,
              r.last_statement_date,
              r.created_date,
            ])?;
          }
        }
        tx.commit()?;
        Ok(rows.len())
      })
      .await
  }

  async fn dim_stations(&self) -> Result<Vec<DimStation>> {
    let raws: Vec<RawDimStation> = self
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT id, code, name, address, longitude, latitude, status, capacity
           FROM DIM_STATION
           ORDER BY id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawDimStation {
              id:        row.get(0)?,
              code:      row.get(1)?,
              name:      row.get(2)?,
              address:   row.get(3)?,
              longitude: row.get(4)?,
              latitude:  row.get(5)?,
              status:    row.get(6)?,
              capacity:  row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDimStation::into_dim).collect()
  }

  async fn dim_cities(&self) -> Result<Vec<DimCity>> {
    self
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT id, name, nb_inhabitants FROM DIM_CITY ORDER BY id")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(DimCity {
              id:             row.get(0)?,
              name:           row.get(1)?,
              nb_inhabitants: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn facts_on(&self, run_date: NaiveDate) -> Result<Vec<FactStationStatement>> {
    let date_str = encode_date(run_date);

    let raws: Vec<RawStatement> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT station_id, city_id, bicycle_docks_available, bicycle_available,
                  last_statement_date, created_date
           FROM FACT_STATION_STATEMENT
           WHERE created_date = ?1
           ORDER BY station_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![date_str], read_statement)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStatement::into_fact).collect()
  }
}
