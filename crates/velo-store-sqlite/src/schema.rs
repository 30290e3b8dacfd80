//! SQL schema for the Velo SQLite store.
//!
//! Executed by [`crate::SqliteStore::bootstrap`]. Tables are `STRICT`, so a
//! value of the wrong type is rejected instead of silently coerced.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Consolidated tables are snapshot-versioned: one row per natural key per
-- created_date. Rows of earlier dates are never updated or deleted.
CREATE TABLE IF NOT EXISTS CONSOLIDATE_STATION (
    id           TEXT    NOT NULL,   -- '{source prefix}-{native code}'
    code         TEXT    NOT NULL,
    name         TEXT,
    city_name    TEXT,
    city_code    INTEGER NOT NULL,   -- 0 when the city is unresolved
    address      TEXT,
    longitude    REAL    NOT NULL,
    latitude     REAL    NOT NULL,
    status       TEXT CHECK (status IN ('OPEN', 'CLOSED')),
    capacity     INTEGER,
    created_date TEXT    NOT NULL,   -- YYYY-MM-DD
    PRIMARY KEY (id, created_date)
) STRICT;

CREATE TABLE IF NOT EXISTS CONSOLIDATE_CITY (
    id             INTEGER NOT NULL, -- official municipal code
    name           TEXT,
    nb_inhabitants INTEGER,
    created_date   TEXT    NOT NULL,
    PRIMARY KEY (id, created_date)
) STRICT;

-- No foreign key on station_id: statements may reference stations that
-- were never consolidated.
CREATE TABLE IF NOT EXISTS CONSOLIDATE_STATION_STATEMENT (
    station_id              TEXT NOT NULL,
    bicycle_docks_available INTEGER,
    bicycle_available       INTEGER,
    last_statement_date     TEXT,        -- RFC 3339 UTC
    created_date            TEXT NOT NULL,
    PRIMARY KEY (station_id, created_date)
) STRICT;

-- Dimensions hold the latest snapshot only and are rebuilt on every run.
CREATE TABLE IF NOT EXISTS DIM_STATION (
    id        TEXT PRIMARY KEY,
    code      TEXT NOT NULL,
    name      TEXT,
    address   TEXT,
    longitude REAL NOT NULL,
    latitude  REAL NOT NULL,
    status    TEXT CHECK (status IN ('OPEN', 'CLOSED')),
    capacity  INTEGER
) STRICT;

CREATE TABLE IF NOT EXISTS DIM_CITY (
    id             INTEGER PRIMARY KEY,
    name           TEXT,
    nb_inhabitants INTEGER
) STRICT;

-- One fact snapshot per aggregation date; created_date is the run date.
CREATE TABLE IF NOT EXISTS FACT_STATION_STATEMENT (
    station_id              TEXT    NOT NULL,
    city_id                 INTEGER NOT NULL,
    bicycle_docks_available INTEGER,
    bicycle_available       INTEGER,
    last_statement_date     TEXT,
    created_date            TEXT    NOT NULL,
    PRIMARY KEY (station_id, created_date)
) STRICT;

CREATE INDEX IF NOT EXISTS consolidate_station_date_idx
    ON CONSOLIDATE_STATION(created_date);
CREATE INDEX IF NOT EXISTS consolidate_city_date_idx
    ON CONSOLIDATE_CITY(created_date);
CREATE INDEX IF NOT EXISTS consolidate_statement_date_idx
    ON CONSOLIDATE_STATION_STATEMENT(created_date);

PRAGMA user_version = 1;
";
