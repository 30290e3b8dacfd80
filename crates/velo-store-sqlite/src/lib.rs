//! SQLite backend for the Velo warehouse.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every statement is parameterised;
//! only table names from the closed [`velo_core::store::Table`] enum are
//! ever formatted into SQL.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
