//! Error type for `velo-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A write or read failed for a reason other than the schema (constraint
  /// violation, I/O, closed connection).
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// A required table or column is missing, or a value did not fit its
  /// column type.
  #[error("schema error: {0}")]
  Schema(String),

  /// A stored value could not be decoded back into a domain type.
  #[error("decode error: {0}")]
  Decode(String),
}

impl Error {
  /// Whether this error means the schema has not been bootstrapped or does
  /// not match what the pipeline writes.
  pub fn is_schema(&self) -> bool { matches!(self, Self::Schema(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Extended result code for a STRICT-table datatype violation.
const SQLITE_CONSTRAINT_DATATYPE: i32 = 3091;

/// Sort a raw connection error into a schema problem or a plain database
/// failure.
pub(crate) fn classify(e: tokio_rusqlite::Error) -> Error {
  if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(code, msg)) = &e {
    let message = msg.as_deref().unwrap_or_default();
    let schema_message = ["no such table", "no such column", "has no column named"]
      .iter()
      .any(|needle| message.contains(needle));
    if schema_message || code.extended_code == SQLITE_CONSTRAINT_DATATYPE {
      return Error::Schema(message.to_owned());
    }
  }
  Error::Database(e)
}
