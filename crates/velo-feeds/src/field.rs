//! Loosely-typed field access over raw JSON records.
//!
//! Open-data exports are not consistent about types: station codes arrive as
//! strings or integers, counts sometimes as numeric strings, timestamps as
//! RFC 3339 text or epoch milliseconds. These helpers accept every shape we
//! have seen and treat JSON `null` the same as an absent key.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use velo_core::MappingError;

pub(crate) type Record = Map<String, Value>;

/// Look up a dotted path (`"position.lon"`). A flat key spelled with the dot
/// (as produced by flattening tools) takes precedence over nesting.
pub(crate) fn lookup<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
  if let Some(v) = record.get(path) {
    return non_null(v);
  }

  let mut segments = path.split('.');
  let mut current = record.get(segments.next()?)?;
  for segment in segments {
    current = current.as_object()?.get(segment)?;
  }
  non_null(current)
}

fn non_null(v: &Value) -> Option<&Value> {
  if v.is_null() { None } else { Some(v) }
}

pub(crate) fn text(v: &Value) -> Option<String> {
  match v {
    Value::String(s) => {
      let trimmed = s.trim();
      (!trimmed.is_empty()).then(|| trimmed.to_owned())
    }
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

pub(crate) fn float(v: &Value) -> Option<f64> {
  let parsed: Option<f64> = match v {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  };
  parsed.filter(|f| f.is_finite())
}

pub(crate) fn integer(v: &Value) -> Option<i64> {
  match v {
    Value::Number(n) => n.as_i64().or_else(|| {
      n.as_f64()
        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
        .map(|f| f as i64)
    }),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

/// RFC 3339 text or integer epoch milliseconds.
pub(crate) fn timestamp(v: &Value) -> Option<DateTime<Utc>> {
  match v {
    Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
      .ok()
      .map(|dt| dt.with_timezone(&Utc)),
    Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
    _ => None,
  }
}

// ─── Required fields ─────────────────────────────────────────────────────────

/// Extract a required field, reporting the record as unusable when it is
/// absent or cannot be converted.
pub(crate) fn required<T>(
  record: &Record,
  index: usize,
  field: &'static str,
  convert: impl FnOnce(&Value) -> Option<T>,
) -> Result<T, MappingError> {
  let raw = lookup(record, field).ok_or(MappingError::MissingField { index, field })?;
  convert(raw).ok_or_else(|| MappingError::InvalidField {
    index,
    field,
    value: raw.to_string(),
  })
}

/// Extract an optional field; unconvertible values become `None`.
pub(crate) fn optional<T>(
  record: &Record,
  field: &str,
  convert: impl FnOnce(&Value) -> Option<T>,
) -> Option<T> {
  lookup(record, field).and_then(convert)
}
