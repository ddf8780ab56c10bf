//! Conversion between JSON row images and SQLite column values.
//!
//! UUIDs are stored as hyphenated lowercase strings, timestamps as naive ISO
//! 8601 text, JSON columns as compact JSON text and enum columns as their
//! lowercase name.

use chrono::NaiveDateTime;
use flux_core::{
  changes::TIMESTAMP_FORMAT,
  schema::{Column, ColumnKind, Table},
};
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Identifiers ─────────────────────────────────────────────────────────────

pub fn quote(ident: &str) -> String { format!("\"{ident}\"") }

pub fn column_list(table: &Table) -> String {
  table.columns.iter().map(|c| quote(c.name)).collect::<Vec<_>>().join(", ")
}

pub fn encode_uuid(id: Uuid) -> SqlValue { SqlValue::Text(id.hyphenated().to_string()) }

pub fn encode_ts(ts: NaiveDateTime) -> String { ts.format(TIMESTAMP_FORMAT).to_string() }

// ─── JSON → SQL ──────────────────────────────────────────────────────────────

fn invalid(table: &Table, column: &Column, reason: impl Into<String>) -> Error {
  flux_core::Error::InvalidValue {
    table:  table.name,
    column: column.name.to_owned(),
    reason: reason.into(),
  }
  .into()
}

/// Encode one column of a row image, validating it against the declared kind.
pub fn encode(table: &Table, column: &Column, value: &Value) -> Result<SqlValue> {
  if value.is_null() {
    if column.nullable {
      return Ok(SqlValue::Null);
    }
    return Err(invalid(table, column, "must not be null"));
  }

  match column.kind {
    ColumnKind::Uuid => {
      let Some(s) = value.as_str() else {
        return Err(invalid(table, column, "expected a uuid string"));
      };
      let id = Uuid::parse_str(s).map_err(|e| invalid(table, column, e.to_string()))?;
      Ok(encode_uuid(id))
    }
    ColumnKind::Text => match value {
      Value::String(s) => Ok(SqlValue::Text(s.clone())),
      _ => Err(invalid(table, column, "expected a string")),
    },
    ColumnKind::Integer => value
      .as_i64()
      .map(SqlValue::Integer)
      .ok_or_else(|| invalid(table, column, "expected an integer")),
    ColumnKind::Timestamp => {
      let Some(s) = value.as_str() else {
        return Err(invalid(table, column, "expected a timestamp string"));
      };
      let ts: NaiveDateTime = s
        .parse()
        .map_err(|e: chrono::ParseError| invalid(table, column, e.to_string()))?;
      Ok(SqlValue::Text(encode_ts(ts)))
    }
    ColumnKind::Json => Ok(SqlValue::Text(serde_json::to_string(value)?)),
    ColumnKind::Enum(names) => {
      let Some(s) = value.as_str() else {
        return Err(invalid(table, column, "expected a string"));
      };
      names
        .iter()
        .find(|name| name.eq_ignore_ascii_case(s))
        .map(|name| SqlValue::Text((*name).to_owned()))
        .ok_or_else(|| invalid(table, column, format!("{s:?} is not one of {names:?}")))
    }
  }
}

// ─── SQL → JSON ──────────────────────────────────────────────────────────────

pub fn decode(column: &Column, value: ValueRef<'_>) -> Result<Value> {
  let text = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();
  Ok(match (column.kind, value) {
    (_, ValueRef::Null) => Value::Null,
    (ColumnKind::Json, ValueRef::Text(bytes)) => serde_json::from_slice(bytes)?,
    (_, ValueRef::Text(bytes)) => Value::String(text(bytes)),
    (_, ValueRef::Integer(i)) => Value::from(i),
    (_, ValueRef::Real(f)) => Value::from(f),
    (_, ValueRef::Blob(bytes)) => Value::String(text(bytes)),
  })
}

/// Read a full row (selected with [`column_list`]) into a row image.
pub fn decode_row(table: &Table, row: &rusqlite::Row<'_>) -> Result<Map<String, Value>> {
  let mut map = Map::new();
  for (idx, column) in table.columns.iter().enumerate() {
    map.insert(column.name.to_owned(), decode(column, row.get_ref(idx)?)?);
  }
  Ok(map)
}
