//! Error type for `flux-store-sqlite`.

use std::time::Duration;

use flux_core::{schema::CATALOG, store::StoreError};
use rusqlite::ffi;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] flux_core::Error),

  #[error("connection pool error: {0}")]
  Pool(#[from] r2d2::Error),

  #[error("blocking task failed: {0}")]
  Task(#[from] tokio::task::JoinError),

  #[error("sqlite error: {0}")]
  Sqlite(rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("timed out after {0:?} waiting for a pooled connection")]
  PoolTimeout(Duration),

  #[error(
    "database schema version {db_version} is newer than the latest supported \
     version {latest_supported}"
  )]
  UnsupportedSchemaVersion { db_version: i64, latest_supported: i64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl StoreError for Error {
  fn integrity(&self) -> Option<&flux_core::Error> {
    match self {
      Error::Core(e) => Some(e),
      _ => None,
    }
  }
}

/// Constraint failures raised by SQLite itself are folded into the core
/// taxonomy; everything else stays a plain SQLite error.
impl From<rusqlite::Error> for Error {
  fn from(err: rusqlite::Error) -> Self {
    let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err else {
      return Error::Sqlite(err);
    };
    match failure.extended_code {
      ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
        let (table, columns) = constraint_target(message);
        Error::Core(flux_core::Error::UniqueConstraintViolation {
          table,
          columns,
          value: String::new(),
        })
      }
      ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
        Error::Core(flux_core::Error::ForeignKeyViolation {
          table:  "unknown",
          column: "unknown",
          detail: message.clone(),
        })
      }
      _ => Error::Sqlite(err),
    }
  }
}

/// Parse `"UNIQUE constraint failed: team.name, team.pretty_name"` into the
/// catalog table name and the bare column list.
fn constraint_target(message: &str) -> (&'static str, String) {
  let targets = message.rsplit(": ").next().unwrap_or_default();
  let mut table = "unknown";
  let mut columns = Vec::new();
  for target in targets.split(", ") {
    match target.split_once('.') {
      Some((t, c)) => {
        if let Some(known) = CATALOG.table(t) {
          table = known.name;
        }
        columns.push(c);
      }
      None => columns.push(target),
    }
  }
  (table, columns.join(", "))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unique_failure_message_is_mapped_to_catalog_table() {
    let (table, columns) =
      constraint_target("UNIQUE constraint failed: match.match_name, match.planned_start_datetime");
    assert_eq!(table, "match");
    assert_eq!(columns, "match_name, planned_start_datetime");
  }
}
