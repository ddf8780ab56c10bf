//! Error types for `flux-core`.
//!
//! The integrity variants are the taxonomy every backend reports through
//! [`StoreError::integrity`](crate::store::StoreError::integrity).

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// A unique column (or column set) already holds this value.
  #[error("unique constraint violation on {table}({columns}): {value}")]
  UniqueConstraintViolation {
    table:   &'static str,
    columns: String,
    value:   String,
  },

  /// A reference to a row that does not exist, or a delete blocked by a
  /// restrictive foreign key.
  #[error("foreign key violation on {table}.{column}: {detail}")]
  ForeignKeyViolation {
    table:  &'static str,
    column: &'static str,
    detail: String,
  },

  #[error("{table} not found: {key}")]
  NotFound { table: &'static str, key: String },

  #[error("{table} already links {left} and {right}")]
  DuplicateAssociation {
    table: &'static str,
    left:  Uuid,
    right: Uuid,
  },

  #[error("unknown column {table}.{column}")]
  UnknownColumn { table: &'static str, column: String },

  #[error("column {table}.{column} cannot be changed")]
  ImmutableColumn { table: &'static str, column: String },

  #[error("invalid value for {table}.{column}: {reason}")]
  InvalidValue {
    table:  &'static str,
    column: String,
    reason: String,
  },

  #[error("invalid json edit on {column}: {reason}")]
  InvalidJsonPath { column: String, reason: String },

  #[error("{table} is not a side of association {association}")]
  NotAnAssociationSide {
    table:       &'static str,
    association: &'static str,
  },

  #[error("unknown {kind} value: {value:?}")]
  UnknownEnumValue { kind: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn not_found(table: &'static str, key: impl ToString) -> Self {
    Self::NotFound { table, key: key.to_string() }
  }

  /// `true` for the variants caused by the caller's input rather than by
  /// stored state.
  pub fn is_invalid_input(&self) -> bool {
    matches!(
      self,
      Self::UnknownColumn { .. }
        | Self::ImmutableColumn { .. }
        | Self::InvalidValue { .. }
        | Self::InvalidJsonPath { .. }
        | Self::NotAnAssociationSide { .. }
        | Self::UnknownEnumValue { .. }
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
