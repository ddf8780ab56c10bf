//! The [`Entity`] trait tying a row type to its [`Table`] declaration.
//!
//! Entities serialise to a JSON object whose keys are exactly the table's
//! column names; backends use that object as the row image.

use chrono::{NaiveDateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::schema::Table;

/// A row type stored in an entity (non-join) table.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
  const TABLE: &'static Table;

  /// The primary key. A nil id asks the store to generate one on create.
  fn id(&self) -> Uuid;
}

/// A fresh time-ordered identifier.
pub fn new_id() -> Uuid { Uuid::now_v7() }

/// Current UTC wall-clock time with the offset dropped, the form every
/// timestamp column stores.
pub fn utc_now() -> NaiveDateTime { Utc::now().naive_utc() }

macro_rules! impl_entity {
  ($ty:ty, $table:path, $key:ident) => {
    impl $crate::entity::Entity for $ty {
      const TABLE: &'static $crate::schema::Table = &$table;

      fn id(&self) -> ::uuid::Uuid { self.$key }
    }
  };
}

pub(crate) use impl_entity;
