//! The `SportsStore` trait and the delete report it returns.
//!
//! Implemented by storage backends (e.g. `flux-store-sqlite`). The API and
//! CLI depend on this abstraction rather than on a concrete backend.

use std::{collections::BTreeMap, future::Future};

use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error,
  association::{Association, Link, Side},
  changes::Changes,
  entity::Entity,
  news::UsedUrl,
  query::Filter,
};

// ─── Delete report ───────────────────────────────────────────────────────────

/// Everything a single delete touched, including the root row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
  /// Rows removed, keyed by table.
  pub deleted: BTreeMap<String, usize>,
  /// Rows whose foreign key was set to NULL, keyed by `table.column`.
  pub nulled:  BTreeMap<String, usize>,
}

impl DeleteReport {
  pub fn deleted(&self, table: &str) -> usize { self.deleted.get(table).copied().unwrap_or(0) }

  pub fn nulled(&self, table: &str, column: &str) -> usize {
    self.nulled.get(&format!("{table}.{column}")).copied().unwrap_or(0)
  }

  pub fn total_deleted(&self) -> usize { self.deleted.values().sum() }

  pub fn record_deleted(&mut self, table: &str, count: usize) {
    if count > 0 {
      *self.deleted.entry(table.to_owned()).or_default() += count;
    }
  }

  pub fn record_nulled(&mut self, table: &str, column: &str, count: usize) {
    if count > 0 {
      *self.nulled.entry(format!("{table}.{column}")).or_default() += count;
    }
  }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Backend errors expose the integrity taxonomy so callers can react to a
/// unique or foreign-key violation without knowing the backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn integrity(&self) -> Option<&Error>;
}

impl StoreError for Error {
  fn integrity(&self) -> Option<&Error> { Some(self) }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a sports-statistics store backend.
///
/// Every method is one unit of work: it either applies completely or leaves
/// the store untouched. All methods return `Send` futures so the trait can be
/// used from multi-threaded runtimes (e.g. tokio with `axum`).
pub trait SportsStore: Send + Sync {
  type Error: StoreError + From<Error>;

  // ── Entities ──────────────────────────────────────────────────────────

  /// Insert `entity`. A nil id is replaced by a fresh one; both timestamps
  /// are set to the current time.
  fn create<E: Entity>(&self, entity: E) -> impl Future<Output = Result<E, Self::Error>> + Send + '_;

  fn get<E: Entity>(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<E>, Self::Error>> + Send + '_;

  /// Like [`get`](Self::get) but a missing row is an
  /// [`Error::NotFound`].
  fn require<E: Entity>(&self, id: Uuid) -> impl Future<Output = Result<E, Self::Error>> + Send + '_ {
    async move {
      self
        .get::<E>(id)
        .await?
        .ok_or_else(|| Error::not_found(E::TABLE.name, id).into())
    }
  }

  fn find<E: Entity>(
    &self,
    filter: Filter,
  ) -> impl Future<Output = Result<Vec<E>, Self::Error>> + Send + '_;

  /// The first row whose `column` equals `value`.
  fn get_by<E: Entity>(
    &self,
    column: &'static str,
    value: serde_json::Value,
  ) -> impl Future<Output = Result<Option<E>, Self::Error>> + Send + '_ {
    async move {
      let mut rows = self.find::<E>(Filter::new().eq(column, value).limit(1)).await?;
      Ok(rows.pop())
    }
  }

  fn list<E: Entity>(&self) -> impl Future<Output = Result<Vec<E>, Self::Error>> + Send + '_ {
    self.find::<E>(Filter::new())
  }

  /// Apply `changes` to the row `id` and return the updated entity.
  fn update<E: Entity>(
    &self,
    id: Uuid,
    changes: Changes,
  ) -> impl Future<Output = Result<E, Self::Error>> + Send + '_;

  /// Delete the row `id`, following the delete policy of every foreign key
  /// that references it.
  fn delete<E: Entity>(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<DeleteReport, Self::Error>> + Send + '_;

  // ── Associations ──────────────────────────────────────────────────────

  /// Insert one join row. Both members must exist; an existing pair is an
  /// [`Error::DuplicateAssociation`].
  fn attach(&self, link: Link) -> impl Future<Output = Result<Link, Self::Error>> + Send + '_;

  /// Remove one join row; a missing pair is an [`Error::NotFound`].
  fn detach(
    &self,
    association: Association,
    left: Uuid,
    right: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Join rows whose `side` member is `id`.
  fn links(
    &self,
    association: Association,
    side: Side,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<Link>, Self::Error>> + Send + '_;

  /// Change the attributes carried by a join row.
  fn update_link(
    &self,
    association: Association,
    left: Uuid,
    right: Uuid,
    changes: Changes,
  ) -> impl Future<Output = Result<Link, Self::Error>> + Send + '_;

  /// Entities of type `E` linked to `id`, which sits on the other side of
  /// `association`.
  fn associated<E: Entity>(
    &self,
    association: Association,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<E>, Self::Error>> + Send + '_;

  // ── Used URLs ─────────────────────────────────────────────────────────

  fn mark_url_used(
    &self,
    url: String,
  ) -> impl Future<Output = Result<UsedUrl, Self::Error>> + Send + '_;

  fn is_url_used(&self, url: String) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
