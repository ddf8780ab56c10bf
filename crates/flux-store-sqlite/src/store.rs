//! [`SqliteStore`]: the SQLite implementation of [`SportsStore`].

use std::path::Path;

use flux_core::{
  association::{Association, Link, Side},
  changes::Changes,
  entity::Entity,
  news::UsedUrl,
  query::Filter,
  schema::{CATALOG, Catalog},
  store::{DeleteReport, SportsStore},
};
use rusqlite::TransactionBehavior;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Error, Result,
  pool::{Pool, PoolConfig},
  schema::{self, Plan},
  session::Session,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A sports store backed by a pool of SQLite connections.
///
/// Cloning is cheap; clones share the pool.
#[derive(Clone)]
pub struct SqliteStore {
  pool:    Pool,
  catalog: &'static Catalog,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and bring its schema up to date.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(PoolConfig::file(path.as_ref())).await
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> { Self::open_with(PoolConfig::memory()).await }

  /// Open with an explicit pool configuration and migrate.
  pub async fn open_with(config: PoolConfig) -> Result<Self> {
    let store = Self::connect(config, &CATALOG).await?;
    store.migrate().await?;
    Ok(store)
  }

  /// Open the pool without touching the schema.
  pub async fn connect(config: PoolConfig, catalog: &'static Catalog) -> Result<Self> {
    let pool = Pool::open(config).await?;
    Ok(Self { pool, catalog })
  }

  pub fn pool(&self) -> &Pool { &self.pool }

  pub fn catalog(&self) -> &'static Catalog { self.catalog }

  // ── Schema ────────────────────────────────────────────────────────────────

  /// What [`migrate`](Self::migrate) would do, without doing it.
  pub async fn plan_migrations(&self) -> Result<Plan> {
    let catalog = self.catalog;
    self.pool.run(move |conn| schema::plan(conn, catalog)).await
  }

  pub async fn migrate(&self) -> Result<Plan> {
    let catalog = self.catalog;
    self.pool.run(move |conn| schema::apply(conn, catalog)).await
  }

  /// Drop every table and recreate the schema from scratch.
  pub async fn reset(&self) -> Result<Plan> {
    let catalog = self.catalog;
    let plan = self
      .pool
      .run(move |conn| {
        schema::drop_all(conn, catalog)?;
        schema::apply(conn, catalog)
      })
      .await?;
    info!(tables = catalog.tables().len(), "store reset");
    Ok(plan)
  }

  // ── Transactions ──────────────────────────────────────────────────────────

  /// Run `f` inside one transaction on one pooled connection. The
  /// transaction commits when `f` returns `Ok` and rolls back otherwise.
  ///
  /// Writes start IMMEDIATE: the integrity checks read before they write,
  /// and a deferred read lock cannot always be upgraded under WAL.
  pub async fn transaction<F, T>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Session<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.run_in(TransactionBehavior::Immediate, f).await
  }

  /// Like [`transaction`](Self::transaction) but DEFERRED, so readers never
  /// queue behind a writer's lock.
  pub async fn read<F, T>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Session<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.run_in(TransactionBehavior::Deferred, f).await
  }

  async fn run_in<F, T>(&self, behavior: TransactionBehavior, f: F) -> Result<T>
  where
    F: FnOnce(&Session<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    let catalog = self.catalog;
    self
      .pool
      .run(move |conn| {
        let tx = conn.transaction_with_behavior(behavior)?;
        let out = f(&Session::new(&tx, catalog));
        match out {
          Ok(out) => {
            tx.commit()?;
            Ok(out)
          }
          Err(err) => {
            debug!(error = %err, "transaction rolled back");
            Err(err)
          }
        }
      })
      .await
  }
}

// ─── SportsStore impl ────────────────────────────────────────────────────────

impl SportsStore for SqliteStore {
  type Error = Error;

  // ── Entities ──────────────────────────────────────────────────────────────

  async fn create<E: Entity>(&self, entity: E) -> Result<E> {
    self.transaction(move |s| s.create(entity)).await
  }

  async fn get<E: Entity>(&self, id: Uuid) -> Result<Option<E>> {
    self.read(move |s| s.get::<E>(id)).await
  }

  async fn find<E: Entity>(&self, filter: Filter) -> Result<Vec<E>> {
    self.read(move |s| s.find::<E>(&filter)).await
  }

  async fn update<E: Entity>(&self, id: Uuid, changes: Changes) -> Result<E> {
    self.transaction(move |s| s.update::<E>(id, &changes)).await
  }

  async fn delete<E: Entity>(&self, id: Uuid) -> Result<DeleteReport> {
    self.transaction(move |s| s.delete::<E>(id)).await
  }

  // ── Associations ──────────────────────────────────────────────────────────

  async fn attach(&self, link: Link) -> Result<Link> {
    self.transaction(move |s| s.attach(link)).await
  }

  async fn detach(&self, association: Association, left: Uuid, right: Uuid) -> Result<()> {
    self.transaction(move |s| s.detach(association, left, right)).await
  }

  async fn links(&self, association: Association, side: Side, id: Uuid) -> Result<Vec<Link>> {
    self.read(move |s| s.links(association, side, id)).await
  }

  async fn update_link(
    &self,
    association: Association,
    left: Uuid,
    right: Uuid,
    changes: Changes,
  ) -> Result<Link> {
    self
      .transaction(move |s| s.update_link(association, left, right, &changes))
      .await
  }

  async fn associated<E: Entity>(&self, association: Association, id: Uuid) -> Result<Vec<E>> {
    self.read(move |s| s.associated::<E>(association, id)).await
  }

  // ── Used URLs ─────────────────────────────────────────────────────────────

  async fn mark_url_used(&self, url: String) -> Result<UsedUrl> {
    self.transaction(move |s| s.mark_url_used(url)).await
  }

  async fn is_url_used(&self, url: String) -> Result<bool> {
    self.read(move |s| s.is_url_used(url)).await
  }
}
