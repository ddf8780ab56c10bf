//! A bounded [`r2d2`] pool of SQLite connections.
//!
//! Every connection gets the store's pragmas when it is opened, and file
//! databases run in WAL mode. Checkouts block on a worker thread so the async
//! runtime never waits on SQLite.
//!
//! An in-memory database exists only as long as its connection, so an
//! in-memory pool always holds exactly one connection and never recycles it.

use std::{path::PathBuf, time::Duration};

use r2d2_sqlite::SqliteConnectionManager;
use tracing::debug;

use crate::{Error, Result, schema::CONNECTION_PRAGMAS};

pub const DEFAULT_MAX_CONNECTIONS: usize = 20;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A checked-out connection; returns to the pool on drop.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PoolConfig {
  /// Database file; `None` for a private in-memory database.
  pub path:            Option<PathBuf>,
  pub max_connections: usize,
  pub acquire_timeout: Duration,
  /// How long SQLite itself waits on a locked database file.
  pub busy_timeout:    Duration,
}

impl PoolConfig {
  pub fn file(path: impl Into<PathBuf>) -> Self {
    Self {
      path:            Some(path.into()),
      max_connections: DEFAULT_MAX_CONNECTIONS,
      acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
      busy_timeout:    DEFAULT_BUSY_TIMEOUT,
    }
  }

  pub fn memory() -> Self {
    Self { path: None, max_connections: 1, ..Self::file("") }
  }

  pub fn max_connections(mut self, max: usize) -> Self {
    self.max_connections = max;
    self
  }

  pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
    self.acquire_timeout = timeout;
    self
  }

  pub fn busy_timeout(mut self, timeout: Duration) -> Self {
    self.busy_timeout = timeout;
    self
  }

  fn effective_max(&self) -> usize {
    match self.path {
      Some(_) => self.max_connections.max(1),
      None => 1,
    }
  }
}

// ─── Pool ────────────────────────────────────────────────────────────────────

/// Cloning is cheap; every clone shares the same connections.
#[derive(Clone)]
pub struct Pool {
  inner:   r2d2::Pool<SqliteConnectionManager>,
  timeout: Duration,
  memory:  bool,
}

impl Pool {
  /// Build the pool and open its first connection, so a bad path fails here
  /// rather than on first use.
  pub async fn open(config: PoolConfig) -> Result<Self> {
    let max = config.effective_max();
    let memory = config.path.is_none();
    let manager = match &config.path {
      Some(path) => SqliteConnectionManager::file(path),
      None => SqliteConnectionManager::memory(),
    };

    let busy = config.busy_timeout;
    let manager = manager.with_init(move |conn| {
      conn.execute_batch(CONNECTION_PRAGMAS)?;
      conn.busy_timeout(busy)?;
      if !memory {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
      }
      Ok(())
    });

    let mut builder = r2d2::Pool::builder()
      .max_size(u32::try_from(max).unwrap_or(u32::MAX))
      .min_idle(Some(1))
      .connection_timeout(config.acquire_timeout);
    if memory {
      builder = builder.idle_timeout(None).max_lifetime(None);
    }

    let inner = tokio::task::spawn_blocking(move || builder.build(manager)).await??;
    debug!(path = ?config.path, max_connections = max, "connection pool opened");

    Ok(Self { inner, timeout: config.acquire_timeout, memory })
  }

  /// Wait for a free connection, at most `acquire_timeout`.
  pub async fn acquire(&self) -> Result<PooledConnection> {
    let pool = self.inner.clone();
    let timeout = self.timeout;
    tokio::task::spawn_blocking(move || checkout(&pool, timeout)).await?
  }

  /// Check out a connection and run `f` on it, off the async runtime.
  pub async fn run<F, T>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    let pool = self.inner.clone();
    let timeout = self.timeout;
    tokio::task::spawn_blocking(move || {
      let mut conn = checkout(&pool, timeout)?;
      f(&mut *conn)
    })
    .await?
  }

  pub fn max_connections(&self) -> usize { self.inner.max_size() as usize }

  /// Connections that could be checked out right now without waiting.
  pub fn available(&self) -> usize {
    let state = self.inner.state();
    let in_use = state.connections - state.idle_connections;
    self.max_connections() - in_use as usize
  }

  pub fn is_memory(&self) -> bool { self.memory }
}

fn checkout(pool: &r2d2::Pool<SqliteConnectionManager>, timeout: Duration) -> Result<PooledConnection> {
  pool.get().map_err(|err| {
    debug!(error = %err, "connection checkout failed");
    Error::PoolTimeout(timeout)
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn memory_pool_has_a_single_connection() {
    let pool = Pool::open(PoolConfig::memory().max_connections(8)).await.unwrap();
    assert_eq!(pool.max_connections(), 1);
    assert!(pool.is_memory());

    pool
      .run(|c| {
        c.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);")?;
        Ok(())
      })
      .await
      .unwrap();

    // Same database on the next checkout.
    let n: i64 = pool
      .run(|c| Ok(c.query_row("SELECT count(*) FROM t", [], |r| r.get(0))?))
      .await
      .unwrap();
    assert_eq!(n, 1);
  }

  #[tokio::test]
  async fn acquire_times_out_when_exhausted() {
    let pool = Pool::open(PoolConfig::memory().acquire_timeout(Duration::from_millis(50)))
      .await
      .unwrap();
    let held = pool.acquire().await.unwrap();
    assert_eq!(pool.available(), 0);

    let err = pool.acquire().await.err().unwrap();
    assert!(matches!(err, Error::PoolTimeout(_)));

    drop(held);
    assert_eq!(pool.available(), 1);
    pool.acquire().await.unwrap();
  }

  #[tokio::test]
  async fn file_pool_opens_connections_up_to_its_bound() {
    let dir = tempfile::tempdir().unwrap();
    let pool = Pool::open(PoolConfig::file(dir.path().join("flux.db")).max_connections(3))
      .await
      .unwrap();
    assert_eq!(pool.max_connections(), 3);

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    let c = pool.acquire().await.unwrap();
    assert_eq!(pool.available(), 0);

    let fk: i64 = b.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
    assert_eq!(fk, 1);
    let mode: String = c.query_row("PRAGMA journal_mode", [], |r| r.get(0)).unwrap();
    assert_eq!(mode, "wal");

    drop((a, b, c));
    assert_eq!(pool.available(), 3);
  }
}
