//! Runtime configuration: an optional TOML file overlaid by `FLUX_*`
//! environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use flux_store_sqlite::PoolConfig;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FluxConfig {
  pub host:              String,
  pub port:              u16,
  pub database_path:     PathBuf,
  pub pool_size:         usize,
  pub pool_timeout_secs: u64,
  pub busy_timeout_ms:   u64,
  /// Log every statement the store executes.
  pub echo:              bool,
}

impl Default for FluxConfig {
  fn default() -> Self {
    Self {
      host:              "127.0.0.1".to_string(),
      port:              8080,
      database_path:     PathBuf::from("flux.db"),
      pool_size:         flux_store_sqlite::pool::DEFAULT_MAX_CONNECTIONS,
      pool_timeout_secs: flux_store_sqlite::pool::DEFAULT_ACQUIRE_TIMEOUT.as_secs(),
      busy_timeout_ms:   5_000,
      echo:              false,
    }
  }
}

impl FluxConfig {
  /// Read `path` if it exists, then apply `FLUX_*` overrides.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("FLUX"))
      .build()
      .context("failed to read config file")?;

    settings.try_deserialize().context("failed to deserialise FluxConfig")
  }

  pub fn pool_config(&self) -> PoolConfig {
    PoolConfig::file(expand_tilde(&self.database_path))
      .max_connections(self.pool_size)
      .acquire_timeout(Duration::from_secs(self.pool_timeout_secs))
      .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// `RUST_LOG` wins; otherwise INFO, with the store at TRACE when `echo`
  /// is on.
  pub fn log_filter(&self) -> EnvFilter {
    let filter = EnvFilter::builder()
      .with_default_directive(LevelFilter::INFO.into())
      .from_env_lossy();
    if !self.echo {
      return filter;
    }
    match "flux_store_sqlite=trace".parse() {
      Ok(directive) => filter.add_directive(directive),
      Err(_) => filter,
    }
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
