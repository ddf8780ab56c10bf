//! `flux`: administer and serve the Flux sports store.
//!
//! Reads `flux.toml` (or the path given with `--config`), overlaid by
//! `FLUX_*` environment variables.
//!
//! # Usage
//!
//! ```
//! flux migrate --dry-run
//! flux schema > schema.sql
//! flux --config /etc/flux/flux.toml serve
//! ```

mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use flux_core::schema::CATALOG;
use flux_store_sqlite::{
  SqliteStore,
  schema::{self, Plan, Step},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::FluxConfig;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "flux", author, version, about = "Flux sports statistics store")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "flux.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Bring the database schema up to date.
  Migrate {
    /// Print the pending steps without applying them.
    #[arg(long)]
    dry_run: bool,
  },
  /// Drop every table and recreate the schema. Destroys all data.
  Reset,
  /// Print the DDL for the full schema.
  Schema,
  /// Serve the JSON API over HTTP.
  Serve,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();
  let cfg = FluxConfig::load(&cli.config)?;

  tracing_subscriber::fmt().with_env_filter(cfg.log_filter()).init();

  match cli.command {
    Command::Schema => {
      print!("{}", schema::ddl(&CATALOG));
      Ok(())
    }
    Command::Migrate { dry_run } => migrate(&cfg, dry_run).await,
    Command::Reset => reset(&cfg).await,
    Command::Serve => serve(&cfg).await,
  }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn migrate(cfg: &FluxConfig, dry_run: bool) -> anyhow::Result<()> {
  let store = SqliteStore::connect(cfg.pool_config(), &CATALOG)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.database_path))?;

  let plan = if dry_run {
    store.plan_migrations().await.context("failed to plan migrations")?
  } else {
    store.migrate().await.context("migration failed")?
  };
  print_plan(&plan, dry_run);
  Ok(())
}

async fn reset(cfg: &FluxConfig) -> anyhow::Result<()> {
  let store = SqliteStore::connect(cfg.pool_config(), &CATALOG)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.database_path))?;
  let plan = store.reset().await.context("reset failed")?;
  let tables = plan
    .steps
    .iter()
    .filter(|step| matches!(step, Step::CreateTable { .. }))
    .count();
  println!("recreated {tables} tables");
  Ok(())
}

async fn serve(cfg: &FluxConfig) -> anyhow::Result<()> {
  let store = SqliteStore::open_with(cfg.pool_config())
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.database_path))?;

  let app = flux_api::api_router(Arc::new(store)).layer(TraceLayer::new_for_http());
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

fn print_plan(plan: &Plan, dry_run: bool) {
  for warning in &plan.warnings {
    println!("warning: {warning}");
  }
  if plan.is_empty() {
    println!("schema is up to date");
    return;
  }
  for step in &plan.steps {
    println!("{};", step.sql().trim_end_matches(';'));
  }
  let verb = if dry_run { "pending" } else { "applied" };
  println!("-- {} step(s) {verb}", plan.steps.len());
}
