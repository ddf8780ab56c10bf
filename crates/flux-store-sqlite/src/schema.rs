//! DDL generation and the diff-based migration applier.
//!
//! The DDL is derived from the [`Catalog`]; nothing here spells out a table by
//! hand. [`plan`] compares the catalog with what `sqlite_master` reports and
//! only ever proposes additive steps. The applied state is mirrored to
//! `PRAGMA user_version`.

use std::collections::BTreeSet;

use flux_core::schema::{Catalog, Column, ColumnKind, Table};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::{Error, Result, encode::quote};

/// Schema version written by this binary.
pub const SCHEMA_VERSION: i64 = 1;

/// Applied to every pooled connection on open.
pub const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON;";

// ─── DDL ─────────────────────────────────────────────────────────────────────

fn sql_type(kind: ColumnKind) -> &'static str {
  match kind {
    ColumnKind::Integer => "INTEGER",
    _ => "TEXT",
  }
}

fn column_def(column: &Column) -> String {
  let mut def = format!("{} {}", quote(column.name), sql_type(column.kind));
  if !column.nullable {
    def.push_str(" NOT NULL");
  }
  if let ColumnKind::Enum(names) = column.kind {
    let allowed = names.iter().map(|n| format!("'{n}'")).collect::<Vec<_>>().join(", ");
    def.push_str(&format!(" CHECK ({} IN ({allowed}))", quote(column.name)));
  }
  def
}

fn parent_key<'a>(catalog: &'a Catalog, parent: &str) -> &'a str {
  catalog.table(parent).map_or("id", |t| t.key())
}

pub fn create_table_sql(catalog: &Catalog, table: &Table) -> String {
  let mut lines: Vec<String> = table.columns.iter().map(column_def).collect();

  let pk = table.primary_key.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ");
  lines.push(format!("PRIMARY KEY ({pk})"));

  for set in table.unique {
    let cols = set.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ");
    lines.push(format!("UNIQUE ({cols})"));
  }

  for fk in table.foreign_keys {
    lines.push(format!(
      "FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE {}",
      quote(fk.column),
      quote(fk.parent),
      quote(parent_key(catalog, fk.parent)),
      fk.on_delete.as_sql(),
    ));
  }

  format!(
    "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
    quote(table.name),
    lines.join(",\n    ")
  )
}

pub fn index_name(table: &Table, column: &str) -> String { format!("{}_{column}_idx", table.name) }

/// One index per foreign-key column, so cascades never scan.
pub fn index_sql(table: &Table) -> Vec<(String, String)> {
  table
    .foreign_keys
    .iter()
    .map(|fk| {
      let name = index_name(table, fk.column);
      let sql = format!(
        "CREATE INDEX IF NOT EXISTS {} ON {}({});",
        quote(&name),
        quote(table.name),
        quote(fk.column)
      );
      (name, sql)
    })
    .collect()
}

/// The complete schema as one script, parents first.
pub fn ddl(catalog: &Catalog) -> String {
  let mut out = String::new();
  for table in catalog.tables() {
    out.push_str(&create_table_sql(catalog, table));
    out.push('\n');
    for (_, sql) in index_sql(table) {
      out.push_str(&sql);
      out.push('\n');
    }
    out.push('\n');
  }
  out.push_str(&format!("PRAGMA user_version = {SCHEMA_VERSION};\n"));
  out
}

// ─── Planning ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
  CreateTable { table: &'static str, sql: String },
  AddColumn { table: &'static str, column: &'static str, sql: String },
  CreateIndex { name: String, sql: String },
}

impl Step {
  pub fn sql(&self) -> &str {
    match self {
      Step::CreateTable { sql, .. } | Step::AddColumn { sql, .. } | Step::CreateIndex { sql, .. } => sql,
    }
  }
}

/// What [`apply`] would do. Warnings describe drift that is never fixed
/// automatically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
  pub steps:    Vec<Step>,
  pub warnings: Vec<String>,
}

impl Plan {
  pub fn is_empty(&self) -> bool { self.steps.is_empty() }
}

pub fn user_version(conn: &Connection) -> Result<i64> {
  Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}

fn existing_objects(conn: &Connection, kind: &str) -> Result<BTreeSet<String>> {
  let mut stmt = conn.prepare(
    "SELECT name FROM sqlite_master WHERE type = ?1 AND name NOT LIKE 'sqlite_%'",
  )?;
  let names = stmt
    .query_map([kind], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<_>>()?;
  Ok(names)
}

fn existing_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
  let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(table)))?;
  let names = stmt
    .query_map([], |row| row.get::<_, String>(1))?
    .collect::<rusqlite::Result<_>>()?;
  Ok(names)
}

pub fn plan(conn: &Connection, catalog: &Catalog) -> Result<Plan> {
  let tables = existing_objects(conn, "table")?;
  let indexes = existing_objects(conn, "index")?;
  let mut plan = Plan::default();

  for table in catalog.tables() {
    if !tables.contains(table.name) {
      plan.steps.push(Step::CreateTable {
        table: table.name,
        sql:   create_table_sql(catalog, table),
      });
    } else {
      let present = existing_columns(conn, table.name)?;
      for column in table.columns.iter().filter(|c| !present.contains(c.name)) {
        if column.nullable && !table.is_key_column(column.name) {
          plan.steps.push(Step::AddColumn {
            table:  table.name,
            column: column.name,
            sql:    format!(
              "ALTER TABLE {} ADD COLUMN {};",
              quote(table.name),
              column_def(column)
            ),
          });
        } else {
          plan.warnings.push(format!(
            "column {}.{} is missing and cannot be added automatically",
            table.name, column.name
          ));
        }
      }
      for extra in present.iter().filter(|name| table.column(name).is_none()) {
        plan.warnings.push(format!("column {}.{extra} is not in the catalog", table.name));
      }
    }

    for (name, sql) in index_sql(table) {
      if !indexes.contains(&name) {
        plan.steps.push(Step::CreateIndex { name, sql });
      }
    }
  }

  for extra in tables.iter().filter(|name| catalog.table(name).is_none()) {
    plan.warnings.push(format!("table {extra} is not in the catalog and was left untouched"));
  }

  Ok(plan)
}

// ─── Applying ────────────────────────────────────────────────────────────────

/// Bring the database up to the catalog in one transaction and stamp
/// [`SCHEMA_VERSION`]. Returns the plan that was applied.
pub fn apply(conn: &mut Connection, catalog: &Catalog) -> Result<Plan> {
  let current = user_version(conn)?;
  if current > SCHEMA_VERSION {
    return Err(Error::UnsupportedSchemaVersion {
      db_version:       current,
      latest_supported: SCHEMA_VERSION,
    });
  }

  let plan = plan(conn, catalog)?;
  for warning in &plan.warnings {
    warn!("{warning}");
  }

  let tx = conn.transaction()?;
  for step in &plan.steps {
    tracing::trace!(sql = step.sql(), "migration step");
    tx.execute_batch(step.sql())?;
  }
  tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
  tx.commit()?;

  if !plan.is_empty() {
    info!(steps = plan.steps.len(), from = current, to = SCHEMA_VERSION, "schema migrated");
  }
  Ok(plan)
}

/// Drop every catalog table, children first, and reset the version stamp.
pub fn drop_all(conn: &mut Connection, catalog: &Catalog) -> Result<()> {
  let tx = conn.transaction()?;
  for table in catalog.tables().iter().rev() {
    tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", quote(table.name)))?;
  }
  tx.execute_batch("PRAGMA user_version = 0;")?;
  tx.commit()?;
  info!(tables = catalog.tables().len(), "schema dropped");
  Ok(())
}
