//! [`Session`]: every data-access operation, executed synchronously on one
//! connection inside one transaction.
//!
//! The session enforces integrity itself rather than leaning on SQLite's
//! error messages: uniques and foreign keys are checked before writing, and
//! deletes walk the catalog's foreign keys so each cascade can be counted.
//! The `ON DELETE` clauses in the DDL describe the same policy for anyone
//! writing to the database directly.

use std::fmt::Write as _;

use flux_core::{
  association::{Association, Link, Side},
  changes::Changes,
  entity::{Entity, new_id, utc_now},
  news::UsedUrl,
  query::Filter,
  schema::{CREATED_AT, Catalog, Column, ColumnKind, OnDelete, Table, UPDATED_AT, USED_URL},
  store::DeleteReport,
};
use rusqlite::{Connection, OptionalExtension as _, params_from_iter, types::Value as SqlValue};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{column_list, decode_row, encode, encode_ts, encode_uuid, quote},
};

type Row = Map<String, Value>;

/// Column/value pairs identifying one row: the primary key of an entity
/// table, or the member pair of a join table.
type Key = Vec<(&'static str, SqlValue)>;

pub struct Session<'c> {
  conn:    &'c Connection,
  catalog: &'static Catalog,
}

impl<'c> Session<'c> {
  pub(crate) fn new(conn: &'c Connection, catalog: &'static Catalog) -> Self {
    Self { conn, catalog }
  }

  pub fn catalog(&self) -> &'static Catalog { self.catalog }

  // ─── Entities ────────────────────────────────────────────────────────────

  pub fn create<E: Entity>(&self, entity: E) -> Result<E> {
    let row = self.insert_row(E::TABLE, to_row(E::TABLE.name, &entity)?)?;
    from_row(row)
  }

  pub fn get<E: Entity>(&self, id: Uuid) -> Result<Option<E>> {
    self.load_row(E::TABLE, &entity_key(E::TABLE, id))?.map(from_row).transpose()
  }

  pub fn require<E: Entity>(&self, id: Uuid) -> Result<E> {
    self
      .get::<E>(id)?
      .ok_or_else(|| flux_core::Error::not_found(E::TABLE.name, id).into())
  }

  pub fn find<E: Entity>(&self, filter: &Filter) -> Result<Vec<E>> {
    self.find_rows(E::TABLE, filter)?.into_iter().map(from_row).collect()
  }

  pub fn get_by<E: Entity>(&self, column: &str, value: impl Into<Value>) -> Result<Option<E>> {
    let filter = Filter::new().eq(column, value).limit(1);
    Ok(self.find::<E>(&filter)?.pop())
  }

  /// Like [`update_row`](Self::update_row), but the edited image must
  /// still deserialise as `E` before anything is written.
  pub fn update<E: Entity>(&self, id: Uuid, changes: &Changes) -> Result<E> {
    let key = entity_key(E::TABLE, id);
    let row = self.apply_update(E::TABLE, &key, changes, check_shape::<E>)?;
    from_row(row)
  }

  pub fn delete<E: Entity>(&self, id: Uuid) -> Result<DeleteReport> { self.delete_row(E::TABLE, id) }

  // ─── Associations ────────────────────────────────────────────────────────

  pub fn attach(&self, link: Link) -> Result<Link> {
    let assoc = link.association;
    let table = assoc.table();
    let mut row = Row::new();
    for (name, value) in link.attrs {
      if table.is_key_column(&name) {
        return Err(immutable(table, name));
      }
      row.insert(name, value);
    }
    row.insert(assoc.side(Side::Left).column.to_owned(), Value::String(link.left.to_string()));
    row.insert(assoc.side(Side::Right).column.to_owned(), Value::String(link.right.to_string()));

    let stored = self.insert_row(table, row)?;
    debug!(association = %assoc, left = %link.left, right = %link.right, "attached");
    link_from_row(assoc, stored)
  }

  pub fn detach(&self, association: Association, left: Uuid, right: Uuid) -> Result<()> {
    let table = association.table();
    let key = link_key(association, left, right);
    let removed = self.execute(
      &format!("DELETE FROM {} WHERE {}", quote(table.name), where_clause(&key, 1)),
      key.into_iter().map(|(_, v)| v).collect(),
    )?;
    if removed == 0 {
      return Err(flux_core::Error::not_found(table.name, format!("{left}/{right}")).into());
    }
    debug!(%association, %left, %right, "detached");
    Ok(())
  }

  pub fn links(&self, association: Association, side: Side, id: Uuid) -> Result<Vec<Link>> {
    let filter = Filter::new().eq(association.side(side).column, id.to_string());
    self
      .find_rows(association.table(), &filter)?
      .into_iter()
      .map(|row| link_from_row(association, row))
      .collect()
  }

  pub fn update_link(
    &self,
    association: Association,
    left: Uuid,
    right: Uuid,
    changes: &Changes,
  ) -> Result<Link> {
    let key = link_key(association, left, right);
    let row = self.update_row(association.table(), &key, changes)?;
    link_from_row(association, row)
  }

  /// Entities of type `E` linked to `id` on the other side of `association`.
  pub fn associated<E: Entity>(&self, association: Association, id: Uuid) -> Result<Vec<E>> {
    let side = association.side_of(E::TABLE)?;
    let own = association.side(side);
    let other = association.side(side.other());
    let table = E::TABLE;

    let columns = table
      .columns
      .iter()
      .map(|c| format!("e.{}", quote(c.name)))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!(
      "SELECT {columns} FROM {} e JOIN {} j ON j.{} = e.{} WHERE j.{} = ?1 ORDER BY j.rowid",
      quote(table.name),
      quote(association.table().name),
      quote(own.column),
      quote(table.key()),
      quote(other.column),
    );
    self
      .query_rows(table, &sql, vec![encode_uuid(id)])?
      .into_iter()
      .map(from_row)
      .collect()
  }

  // ─── Used URLs ───────────────────────────────────────────────────────────

  pub fn mark_url_used(&self, url: impl Into<String>) -> Result<UsedUrl> {
    self.create(UsedUrl::new(url))
  }

  pub fn is_url_used(&self, url: impl Into<String>) -> Result<bool> {
    self.exists(&USED_URL, &vec![("url", SqlValue::Text(url.into()))])
  }

  // ─── Row level ───────────────────────────────────────────────────────────

  /// Insert a row image. Missing columns are NULL; a nil or missing entity id
  /// is generated; timestamps are stamped with the current time.
  pub fn insert_row(&self, table: &'static Table, mut row: Row) -> Result<Row> {
    if let Some(unknown) = row.keys().find(|k| table.column(k).is_none()) {
      return Err(unknown_column(table, unknown));
    }

    if !table.is_join() {
      let needs_id = match row.get(table.key()) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => Uuid::parse_str(s).is_ok_and(|id| id.is_nil()),
        Some(_) => false,
      };
      if needs_id {
        row.insert(table.key().to_owned(), Value::String(new_id().to_string()));
      }
    }
    if table.has_timestamps() {
      let now = Value::String(encode_ts(utc_now()));
      row.insert(CREATED_AT.to_owned(), now.clone());
      row.insert(UPDATED_AT.to_owned(), now);
    }

    let values = encode_row(table, &row)?;
    self.check_foreign_keys(table, &values, None)?;

    let key = row_key(table, &values);
    if table.is_join() && self.exists(table, &key)? {
      return Err(
        flux_core::Error::DuplicateAssociation {
          table: table.name,
          left:  uuid_at(&row, table.primary_key[0])?,
          right: uuid_at(&row, table.primary_key[1])?,
        }
        .into(),
      );
    }
    self.check_unique(table, &values, None, None)?;

    let placeholders = (1..=values.len()).map(|i| format!("?{i}")).collect::<Vec<_>>();
    self.execute(
      &format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table.name),
        column_list(table),
        placeholders.join(", ")
      ),
      values,
    )?;

    self
      .load_row(table, &key)?
      .ok_or_else(|| flux_core::Error::not_found(table.name, describe(&key)).into())
  }

  pub fn find_rows(&self, table: &'static Table, filter: &Filter) -> Result<Vec<Row>> {
    let mut conditions = Vec::new();
    let mut params = Vec::new();
    for (name, value) in &filter.conditions {
      let column = table.column(name).ok_or_else(|| unknown_column(table, name))?;
      if value.is_null() {
        conditions.push(format!("{} IS NULL", quote(column.name)));
      } else {
        params.push(encode(table, column, value)?);
        conditions.push(format!("{} = ?{}", quote(column.name), params.len()));
      }
    }

    let mut sql = format!("SELECT {} FROM {}", column_list(table), quote(table.name));
    if !conditions.is_empty() {
      let _ = write!(sql, " WHERE {}", conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY rowid");
    if filter.limit.is_some() || filter.offset.is_some() {
      let limit = filter.limit.map_or(-1, |l| l as i64);
      let _ = write!(sql, " LIMIT {limit} OFFSET {}", filter.offset.unwrap_or(0));
    }
    self.query_rows(table, &sql, params)
  }

  /// Apply `changes` to the row identified by `key`. JSON edits operate on
  /// the stored document, read inside this transaction.
  pub fn update_row(&self, table: &'static Table, key: &Key, changes: &Changes) -> Result<Row> {
    self.apply_update(table, key, changes, |_, _| Ok(()))
  }

  fn apply_update(
    &self,
    table: &'static Table,
    key: &Key,
    changes: &Changes,
    check: impl Fn(&Row, &[&'static str]) -> Result<()>,
  ) -> Result<Row> {
    let mut row = self
      .load_row(table, key)?
      .ok_or_else(|| flux_core::Error::not_found(table.name, describe(key)))?;

    let mut touched: Vec<&'static str> = Vec::new();
    for (name, value) in &changes.set {
      let column = mutable_column(table, name)?;
      row.insert(column.name.to_owned(), value.clone());
      if !touched.contains(&column.name) {
        touched.push(column.name);
      }
    }
    for edit in &changes.edit {
      let column = mutable_column(table, &edit.column)?;
      if column.kind != ColumnKind::Json {
        return Err(
          flux_core::Error::InvalidValue {
            table:  table.name,
            column: column.name.to_owned(),
            reason: "json edits need a json column".into(),
          }
          .into(),
        );
      }
      let doc = row.entry(column.name).or_insert(Value::Null);
      edit.edit.apply(column.name, doc)?;
      if !touched.contains(&column.name) {
        touched.push(column.name);
      }
    }

    if touched.is_empty() {
      return Ok(row);
    }
    check(&row, &touched)?;
    if table.has_timestamps() {
      row.insert(UPDATED_AT.to_owned(), Value::String(encode_ts(utc_now())));
      touched.push(UPDATED_AT);
    }

    let values = encode_row(table, &row)?;
    self.check_foreign_keys(table, &values, Some(touched.as_slice()))?;
    self.check_unique(table, &values, Some(key), Some(touched.as_slice()))?;

    let mut params = Vec::new();
    let mut assignments = Vec::new();
    for name in &touched {
      params.push(value_at(table, &values, name).clone());
      assignments.push(format!("{} = ?{}", quote(name), params.len()));
    }
    let offset = params.len();
    params.extend(key.iter().map(|(_, v)| v.clone()));
    self.execute(
      &format!(
        "UPDATE {} SET {} WHERE {}",
        quote(table.name),
        assignments.join(", "),
        where_clause(key, offset + 1)
      ),
      params,
    )?;
    debug!(table = table.name, key = %describe(key), columns = ?touched, "updated");

    self
      .load_row(table, key)?
      .ok_or_else(|| flux_core::Error::not_found(table.name, describe(key)).into())
  }

  /// Delete an entity row and apply the delete policy of every foreign key
  /// that references it, recursively.
  pub fn delete_row(&self, table: &'static Table, id: Uuid) -> Result<DeleteReport> {
    if !self.exists(table, &entity_key(table, id))? {
      return Err(flux_core::Error::not_found(table.name, id).into());
    }
    let mut report = DeleteReport::default();
    self.cascade(table, id, &mut report)?;
    debug!(table = table.name, %id, ?report, "deleted");
    Ok(report)
  }

  fn cascade(&self, table: &'static Table, id: Uuid, report: &mut DeleteReport) -> Result<()> {
    let parent = encode_uuid(id);

    for (child, fk) in self.catalog.referencing(table.name) {
      let column = quote(fk.column);
      match fk.on_delete {
        OnDelete::Restrict => {
          let blocking: i64 = self.conn.query_row(
            &format!("SELECT count(*) FROM {} WHERE {column} = ?1", quote(child.name)),
            [&parent],
            |r| r.get(0),
          )?;
          if blocking > 0 {
            return Err(
              flux_core::Error::ForeignKeyViolation {
                table:  child.name,
                column: fk.column,
                detail: format!("{blocking} row(s) still reference {} {id}", table.name),
              }
              .into(),
            );
          }
        }
        OnDelete::Cascade if child.is_join() => {
          let removed = self.execute(
            &format!("DELETE FROM {} WHERE {column} = ?1", quote(child.name)),
            vec![parent.clone()],
          )?;
          trace!(table = child.name, removed, "join rows removed");
          report.record_deleted(child.name, removed);
        }
        OnDelete::Cascade => {
          let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} WHERE {column} = ?1",
            quote(child.key()),
            quote(child.name)
          ))?;
          let ids = stmt
            .query_map([&parent], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          for child_id in ids {
            self.cascade(child, Uuid::parse_str(&child_id)?, report)?;
          }
        }
        OnDelete::SetNull => {
          let (sql, params) = if child.has_timestamps() {
            (
              format!(
                "UPDATE {} SET {column} = NULL, {} = ?2 WHERE {column} = ?1",
                quote(child.name),
                quote(UPDATED_AT)
              ),
              vec![parent.clone(), SqlValue::Text(encode_ts(utc_now()))],
            )
          } else {
            (
              format!("UPDATE {} SET {column} = NULL WHERE {column} = ?1", quote(child.name)),
              vec![parent.clone()],
            )
          };
          let nulled = self.execute(&sql, params)?;
          report.record_nulled(child.name, fk.column, nulled);
        }
      }
    }

    let removed = self.execute(
      &format!("DELETE FROM {} WHERE {} = ?1", quote(table.name), quote(table.key())),
      vec![parent],
    )?;
    report.record_deleted(table.name, removed);
    Ok(())
  }

  // ─── Integrity checks ────────────────────────────────────────────────────

  fn check_foreign_keys(
    &self,
    table: &'static Table,
    values: &[SqlValue],
    touched: Option<&[&'static str]>,
  ) -> Result<()> {
    for fk in table.foreign_keys {
      if touched.is_some_and(|t| !t.contains(&fk.column)) {
        continue;
      }
      let value = value_at(table, values, fk.column);
      if *value == SqlValue::Null {
        continue;
      }
      let violation = |detail: String| -> Error {
        flux_core::Error::ForeignKeyViolation { table: table.name, column: fk.column, detail }.into()
      };
      let Some(parent) = self.catalog.table(fk.parent) else {
        return Err(violation(format!("unknown parent table {}", fk.parent)));
      };
      if !self.exists(parent, &vec![(parent.key(), value.clone())])? {
        return Err(violation(format!("{} {} does not exist", parent.name, display(value))));
      }
    }
    Ok(())
  }

  fn check_unique(
    &self,
    table: &'static Table,
    values: &[SqlValue],
    exclude: Option<&Key>,
    touched: Option<&[&'static str]>,
  ) -> Result<()> {
    for set in table.unique {
      if touched.is_some_and(|t| !set.iter().any(|c| t.contains(c))) {
        continue;
      }
      let key: Key = set.iter().map(|c| (*c, value_at(table, values, c).clone())).collect();
      // NULLs never collide.
      if key.iter().any(|(_, v)| *v == SqlValue::Null) {
        continue;
      }

      let mut sql = format!(
        "SELECT 1 FROM {} WHERE {}",
        quote(table.name),
        where_clause(&key, 1)
      );
      let mut params: Vec<SqlValue> = key.iter().map(|(_, v)| v.clone()).collect();
      if let Some(own) = exclude {
        let _ = write!(sql, " AND NOT ({})", where_clause(own, params.len() + 1));
        params.extend(own.iter().map(|(_, v)| v.clone()));
      }
      sql.push_str(" LIMIT 1");

      if self.query_exists(&sql, params)? {
        return Err(
          flux_core::Error::UniqueConstraintViolation {
            table:   table.name,
            columns: set.join(", "),
            value:   key.iter().map(|(_, v)| display(v)).collect::<Vec<_>>().join(", "),
          }
          .into(),
        );
      }
    }
    Ok(())
  }

  // ─── SQL plumbing ────────────────────────────────────────────────────────

  fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<usize> {
    trace!(sql, "execute");
    Ok(self.conn.execute(sql, params_from_iter(params))?)
  }

  fn query_rows(&self, table: &Table, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Row>> {
    trace!(sql, "query");
    let mut stmt = self.conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(params))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
      out.push(decode_row(table, row)?);
    }
    Ok(out)
  }

  fn query_exists(&self, sql: &str, params: Vec<SqlValue>) -> Result<bool> {
    trace!(sql, "query");
    Ok(
      self
        .conn
        .query_row(sql, params_from_iter(params), |_| Ok(()))
        .optional()?
        .is_some(),
    )
  }

  fn exists(&self, table: &Table, key: &Key) -> Result<bool> {
    self.query_exists(
      &format!("SELECT 1 FROM {} WHERE {} LIMIT 1", quote(table.name), where_clause(key, 1)),
      key.iter().map(|(_, v)| v.clone()).collect(),
    )
  }

  fn load_row(&self, table: &'static Table, key: &Key) -> Result<Option<Row>> {
    let sql = format!(
      "SELECT {} FROM {} WHERE {}",
      column_list(table),
      quote(table.name),
      where_clause(key, 1)
    );
    Ok(self.query_rows(table, &sql, key.iter().map(|(_, v)| v.clone()).collect())?.pop())
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn to_row<T: Serialize>(table: &'static str, value: &T) -> Result<Row> {
  match serde_json::to_value(value)? {
    Value::Object(map) => Ok(map),
    other => Err(
      flux_core::Error::InvalidValue {
        table,
        column: String::new(),
        reason: format!("row image must be an object, got {other}"),
      }
      .into(),
    ),
  }
}

fn from_row<T: DeserializeOwned>(row: Row) -> Result<T> { Ok(serde_json::from_value(Value::Object(row))?) }

/// An edit may leave a JSON column holding something the entity's field
/// cannot; report that as a bad value instead of a decode failure.
fn check_shape<E: Entity>(row: &Row, touched: &[&'static str]) -> Result<()> {
  match serde_json::from_value::<E>(Value::Object(row.clone())) {
    Ok(_) => Ok(()),
    Err(err) => Err(
      flux_core::Error::InvalidValue {
        table:  E::TABLE.name,
        column: touched.join(", "),
        reason: err.to_string(),
      }
      .into(),
    ),
  }
}

fn entity_key(table: &Table, id: Uuid) -> Key { vec![(table.key(), encode_uuid(id))] }

fn link_key(association: Association, left: Uuid, right: Uuid) -> Key {
  vec![
    (association.side(Side::Left).column, encode_uuid(left)),
    (association.side(Side::Right).column, encode_uuid(right)),
  ]
}

/// The primary key of an encoded row.
fn row_key(table: &Table, values: &[SqlValue]) -> Key {
  table
    .primary_key
    .iter()
    .map(|c| (*c, value_at(table, values, c).clone()))
    .collect()
}

fn link_from_row(association: Association, mut row: Row) -> Result<Link> {
  let left = uuid_at(&row, association.side(Side::Left).column)?;
  let right = uuid_at(&row, association.side(Side::Right).column)?;
  row.remove(association.side(Side::Left).column);
  row.remove(association.side(Side::Right).column);
  Ok(Link { association, left, right, attrs: row })
}

fn uuid_at(row: &Row, column: &str) -> Result<Uuid> {
  let raw = row.get(column).and_then(Value::as_str).unwrap_or_default();
  Ok(Uuid::parse_str(raw)?)
}

/// Encode every column of `row` in declaration order.
fn encode_row(table: &Table, row: &Row) -> Result<Vec<SqlValue>> {
  table
    .columns
    .iter()
    .map(|c| encode(table, c, row.get(c.name).unwrap_or(&Value::Null)))
    .collect()
}

fn value_at<'v>(table: &Table, values: &'v [SqlValue], column: &str) -> &'v SqlValue {
  table
    .columns
    .iter()
    .position(|c| c.name == column)
    .and_then(|idx| values.get(idx))
    .unwrap_or(&SqlValue::Null)
}

fn where_clause(key: &Key, first: usize) -> String {
  key
    .iter()
    .enumerate()
    .map(|(i, (c, _))| format!("{} = ?{}", quote(c), first + i))
    .collect::<Vec<_>>()
    .join(" AND ")
}

fn mutable_column(table: &'static Table, name: &str) -> Result<&'static Column> {
  let column = table.column(name).ok_or_else(|| unknown_column(table, name))?;
  if table.is_key_column(name) || name == CREATED_AT || name == UPDATED_AT {
    return Err(immutable(table, name));
  }
  Ok(column)
}

fn unknown_column(table: &Table, name: &str) -> Error {
  flux_core::Error::UnknownColumn { table: table.name, column: name.to_owned() }.into()
}

fn immutable(table: &Table, name: impl Into<String>) -> Error {
  flux_core::Error::ImmutableColumn { table: table.name, column: name.into() }.into()
}

fn display(value: &SqlValue) -> String {
  match value {
    SqlValue::Null => "NULL".into(),
    SqlValue::Integer(i) => i.to_string(),
    SqlValue::Real(f) => f.to_string(),
    SqlValue::Text(s) => s.clone(),
    SqlValue::Blob(b) => format!("<{} bytes>", b.len()),
  }
}

fn describe(key: &Key) -> String {
  key.iter().map(|(_, v)| display(v)).collect::<Vec<_>>().join("/")
}
