//! Generic CRUD handlers, instantiated once per entity resource.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/{resource}` | `?column=value` equality filters, `limit`, `offset` |
//! | `POST`   | `/{resource}` | Body: the row image; id and timestamps optional |
//! | `GET`    | `/{resource}/{id}` | 404 if not found |
//! | `PATCH`  | `/{resource}/{id}` | Body: `{"set":{..},"edit":[..]}` |
//! | `DELETE` | `/{resource}/{id}` | Returns the delete report |

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
  routing::get,
};
use flux_core::{
  changes::{Changes, TIMESTAMP_FORMAT},
  entity::{Entity, utc_now},
  query::Filter,
  schema::{CREATED_AT, ColumnKind, Table, UPDATED_AT},
  store::{DeleteReport, SportsStore},
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ApiError;

/// Mount the five CRUD routes for `E` under `/{name}`.
pub fn routes<S, E>(router: Router<Arc<S>>, name: &str) -> Router<Arc<S>>
where
  S: SportsStore + 'static,
  E: Entity,
{
  router
    .route(&format!("/{name}"), get(list::<S, E>).post(create::<S, E>))
    .route(
      &format!("/{name}/{{id}}"),
      get(get_one::<S, E>).patch(update::<S, E>).delete(remove::<S, E>),
    )
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /{resource}[?column=value&limit=n&offset=n]`
pub async fn list<S, E>(
  State(store): State<Arc<S>>,
  Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<E>>, ApiError>
where
  S: SportsStore,
  E: Entity,
{
  let filter = filter_from_query(E::TABLE, params)?;
  let rows = store.find::<E>(filter).await.map_err(ApiError::store)?;
  Ok(Json(rows))
}

/// Query parameters become equality conditions, typed by the column they
/// name. The literal `null` matches NULL in nullable columns.
fn filter_from_query(table: &Table, params: Vec<(String, String)>) -> Result<Filter, ApiError> {
  let mut filter = Filter::new();
  for (key, raw) in params {
    match key.as_str() {
      "limit" => filter = filter.limit(parse_count(&key, &raw)?),
      "offset" => filter = filter.offset(parse_count(&key, &raw)?),
      _ => {
        let column = table.column(&key).ok_or_else(|| {
          ApiError::BadRequest(format!("unknown column {}.{key}", table.name))
        })?;
        let value = if column.nullable && raw == "null" {
          Value::Null
        } else {
          match column.kind {
            ColumnKind::Integer => raw
              .parse::<i64>()
              .map(Value::from)
              .map_err(|e| ApiError::BadRequest(format!("{key}: {e}")))?,
            ColumnKind::Json => serde_json::from_str(&raw)
              .map_err(|e| ApiError::BadRequest(format!("{key}: {e}")))?,
            _ => Value::String(raw),
          }
        };
        filter = filter.eq(key, value);
      }
    }
  }
  Ok(filter)
}

fn parse_count(key: &str, raw: &str) -> Result<usize, ApiError> {
  raw
    .parse()
    .map_err(|_| ApiError::BadRequest(format!("{key} must be a non-negative integer")))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /{resource}`
pub async fn create<S, E>(
  State(store): State<Arc<S>>,
  Json(body): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SportsStore,
  E: Entity,
{
  let entity: E = serde_json::from_value(Value::Object(with_defaults(E::TABLE, body)))
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
  let created = store.create(entity).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(created)))
}

/// Fill what the store assigns itself: a nil id asks for a fresh one and
/// both timestamps are overwritten on insert.
fn with_defaults(table: &Table, mut body: Map<String, Value>) -> Map<String, Value> {
  if !table.is_join() {
    body
      .entry(table.key())
      .or_insert_with(|| Value::String(Uuid::nil().to_string()));
  }
  if table.has_timestamps() {
    let now = Value::String(utc_now().format(TIMESTAMP_FORMAT).to_string());
    for column in [CREATED_AT, UPDATED_AT] {
      body.entry(column).or_insert_with(|| now.clone());
    }
  }
  body
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /{resource}/{id}`
pub async fn get_one<S, E>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<E>, ApiError>
where
  S: SportsStore,
  E: Entity,
{
  let entity = store
    .get::<E>(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("{} not found: {id}", E::TABLE.name)))?;
  Ok(Json(entity))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /{resource}/{id}`
pub async fn update<S, E>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(changes): Json<Changes>,
) -> Result<Json<E>, ApiError>
where
  S: SportsStore,
  E: Entity,
{
  let entity = store.update::<E>(id, changes).await.map_err(ApiError::store)?;
  Ok(Json(entity))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /{resource}/{id}`
pub async fn remove<S, E>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<DeleteReport>, ApiError>
where
  S: SportsStore,
  E: Entity,
{
  let report = store.delete::<E>(id).await.map_err(ApiError::store)?;
  tracing::debug!(table = E::TABLE.name, %id, deleted = report.total_deleted(), "deleted");
  Ok(Json(report))
}

#[cfg(test)]
mod tests {
  use flux_core::schema::{MATCH, TEAM_MEMBER};

  use super::*;

  fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  #[test]
  fn query_values_follow_column_kinds() {
    let filter = filter_from_query(
      &TEAM_MEMBER,
      params(&[("age", "27"), ("nickname", "s1mple"), ("country", "null"), ("limit", "5")]),
    )
    .unwrap();

    assert_eq!(filter.conditions, vec![
      ("age".to_string(), Value::from(27)),
      ("nickname".to_string(), Value::from("s1mple")),
      ("country".to_string(), Value::Null),
    ]);
    assert_eq!(filter.limit, Some(5));
  }

  #[test]
  fn unknown_columns_and_bad_numbers_are_rejected() {
    assert!(matches!(
      filter_from_query(&MATCH, params(&[("colour", "red")])),
      Err(ApiError::BadRequest(_))
    ));
    assert!(matches!(
      filter_from_query(&TEAM_MEMBER, params(&[("age", "old")])),
      Err(ApiError::BadRequest(_))
    ));
    assert!(matches!(
      filter_from_query(&MATCH, params(&[("offset", "-1")])),
      Err(ApiError::BadRequest(_))
    ));
  }

  #[test]
  fn defaults_fill_only_missing_keys() {
    let mut body = Map::new();
    body.insert("match_name".into(), Value::from("A vs B"));
    body.insert("created_at".into(), Value::from("2024-01-01T00:00:00"));

    let filled = with_defaults(&MATCH, body);
    assert_eq!(filled["match_id"], Value::from(Uuid::nil().to_string()));
    assert_eq!(filled["created_at"], "2024-01-01T00:00:00");
    assert!(filled["updated_at"].is_string());
  }
}
