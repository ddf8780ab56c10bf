//! Handlers for `/links` endpoints: rows of the many-to-many join tables.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/links/{association}` | `?side=left\|right&id=<uuid>` |
//! | `POST`   | `/links/{association}` | Body: `{"left":..,"right":..,"attrs":{..}}` |
//! | `PATCH`  | `/links/{association}/{left}/{right}` | Body: a change set for the attributes |
//! | `DELETE` | `/links/{association}/{left}/{right}` | 404 if the pair is not linked |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use flux_core::{
  association::{Association, Link, Side},
  changes::Changes,
  store::SportsStore,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ApiError;

fn association(name: &str) -> Result<Association, ApiError> {
  name
    .parse()
    .map_err(|_| ApiError::NotFound(format!("no association named {name:?}")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub side: Side,
  pub id:   Uuid,
}

/// `GET /links/{association}?side=<side>&id=<uuid>`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Path(name): Path<String>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Link>>, ApiError>
where
  S: SportsStore,
{
  let links = store
    .links(association(&name)?, params.side, params.id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(links))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub left:  Uuid,
  pub right: Uuid,
  #[serde(default)]
  pub attrs: Map<String, Value>,
}

/// `POST /links/{association}`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Path(name): Path<String>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SportsStore,
{
  let link = Link { attrs: body.attrs, ..Link::new(association(&name)?, body.left, body.right) };
  let link = store.attach(link).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(link)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /links/{association}/{left}/{right}`
pub async fn update<S>(
  State(store): State<Arc<S>>,
  Path((name, left, right)): Path<(String, Uuid, Uuid)>,
  Json(changes): Json<Changes>,
) -> Result<Json<Link>, ApiError>
where
  S: SportsStore,
{
  let link = store
    .update_link(association(&name)?, left, right, changes)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(link))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /links/{association}/{left}/{right}`
pub async fn remove<S>(
  State(store): State<Arc<S>>,
  Path((name, left, right)): Path<(String, Uuid, Uuid)>,
) -> Result<StatusCode, ApiError>
where
  S: SportsStore,
{
  store
    .detach(association(&name)?, left, right)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}
