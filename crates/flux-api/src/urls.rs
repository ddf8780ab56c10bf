//! Handlers for the `/used-urls` ledger.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/used-urls?url=<url>` | `{"url":..,"used":bool}` |
//! | `POST` | `/used-urls` | Body: `{"url":".."}`; 409 if already recorded |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use flux_core::store::SportsStore;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct UrlParams {
  pub url: String,
}

#[derive(Debug, Serialize)]
pub struct UrlStatus {
  pub url:  String,
  pub used: bool,
}

/// `GET /used-urls?url=<url>`
pub async fn check<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<UrlParams>,
) -> Result<Json<UrlStatus>, ApiError>
where
  S: SportsStore,
{
  let used = store.is_url_used(params.url.clone()).await.map_err(ApiError::store)?;
  Ok(Json(UrlStatus { url: params.url, used }))
}

/// `POST /used-urls`
pub async fn mark<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<UrlParams>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SportsStore,
{
  let used = store.mark_url_used(body.url).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(used)))
}
