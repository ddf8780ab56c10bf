//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use flux_core::{Error as CoreError, store::StoreError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The request collides with stored state: a unique value already taken,
  /// a reference to a missing row, or a delete blocked by a reference.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a backend error by its integrity variant.
  pub fn store<E: StoreError>(err: E) -> Self {
    let classified = match err.integrity() {
      Some(CoreError::NotFound { .. }) => Some(ApiError::NotFound(err.to_string())),
      Some(
        CoreError::UniqueConstraintViolation { .. }
        | CoreError::DuplicateAssociation { .. }
        | CoreError::ForeignKeyViolation { .. },
      ) => Some(ApiError::Conflict(err.to_string())),
      Some(e) if e.is_invalid_input() => Some(ApiError::BadRequest(err.to_string())),
      _ => None,
    };
    classified.unwrap_or_else(|| ApiError::Store(Box::new(err)))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = match &self {
      ApiError::NotFound(m) | ApiError::BadRequest(m) | ApiError::Conflict(m) => m.clone(),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store error");
        e.to_string()
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;

  #[test]
  fn integrity_errors_map_to_statuses() {
    let cases = [
      (CoreError::not_found("sport", Uuid::nil()), StatusCode::NOT_FOUND),
      (
        CoreError::UniqueConstraintViolation {
          table:   "sport",
          columns: "name".into(),
          value:   "\"Soccer\"".into(),
        },
        StatusCode::CONFLICT,
      ),
      (
        CoreError::DuplicateAssociation {
          table: "player_in_team",
          left:  Uuid::nil(),
          right: Uuid::nil(),
        },
        StatusCode::CONFLICT,
      ),
      (
        CoreError::ForeignKeyViolation {
          table:  "competition",
          column: "sport_id",
          detail: "no such sport".into(),
        },
        StatusCode::CONFLICT,
      ),
      (
        CoreError::UnknownColumn { table: "sport", column: "colour".into() },
        StatusCode::BAD_REQUEST,
      ),
    ];

    for (err, status) in cases {
      assert_eq!(ApiError::store(err).status(), status);
    }
  }

  #[test]
  fn serialization_failures_are_server_errors() {
    let err = serde_json::from_str::<u8>("x").unwrap_err();
    let api = ApiError::store(CoreError::Serialization(err));
    assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
  }
}
