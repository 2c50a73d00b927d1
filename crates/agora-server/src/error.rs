//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use agora_sync::MutationError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// No usable identity headers on the request.
  #[error("unauthenticated")]
  Unauthenticated,

  /// The caller is authenticated but does not own the resource.
  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("invalid request: {0}")]
  Validation(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Unauthenticated => {
        (StatusCode::UNAUTHORIZED, "missing identity".to_string())
      }
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Validation(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

impl<E> From<MutationError<E>> for ApiError
where
  E: std::error::Error + Send + Sync + 'static,
{
  fn from(err: MutationError<E>) -> Self {
    match err {
      MutationError::Validation(m) => ApiError::Validation(m),
      MutationError::Unauthorized => {
        ApiError::Forbidden("not the resource owner".into())
      }
      MutationError::NotFound => ApiError::NotFound("target not found".into()),
      MutationError::Store(e) => ApiError::Store(Box::new(e)),
    }
  }
}
