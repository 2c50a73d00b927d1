//! Caller identity, as resolved by the identity layer in front of this
//! service.
//!
//! This service never sees credentials. An upstream gateway authenticates the
//! request and installs `x-user-id`; display-profile fields stay with the
//! identity provider and are looked up by clients as needed.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
  pub user_id: Uuid,
}

impl<S> FromRequestParts<S> for Identity
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    let user_id = parts
      .headers
      .get("x-user-id")
      .and_then(|v| v.to_str().ok())
      .and_then(|s| Uuid::parse_str(s).ok())
      .ok_or(ApiError::Unauthenticated)?;
    Ok(Self { user_id })
  }
}
