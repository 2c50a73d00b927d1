//! Handlers for notification endpoints. All of them operate on the caller's
//! own rows; there is no way to read or mark another user's notifications.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/notifications` | Newest first; `?page`, `?limit` |
//! | `GET`  | `/api/notifications/unread-count` | `{"unread": n}` |
//! | `POST` | `/api/notifications/:id/read` | Returns 204, or 404 if not the caller's |
//! | `POST` | `/api/notifications/read-all` | `{"updated": n}` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use serde::Serialize;
use uuid::Uuid;

use agora_core::{
  model::Notification,
  page::{Page, PageQuery},
  store::FactStore,
};

use crate::{AppState, error::ApiError, identity::Identity};

/// `GET /api/notifications`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Query(query): Query<PageQuery>,
) -> Result<Json<Page<Notification>>, ApiError>
where
  S: FactStore + 'static,
{
  let page = state
    .store
    .find_notifications(identity.user_id, query)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(page))
}

/// Response to `GET /api/notifications/unread-count`.
#[derive(Debug, Serialize)]
pub struct UnreadCount {
  pub unread: u64,
}

/// `GET /api/notifications/unread-count`
pub async fn unread_count<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
) -> Result<Json<UnreadCount>, ApiError>
where
  S: FactStore + 'static,
{
  let unread = state
    .store
    .count_unread_notifications(identity.user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(UnreadCount { unread }))
}

/// `POST /api/notifications/:id/read` — returns 204.
pub async fn mark_read<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: FactStore + 'static,
{
  let marked = state
    .store
    .mark_notification_read(identity.user_id, id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  if !marked {
    return Err(ApiError::NotFound(format!("notification {id} not found")));
  }
  Ok(StatusCode::NO_CONTENT)
}

/// Response to `POST /api/notifications/read-all`.
#[derive(Debug, Serialize)]
pub struct ReadAll {
  pub updated: u64,
}

/// `POST /api/notifications/read-all`
pub async fn mark_all_read<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
) -> Result<Json<ReadAll>, ApiError>
where
  S: FactStore + 'static,
{
  let updated = state
    .store
    .mark_all_notifications_read(identity.user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(ReadAll { updated }))
}
