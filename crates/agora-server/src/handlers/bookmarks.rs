//! Handlers for bookmark endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/discussions/:id/bookmark` | Toggle; returns the landed state |
//! | `GET`  | `/api/bookmarks` | The caller's bookmarked discussions, paginated |
//! | `GET`  | `/api/bookmarks/ids` | Just the ids — used to seed client state |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Serialize;
use uuid::Uuid;

use agora_core::{
  model::Discussion,
  page::{Page, PageQuery},
  store::FactStore,
};

use crate::{AppState, error::ApiError, identity::Identity};

/// Response to a bookmark toggle.
#[derive(Debug, Serialize)]
pub struct BookmarkState {
  pub bookmarked: bool,
}

/// `POST /api/discussions/:id/bookmark`
pub async fn toggle<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(discussion_id): Path<Uuid>,
) -> Result<Json<BookmarkState>, ApiError>
where
  S: FactStore + 'static,
{
  let toggle = state
    .coordinator
    .toggle_bookmark(identity.user_id, discussion_id)
    .await?;
  Ok(Json(BookmarkState {
    bookmarked: toggle.bookmarked,
  }))
}

/// `GET /api/bookmarks`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Query(query): Query<PageQuery>,
) -> Result<Json<Page<Discussion>>, ApiError>
where
  S: FactStore + 'static,
{
  let page = state
    .store
    .find_bookmarked_discussions(identity.user_id, query)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(page))
}

/// `GET /api/bookmarks/ids`
pub async fn ids<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
) -> Result<Json<Vec<Uuid>>, ApiError>
where
  S: FactStore + 'static,
{
  let ids = state
    .store
    .bookmarked_discussion_ids(identity.user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(ids))
}
