//! Handlers for reply endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/api/discussions/:id/replies` | Paginated; `?page`, `?limit`, `?sort` |
//! | `POST`   | `/api/discussions/:id/replies` | Body: [`CreateBody`]; returns 201 |
//! | `PATCH`  | `/api/replies/:id` | Author only; body: [`EditBody`] |
//! | `DELETE` | `/api/replies/:id` | Author only; returns 204 |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use agora_core::{
  model::Reply,
  page::{Page, PageQuery},
  store::FactStore,
};

use crate::{AppState, error::ApiError, identity::Identity};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /api/discussions/:id/replies`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Path(discussion_id): Path<Uuid>,
  Query(query): Query<PageQuery>,
) -> Result<Json<Page<Reply>>, ApiError>
where
  S: FactStore + 'static,
{
  // A stale discussion id yields an empty page rather than a 404; the
  // discussion itself is fetched separately.
  let page = state
    .store
    .find_replies(discussion_id, query)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(page))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /api/discussions/:id/replies`.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub content: String,
}

/// `POST /api/discussions/:id/replies` — returns 201 + the stored reply.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(discussion_id): Path<Uuid>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: FactStore + 'static,
{
  let reply = state
    .coordinator
    .create_reply(identity.user_id, discussion_id, &body.content)
    .await?;
  Ok((StatusCode::CREATED, Json(reply)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `PATCH /api/replies/:id`.
#[derive(Debug, Deserialize)]
pub struct EditBody {
  pub content: String,
}

/// `PATCH /api/replies/:id`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(id): Path<Uuid>,
  Json(body): Json<EditBody>,
) -> Result<Json<Reply>, ApiError>
where
  S: FactStore + 'static,
{
  let reply = state
    .coordinator
    .edit_reply(identity.user_id, id, &body.content)
    .await?;
  Ok(Json(reply))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /api/replies/:id` — returns 204.
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: FactStore + 'static,
{
  state.coordinator.delete_reply(identity.user_id, id).await?;
  Ok(StatusCode::NO_CONTENT)
}
