//! Handlers for `/api/discussions` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/api/discussions` | Paginated; `?page`, `?limit`, `?sort` |
//! | `POST`   | `/api/discussions` | Body: [`CreateBody`]; returns 201 |
//! | `GET`    | `/api/discussions/:id` | Single discussion with derived counts |
//! | `PATCH`  | `/api/discussions/:id` | Author only; body: [`EditBody`] |
//! | `DELETE` | `/api/discussions/:id` | Author only; cascades; returns 204 |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use agora_core::{
  model::Discussion,
  page::{Page, PageQuery},
  store::FactStore,
};
use agora_sync::coordinator::{DiscussionDraft, DiscussionEdit};

use crate::{AppState, error::ApiError, identity::Identity};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /api/discussions?page=<n>&limit=<n>&sort=<recent|most_liked|oldest>`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(query): Query<PageQuery>,
) -> Result<Json<Page<Discussion>>, ApiError>
where
  S: FactStore + 'static,
{
  let page = state
    .store
    .find_discussions(query)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(page))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /api/discussions/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Discussion>, ApiError>
where
  S: FactStore + 'static,
{
  let discussion = state
    .store
    .find_discussion(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("discussion {id} not found")))?;
  Ok(Json(discussion))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /api/discussions`.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub title:   String,
  pub content: String,
  #[serde(default)]
  pub tags:    Vec<String>,
}

/// `POST /api/discussions` — returns 201 + the stored discussion.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: FactStore + 'static,
{
  let discussion = state
    .coordinator
    .create_discussion(identity.user_id, DiscussionDraft {
      title:   body.title,
      content: body.content,
      tags:    body.tags,
    })
    .await?;
  Ok((StatusCode::CREATED, Json(discussion)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `PATCH /api/discussions/:id`; absent fields are
/// left unchanged.
#[derive(Debug, Deserialize)]
pub struct EditBody {
  pub title:   Option<String>,
  pub content: Option<String>,
  pub tags:    Option<Vec<String>>,
}

/// `PATCH /api/discussions/:id`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(id): Path<Uuid>,
  Json(body): Json<EditBody>,
) -> Result<Json<Discussion>, ApiError>
where
  S: FactStore + 'static,
{
  let discussion = state
    .coordinator
    .edit_discussion(identity.user_id, id, DiscussionEdit {
      title:   body.title,
      content: body.content,
      tags:    body.tags,
    })
    .await?;
  Ok(Json(discussion))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /api/discussions/:id` — returns 204.
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: FactStore + 'static,
{
  state
    .coordinator
    .delete_discussion(identity.user_id, id)
    .await?;
  Ok(StatusCode::NO_CONTENT)
}
