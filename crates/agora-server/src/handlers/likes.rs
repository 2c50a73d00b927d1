//! Handler for the like toggle.
//!
//! `POST /api/likes` with `{"target_kind": "discussion"|"reply",
//! "target_id": "<uuid>"}`. The same request body toggles the like on and
//! off; the response reports which state it landed on and the recomputed
//! count. A duplicate-unique conflict inside the store is never surfaced —
//! it is the "already liked, flip off" half of the toggle.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agora_core::{
  model::{LikeTarget, TargetKind},
  store::FactStore,
};

use crate::{AppState, error::ApiError, identity::Identity};

/// JSON body accepted by `POST /api/likes`.
#[derive(Debug, Deserialize)]
pub struct ToggleBody {
  pub target_kind: TargetKind,
  pub target_id:   Uuid,
}

/// Response to a like toggle.
#[derive(Debug, Serialize)]
pub struct LikeState {
  pub liked:       bool,
  pub likes_count: u64,
}

/// `POST /api/likes`
pub async fn toggle<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Json(body): Json<ToggleBody>,
) -> Result<Json<LikeState>, ApiError>
where
  S: FactStore + 'static,
{
  let toggle = state
    .coordinator
    .toggle_like(identity.user_id, LikeTarget {
      kind: body.target_kind,
      id:   body.target_id,
    })
    .await?;
  Ok(Json(LikeState {
    liked:       toggle.liked,
    likes_count: toggle.likes_count,
  }))
}
