//! HTTP + WebSocket server for Agora.
//!
//! Exposes an axum [`Router`] backed by any [`FactStore`]: JSON REST
//! endpoints for paginated reads and coordinated writes, and the `/ws` live
//! channel for room- and user-scoped push events. Identity resolution and
//! TLS are the caller's responsibility (an upstream gateway installs the
//! `x-user-id` header).

pub mod error;
pub mod handlers;
pub mod identity;
pub mod ws;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, patch, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use agora_core::store::FactStore;
use agora_sync::{Coordinator, RoomBroadcaster};

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and the
/// `AGORA_*` environment.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:          String,
  #[serde(default = "default_port")]
  pub port:          u16,
  #[serde(default = "default_database_path")]
  pub database_path: PathBuf,
}

fn default_host() -> String { "127.0.0.1".into() }
const fn default_port() -> u16 { 8080 }
fn default_database_path() -> PathBuf { PathBuf::from("agora.db") }

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:          default_host(),
      port:          default_port(),
      database_path: default_database_path(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:       Arc<S>,
  pub coordinator: Arc<Coordinator<S>>,
  pub rooms:       Arc<RoomBroadcaster>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:       Arc::clone(&self.store),
      coordinator: Arc::clone(&self.coordinator),
      rooms:       Arc::clone(&self.rooms),
    }
  }
}

impl<S: FactStore> AppState<S> {
  /// Wire a store to a fresh broadcaster and coordinator.
  pub fn new(store: Arc<S>) -> Self {
    let rooms = Arc::new(RoomBroadcaster::new());
    let coordinator =
      Arc::new(Coordinator::new(Arc::clone(&store), Arc::clone(&rooms)));
    Self { store, coordinator, rooms }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the Agora server.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: FactStore + 'static,
{
  use handlers::{bookmarks, discussions, likes, notifications, replies};

  Router::new()
    // Discussions
    .route(
      "/api/discussions",
      get(discussions::list::<S>).post(discussions::create::<S>),
    )
    .route(
      "/api/discussions/{id}",
      get(discussions::get_one::<S>)
        .patch(discussions::update::<S>)
        .delete(discussions::remove::<S>),
    )
    // Replies
    .route(
      "/api/discussions/{id}/replies",
      get(replies::list::<S>).post(replies::create::<S>),
    )
    .route(
      "/api/replies/{id}",
      patch(replies::update::<S>).delete(replies::remove::<S>),
    )
    // Toggles
    .route("/api/likes", post(likes::toggle::<S>))
    .route("/api/discussions/{id}/bookmark", post(bookmarks::toggle::<S>))
    // Bookmarks
    .route("/api/bookmarks", get(bookmarks::list::<S>))
    .route("/api/bookmarks/ids", get(bookmarks::ids::<S>))
    // Notifications
    .route("/api/notifications", get(notifications::list::<S>))
    .route(
      "/api/notifications/unread-count",
      get(notifications::unread_count::<S>),
    )
    .route(
      "/api/notifications/{id}/read",
      post(notifications::mark_read::<S>),
    )
    .route(
      "/api/notifications/read-all",
      post(notifications::mark_all_read::<S>),
    )
    // Live channel
    .route("/ws", get(ws::handler::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use agora_store_sqlite::SqliteStore;
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;

  async fn make_state() -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AppState::new(Arc::new(store))
  }

  async fn send(
    state: AppState<SqliteStore>,
    method: &str,
    uri:    &str,
    user:   Option<Uuid>,
    body:   Option<Value>,
  ) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
      builder = builder.header("x-user-id", user.to_string());
    }
    let req = match body {
      Some(json) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    router(state).oneshot(req).await.unwrap()
  }

  async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn discussion_body(title: &str) -> Value {
    json!({
      "title": title,
      "content": "an integration-test body comfortably past the minimum",
      "tags": ["Test", "test"],
    })
  }

  // ── Identity ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn writes_without_identity_return_401() {
    let state = make_state().await;
    let resp = send(
      state,
      "POST",
      "/api/discussions",
      None,
      Some(discussion_body("a title without identity")),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  // ── Discussions ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_then_list_discussions() {
    let state = make_state().await;
    let author = Uuid::new_v4();

    let resp = send(
      state.clone(),
      "POST",
      "/api/discussions",
      Some(author),
      Some(discussion_body("a created discussion")),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    assert_eq!(created["tags"], json!(["test"]));

    let resp = send(
      state,
      "GET",
      "/api/discussions?page=1&limit=10&sort=recent",
      None,
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_json(resp).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["has_more"], false);
    assert_eq!(page["items"][0]["discussion_id"], created["discussion_id"]);
  }

  #[tokio::test]
  async fn short_title_returns_422() {
    let state = make_state().await;
    let resp = send(
      state,
      "POST",
      "/api/discussions",
      Some(Uuid::new_v4()),
      Some(discussion_body("short")),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  }

  #[tokio::test]
  async fn patch_by_stranger_returns_403() {
    let state = make_state().await;
    let author = Uuid::new_v4();

    let resp = send(
      state.clone(),
      "POST",
      "/api/discussions",
      Some(author),
      Some(discussion_body("an ownable discussion")),
    )
    .await;
    let id = body_json(resp).await["discussion_id"]
      .as_str()
      .unwrap()
      .to_string();

    let resp = send(
      state,
      "PATCH",
      &format!("/api/discussions/{id}"),
      Some(Uuid::new_v4()),
      Some(json!({"title": "a stranger's new title"})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn delete_then_get_returns_404() {
    let state = make_state().await;
    let author = Uuid::new_v4();

    let resp = send(
      state.clone(),
      "POST",
      "/api/discussions",
      Some(author),
      Some(discussion_body("a doomed discussion")),
    )
    .await;
    let id = body_json(resp).await["discussion_id"]
      .as_str()
      .unwrap()
      .to_string();

    let resp = send(
      state.clone(),
      "DELETE",
      &format!("/api/discussions/{id}"),
      Some(author),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(
      state,
      "GET",
      &format!("/api/discussions/{id}"),
      None,
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn unknown_discussion_returns_404() {
    let state = make_state().await;
    let resp = send(
      state,
      "GET",
      &format!("/api/discussions/{}", Uuid::new_v4()),
      None,
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  // ── Replies ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn reply_create_and_paginate() {
    let state = make_state().await;
    let author = Uuid::new_v4();

    let resp = send(
      state.clone(),
      "POST",
      "/api/discussions",
      Some(author),
      Some(discussion_body("a discussion to reply to")),
    )
    .await;
    let id = body_json(resp).await["discussion_id"]
      .as_str()
      .unwrap()
      .to_string();

    for i in 0..3 {
      let resp = send(
        state.clone(),
        "POST",
        &format!("/api/discussions/{id}/replies"),
        Some(Uuid::new_v4()),
        Some(json!({"content": format!("reply number {i}")})),
      )
      .await;
      assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let resp = send(
      state.clone(),
      "GET",
      &format!("/api/discussions/{id}/replies?page=1&limit=2&sort=oldest"),
      None,
      None,
    )
    .await;
    let page = body_json(resp).await;
    assert_eq!(page["total"], 3);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    assert_eq!(page["has_more"], true);

    // The derived count follows the reply table.
    let resp = send(state, "GET", &format!("/api/discussions/{id}"), None, None).await;
    assert_eq!(body_json(resp).await["replies_count"], 3);
  }

  // ── Likes ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn like_toggle_round_trip() {
    let state = make_state().await;
    let author = Uuid::new_v4();
    let liker = Uuid::new_v4();

    let resp = send(
      state.clone(),
      "POST",
      "/api/discussions",
      Some(author),
      Some(discussion_body("a likeable discussion")),
    )
    .await;
    let id = body_json(resp).await["discussion_id"]
      .as_str()
      .unwrap()
      .to_string();
    let toggle = json!({"target_kind": "discussion", "target_id": id});

    let resp = send(
      state.clone(),
      "POST",
      "/api/likes",
      Some(liker),
      Some(toggle.clone()),
    )
    .await;
    let on = body_json(resp).await;
    assert_eq!(on["liked"], true);
    assert_eq!(on["likes_count"], 1);

    let resp = send(state, "POST", "/api/likes", Some(liker), Some(toggle)).await;
    let off = body_json(resp).await;
    assert_eq!(off["liked"], false);
    assert_eq!(off["likes_count"], 0);
  }

  // ── Bookmarks ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn bookmark_toggle_and_shelf() {
    let state = make_state().await;
    let user = Uuid::new_v4();

    let resp = send(
      state.clone(),
      "POST",
      "/api/discussions",
      Some(user),
      Some(discussion_body("a bookmarkable discussion")),
    )
    .await;
    let id = body_json(resp).await["discussion_id"]
      .as_str()
      .unwrap()
      .to_string();

    let resp = send(
      state.clone(),
      "POST",
      &format!("/api/discussions/{id}/bookmark"),
      Some(user),
      None,
    )
    .await;
    assert_eq!(body_json(resp).await["bookmarked"], true);

    let resp = send(state.clone(), "GET", "/api/bookmarks", Some(user), None).await;
    let shelf = body_json(resp).await;
    assert_eq!(shelf["total"], 1);

    let resp = send(state.clone(), "GET", "/api/bookmarks/ids", Some(user), None).await;
    assert_eq!(body_json(resp).await, json!([id]));

    let resp = send(
      state,
      "POST",
      &format!("/api/discussions/{id}/bookmark"),
      Some(user),
      None,
    )
    .await;
    assert_eq!(body_json(resp).await["bookmarked"], false);
  }

  // ── Notifications ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn notification_flow_over_rest() {
    let state = make_state().await;
    let author = Uuid::new_v4();
    let replier = Uuid::new_v4();

    let resp = send(
      state.clone(),
      "POST",
      "/api/discussions",
      Some(author),
      Some(discussion_body("a discussion that notifies")),
    )
    .await;
    let id = body_json(resp).await["discussion_id"]
      .as_str()
      .unwrap()
      .to_string();

    send(
      state.clone(),
      "POST",
      &format!("/api/discussions/{id}/replies"),
      Some(replier),
      Some(json!({"content": "a reply that notifies the author"})),
    )
    .await;

    let resp = send(
      state.clone(),
      "GET",
      "/api/notifications/unread-count",
      Some(author),
      None,
    )
    .await;
    assert_eq!(body_json(resp).await["unread"], 1);

    let resp = send(state.clone(), "GET", "/api/notifications", Some(author), None).await;
    let page = body_json(resp).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["kind"], "reply");

    let resp = send(
      state.clone(),
      "POST",
      "/api/notifications/read-all",
      Some(author),
      None,
    )
    .await;
    assert_eq!(body_json(resp).await["updated"], 1);

    let resp = send(
      state,
      "GET",
      "/api/notifications/unread-count",
      Some(author),
      None,
    )
    .await;
    assert_eq!(body_json(resp).await["unread"], 0);
  }
}
