//! Async HTTP client wrapping the Agora JSON API.

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use agora_core::{
  model::{Discussion, LikeTarget, Notification, Reply},
  page::{Page, PageQuery, SortKey},
};

/// Connection settings for the Agora API. The user id is stamped onto every
/// request the way the identity gateway would.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub user_id:  Uuid,
}

/// Response to a like toggle.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LikeState {
  pub liked:       bool,
  pub likes_count: u64,
}

/// Response to a bookmark toggle.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BookmarkState {
  pub bookmarked: bool,
}

#[derive(Debug, Deserialize)]
struct UnreadCount {
  unread: u64,
}

#[derive(Debug, Deserialize)]
struct ReadAll {
  updated: u64,
}

fn sort_str(sort: SortKey) -> &'static str {
  match sort {
    SortKey::Recent => "recent",
    SortKey::MostLiked => "most_liked",
    SortKey::Oldest => "oldest",
  }
}

/// Async HTTP client for the Agora JSON REST API.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn get(&self, path: &str) -> reqwest::RequestBuilder {
    self
      .client
      .get(self.url(path))
      .header("x-user-id", self.config.user_id.to_string())
  }

  fn post(&self, path: &str) -> reqwest::RequestBuilder {
    self
      .client
      .post(self.url(path))
      .header("x-user-id", self.config.user_id.to_string())
  }

  async fn expect_json<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
    what: &str,
  ) -> Result<T> {
    if !resp.status().is_success() {
      return Err(anyhow!("{what} → {}", resp.status()));
    }
    resp
      .json()
      .await
      .with_context(|| format!("deserialising {what}"))
  }

  fn page_params(query: PageQuery) -> [(&'static str, String); 3] {
    [
      ("page", query.page.to_string()),
      ("limit", query.limit.to_string()),
      ("sort", sort_str(query.sort).to_string()),
    ]
  }

  // ── Discussions ───────────────────────────────────────────────────────────

  /// `GET /api/discussions`
  pub async fn list_discussions(&self, query: PageQuery) -> Result<Page<Discussion>> {
    let resp = self
      .get("/discussions")
      .query(&Self::page_params(query))
      .send()
      .await
      .context("GET /discussions failed")?;
    Self::expect_json(resp, "GET /discussions").await
  }

  /// `GET /api/discussions/:id`
  pub async fn get_discussion(&self, id: Uuid) -> Result<Discussion> {
    let resp = self
      .get(&format!("/discussions/{id}"))
      .send()
      .await
      .context("GET /discussions/:id failed")?;
    Self::expect_json(resp, "GET /discussions/:id").await
  }

  /// `POST /api/discussions`
  pub async fn create_discussion(
    &self,
    title: &str,
    content: &str,
    tags: &[String],
  ) -> Result<Discussion> {
    let resp = self
      .post("/discussions")
      .json(&json!({ "title": title, "content": content, "tags": tags }))
      .send()
      .await
      .context("POST /discussions failed")?;
    Self::expect_json(resp, "POST /discussions").await
  }

  // ── Replies ───────────────────────────────────────────────────────────────

  /// `GET /api/discussions/:id/replies`
  pub async fn list_replies(
    &self,
    discussion_id: Uuid,
    query: PageQuery,
  ) -> Result<Page<Reply>> {
    let resp = self
      .get(&format!("/discussions/{discussion_id}/replies"))
      .query(&Self::page_params(query))
      .send()
      .await
      .context("GET /discussions/:id/replies failed")?;
    Self::expect_json(resp, "GET /discussions/:id/replies").await
  }

  /// `POST /api/discussions/:id/replies`
  pub async fn create_reply(&self, discussion_id: Uuid, content: &str) -> Result<Reply> {
    let resp = self
      .post(&format!("/discussions/{discussion_id}/replies"))
      .json(&json!({ "content": content }))
      .send()
      .await
      .context("POST /discussions/:id/replies failed")?;
    Self::expect_json(resp, "POST /discussions/:id/replies").await
  }

  // ── Toggles ───────────────────────────────────────────────────────────────

  /// `POST /api/likes`
  pub async fn toggle_like(&self, target: LikeTarget) -> Result<LikeState> {
    let resp = self
      .post("/likes")
      .json(&json!({ "target_kind": target.kind, "target_id": target.id }))
      .send()
      .await
      .context("POST /likes failed")?;
    Self::expect_json(resp, "POST /likes").await
  }

  /// `POST /api/discussions/:id/bookmark`
  pub async fn toggle_bookmark(&self, discussion_id: Uuid) -> Result<BookmarkState> {
    let resp = self
      .post(&format!("/discussions/{discussion_id}/bookmark"))
      .send()
      .await
      .context("POST /discussions/:id/bookmark failed")?;
    Self::expect_json(resp, "POST /discussions/:id/bookmark").await
  }

  /// `GET /api/bookmarks/ids` — seeds the viewer's local bookmark set.
  pub async fn bookmark_ids(&self) -> Result<Vec<Uuid>> {
    let resp = self
      .get("/bookmarks/ids")
      .send()
      .await
      .context("GET /bookmarks/ids failed")?;
    Self::expect_json(resp, "GET /bookmarks/ids").await
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  /// `GET /api/notifications`
  pub async fn notifications(&self, query: PageQuery) -> Result<Page<Notification>> {
    let resp = self
      .get("/notifications")
      .query(&Self::page_params(query))
      .send()
      .await
      .context("GET /notifications failed")?;
    Self::expect_json(resp, "GET /notifications").await
  }

  /// `GET /api/notifications/unread-count`
  pub async fn unread_count(&self) -> Result<u64> {
    let resp = self
      .get("/notifications/unread-count")
      .send()
      .await
      .context("GET /notifications/unread-count failed")?;
    let count: UnreadCount =
      Self::expect_json(resp, "GET /notifications/unread-count").await?;
    Ok(count.unread)
  }

  /// `POST /api/notifications/read-all` — returns how many rows changed.
  pub async fn mark_all_read(&self) -> Result<u64> {
    let resp = self
      .post("/notifications/read-all")
      .send()
      .await
      .context("POST /notifications/read-all failed")?;
    let read: ReadAll = Self::expect_json(resp, "POST /notifications/read-all").await?;
    Ok(read.updated)
  }
}
