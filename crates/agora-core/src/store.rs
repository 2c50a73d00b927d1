//! The `FactStore` trait and write-outcome types.
//!
//! The trait is implemented by storage backends (e.g. `agora-store-sqlite`).
//! Higher layers (`agora-sync`, `agora-server`) depend on this abstraction,
//! not on any concrete backend.
//!
//! Toggle semantics hinge on one property: every write guarded by a
//! uniqueness constraint reports *whether that constraint fired* as data
//! ([`InsertOutcome`], [`UpsertOutcome`]) rather than as an error. Any other
//! storage failure is an `Err`.

use std::future::Future;

use uuid::Uuid;

use crate::{
  model::{
    Discussion, DiscussionPatch, LikeTarget, NewDiscussion, NewNotification,
    NewReply, Notification, Reply,
  },
  page::{Page, PageQuery},
};

// ─── Write outcomes ──────────────────────────────────────────────────────────

/// Result of inserting a row guarded by a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
  Inserted,
  /// The row already existed; nothing was written. For toggles this means
  /// "flip off instead".
  UniqueViolation,
}

impl InsertOutcome {
  pub fn inserted(self) -> bool { matches!(self, Self::Inserted) }
}

/// Result of upserting a notification on its identity tuple.
#[derive(Debug, Clone)]
pub enum UpsertOutcome {
  /// A new row was created.
  Created(Notification),
  /// An identical row already existed; it was not touched (not even its
  /// `read` flag).
  Existing,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an Agora fact-store backend.
///
/// Aggregate counts are never stored: paginated reads compute
/// `likes_count`/`replies_count` from the fact tables, and `count_likes` /
/// `count_replies` re-derive them after a mutation so callers can stamp
/// events with values that cannot drift.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait FactStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Discussions ───────────────────────────────────────────────────────

  /// Create and persist a new discussion; the store assigns id and
  /// timestamps.
  fn insert_discussion(
    &self,
    input: NewDiscussion,
  ) -> impl Future<Output = Result<Discussion, Self::Error>> + Send + '_;

  /// Retrieve a discussion by id, with derived counts. `None` if absent.
  fn find_discussion(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Discussion>, Self::Error>> + Send + '_;

  /// Apply a partial update and bump `updated_at`. Returns the updated
  /// discussion, or `None` if the id does not resolve.
  fn update_discussion(
    &self,
    id: Uuid,
    patch: DiscussionPatch,
  ) -> impl Future<Output = Result<Option<Discussion>, Self::Error>> + Send + '_;

  /// Delete a discussion and cascade: its replies, all likes targeting it
  /// or its replies, and bookmarks referencing it — in one transaction.
  /// Notifications survive (append-only audit). Returns `false` if absent.
  fn delete_discussion(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Paginated, sorted read over all discussions.
  fn find_discussions(
    &self,
    query: PageQuery,
  ) -> impl Future<Output = Result<Page<Discussion>, Self::Error>> + Send + '_;

  // ── Replies ───────────────────────────────────────────────────────────

  /// Create and persist a reply under an existing discussion.
  fn insert_reply(
    &self,
    input: NewReply,
  ) -> impl Future<Output = Result<Reply, Self::Error>> + Send + '_;

  fn find_reply(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Reply>, Self::Error>> + Send + '_;

  /// Replace a reply's content and bump `updated_at`. `None` if absent.
  fn update_reply(
    &self,
    id: Uuid,
    content: String,
  ) -> impl Future<Output = Result<Option<Reply>, Self::Error>> + Send + '_;

  /// Delete a reply and the likes targeting it. Returns `false` if absent.
  fn delete_reply(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Paginated, sorted read over one discussion's replies.
  fn find_replies(
    &self,
    discussion_id: Uuid,
    query: PageQuery,
  ) -> impl Future<Output = Result<Page<Reply>, Self::Error>> + Send + '_;

  /// Count of replies under a discussion, derived from the reply table.
  fn count_replies(
    &self,
    discussion_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Likes ─────────────────────────────────────────────────────────────

  /// Insert a like unless the `(user, target)` pair already holds one.
  fn insert_like(
    &self,
    user_id: Uuid,
    target: LikeTarget,
  ) -> impl Future<Output = Result<InsertOutcome, Self::Error>> + Send + '_;

  /// Remove a like if present. Returns whether a row was deleted.
  fn delete_like(
    &self,
    user_id: Uuid,
    target: LikeTarget,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Count of like facts for a target, derived from the like table.
  fn count_likes(
    &self,
    target: LikeTarget,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Bookmarks ─────────────────────────────────────────────────────────

  fn insert_bookmark(
    &self,
    user_id: Uuid,
    discussion_id: Uuid,
  ) -> impl Future<Output = Result<InsertOutcome, Self::Error>> + Send + '_;

  fn delete_bookmark(
    &self,
    user_id: Uuid,
    discussion_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Ids of every discussion the user has bookmarked.
  fn bookmarked_discussion_ids(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// Paginated read over the user's bookmarked discussions.
  fn find_bookmarked_discussions(
    &self,
    user_id: Uuid,
    query: PageQuery,
  ) -> impl Future<Output = Result<Page<Discussion>, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  /// Insert a notification unless its identity tuple already exists.
  /// An existing row is left entirely untouched — no duplicate, no
  /// re-unread.
  fn upsert_notification(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<UpsertOutcome, Self::Error>> + Send + '_;

  /// The recipient's notifications, newest first.
  fn find_notifications(
    &self,
    recipient_id: Uuid,
    query: PageQuery,
  ) -> impl Future<Output = Result<Page<Notification>, Self::Error>> + Send + '_;

  /// Mark one notification read. The recipient guard means a caller can
  /// only mark their own rows; returns `false` if nothing matched.
  fn mark_notification_read(
    &self,
    recipient_id: Uuid,
    notification_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Mark all of the recipient's notifications read; returns how many rows
  /// changed.
  fn mark_all_notifications_read(
    &self,
    recipient_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn count_unread_notifications(
    &self,
    recipient_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
