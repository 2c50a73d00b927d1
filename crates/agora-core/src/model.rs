//! Domain types — the fact collections of the Agora discussion store.
//!
//! Discussions, replies, likes, and bookmarks are ground-truth facts;
//! notifications are derived from mutations on them. Aggregate counts
//! (`likes_count`, `replies_count`) are always computed from the fact tables,
//! never settable by callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Discussions ─────────────────────────────────────────────────────────────

/// A top-level discussion thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discussion {
  pub discussion_id: Uuid,
  pub author_id:     Uuid,
  pub title:         String,
  pub content:       String,
  /// Ordered and deduplicated; normalised to lowercase on write.
  pub tags:          Vec<String>,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
  /// Derived: count of like facts targeting this discussion.
  pub likes_count:   u64,
  /// Derived: count of replies under this discussion.
  pub replies_count: u64,
}

/// Input to [`crate::store::FactStore::insert_discussion`].
/// Ids and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewDiscussion {
  pub author_id: Uuid,
  pub title:     String,
  pub content:   String,
  pub tags:      Vec<String>,
}

/// Partial update for a discussion; `None` fields are left unchanged.
/// `updated_at` is bumped by the store whenever any field changes.
#[derive(Debug, Clone, Default)]
pub struct DiscussionPatch {
  pub title:   Option<String>,
  pub content: Option<String>,
  pub tags:    Option<Vec<String>>,
}

// ─── Replies ─────────────────────────────────────────────────────────────────

/// A reply within a discussion. `discussion_id` is immutable for the life of
/// the reply; the reply is removed when its parent discussion is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
  pub reply_id:      Uuid,
  pub discussion_id: Uuid,
  pub author_id:     Uuid,
  pub content:       String,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
  /// Derived: count of like facts targeting this reply.
  pub likes_count:   u64,
}

/// Input to [`crate::store::FactStore::insert_reply`].
#[derive(Debug, Clone)]
pub struct NewReply {
  pub discussion_id: Uuid,
  pub author_id:     Uuid,
  pub content:       String,
}

// ─── Likes ───────────────────────────────────────────────────────────────────

/// What a like points at.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
  Discussion,
  Reply,
}

impl TargetKind {
  /// The discriminant string stored in the `target_kind` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Discussion => "discussion",
      Self::Reply => "reply",
    }
  }
}

/// A like target: kind plus id. One user may hold at most one like per
/// target; a second identical like request is a toggle-off.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct LikeTarget {
  pub kind: TargetKind,
  pub id:   Uuid,
}

impl LikeTarget {
  pub fn discussion(id: Uuid) -> Self {
    Self { kind: TargetKind::Discussion, id }
  }

  pub fn reply(id: Uuid) -> Self {
    Self { kind: TargetKind::Reply, id }
  }
}

/// A like fact. Unique per `(user_id, target)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
  pub user_id:    Uuid,
  pub target:     LikeTarget,
  pub created_at: DateTime<Utc>,
}

// ─── Bookmarks ───────────────────────────────────────────────────────────────

/// A bookmark fact. Unique per `(user_id, discussion_id)`; created and
/// deleted only by the owning user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
  pub user_id:       Uuid,
  pub discussion_id: Uuid,
  pub created_at:    DateTime<Utc>,
}

// ─── Notifications ───────────────────────────────────────────────────────────

/// Why a notification exists. `Mention` and `Bookmark` are reserved kinds:
/// they are wire-compatible but nothing currently derives them.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
  Reply,
  Like,
  Mention,
  Bookmark,
}

impl NotificationKind {
  /// The discriminant string stored in the `kind` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Reply => "reply",
      Self::Like => "like",
      Self::Mention => "mention",
      Self::Bookmark => "bookmark",
    }
  }
}

/// A derived notification row. Unique per
/// `(recipient_id, kind, discussion_id, reply_id, sender_id)`; repeated
/// identical actions upsert onto the same row. Notifications are an
/// append-only audit of "it happened at least once" — removing the
/// triggering like or bookmark does not retract them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  pub recipient_id:    Uuid,
  pub sender_id:       Uuid,
  pub kind:            NotificationKind,
  pub discussion_id:   Option<Uuid>,
  pub reply_id:        Option<Uuid>,
  pub read:            bool,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::FactStore::upsert_notification`]. The identity
/// tuple is every field except the store-assigned id and timestamp.
#[derive(Debug, Clone)]
pub struct NewNotification {
  pub recipient_id:  Uuid,
  pub sender_id:     Uuid,
  pub kind:          NotificationKind,
  pub discussion_id: Option<Uuid>,
  pub reply_id:      Option<Uuid>,
}
