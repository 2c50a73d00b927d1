//! Typed events for the live push channel, and the commands clients send on
//! it. Wire format in both directions is `{"type": "...", "payload": {...}}`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Discussion, Notification, Reply, TargetKind};

// ─── Rooms ───────────────────────────────────────────────────────────────────

/// A broadcast scope. Connections join rooms explicitly; the per-user channel
/// is separate and implicit (see the broadcaster).
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Room {
  /// The discussion-list scope: discussion-level events and the reply
  /// traffic that changes `replies_count` on list entries.
  Lobby,
  /// One expanded discussion: its reply bodies and reply-like traffic.
  Discussion(Uuid),
}

// ─── Server events ───────────────────────────────────────────────────────────

/// A push event fanned out to room or user subscribers.
///
/// Delivery is at-least-once and unordered across targets; consumers must
/// merge idempotently (see `agora-client`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerEvent {
  #[serde(rename = "discussion.created")]
  DiscussionCreated { discussion: Discussion },

  #[serde(rename = "discussion.updated")]
  DiscussionUpdated { discussion: Discussion },

  #[serde(rename = "discussion.deleted")]
  DiscussionDeleted { discussion_id: Uuid },

  #[serde(rename = "reply.created")]
  ReplyCreated { reply: Reply },

  #[serde(rename = "reply.updated")]
  ReplyUpdated { reply: Reply },

  #[serde(rename = "reply.deleted")]
  ReplyDeleted {
    discussion_id: Uuid,
    reply_id:      Uuid,
  },

  #[serde(rename = "like.updated")]
  LikeUpdated {
    target_kind:   TargetKind,
    target_id:     Uuid,
    /// The discussion the target lives in; equals `target_id` when the
    /// target is the discussion itself.
    discussion_id: Uuid,
    /// Absolute value recomputed from the like facts, never a delta.
    likes_count:   u64,
  },

  #[serde(rename = "bookmark.updated")]
  BookmarkUpdated {
    discussion_id: Uuid,
    bookmarked:    bool,
  },

  #[serde(rename = "notification.created")]
  NotificationCreated { notification: Notification },
}

// ─── Client commands ─────────────────────────────────────────────────────────

/// A command a client sends on its live connection. Room membership is the
/// only client-controlled subscription state; the user channel needs no
/// command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum ClientCommand {
  Join { room: Room },
  Leave { room: Room },
}

// ─── Tests ───────────────────────────────────────────────────────────────────
