//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings (lexicographic order matches
//! chronological order for UTC values, which the `ORDER BY created_at`
//! clauses rely on). Tags are compact JSON. UUIDs are hyphenated lowercase
//! strings.

use agora_core::model::{
  Discussion, Notification, NotificationKind, Reply, TargetKind,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── TargetKind ──────────────────────────────────────────────────────────────

pub fn encode_target_kind(k: TargetKind) -> &'static str { k.as_str() }

pub fn decode_target_kind(s: &str) -> Result<TargetKind> {
  match s {
    "discussion" => Ok(TargetKind::Discussion),
    "reply" => Ok(TargetKind::Reply),
    other => Err(Error::UnknownDiscriminant(other.to_string())),
  }
}

// ─── NotificationKind ────────────────────────────────────────────────────────

pub fn encode_notification_kind(k: NotificationKind) -> &'static str {
  k.as_str()
}

pub fn decode_notification_kind(s: &str) -> Result<NotificationKind> {
  match s {
    "reply" => Ok(NotificationKind::Reply),
    "like" => Ok(NotificationKind::Like),
    "mention" => Ok(NotificationKind::Mention),
    "bookmark" => Ok(NotificationKind::Bookmark),
    other => Err(Error::UnknownDiscriminant(other.to_string())),
  }
}

// ─── Tags ────────────────────────────────────────────────────────────────────

pub fn encode_tags(tags: &[String]) -> Result<String> {
  Ok(serde_json::to_string(tags)?)
}

pub fn decode_tags(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read from a `discussions` row plus its derived-count
/// subqueries.
pub struct RawDiscussion {
  pub discussion_id: String,
  pub author_id:     String,
  pub title:         String,
  pub content:       String,
  pub tags:          String,
  pub created_at:    String,
  pub updated_at:    String,
  pub likes_count:   i64,
  pub replies_count: i64,
}

impl RawDiscussion {
  pub fn into_discussion(self) -> Result<Discussion> {
    Ok(Discussion {
      discussion_id: decode_uuid(&self.discussion_id)?,
      author_id:     decode_uuid(&self.author_id)?,
      title:         self.title,
      content:       self.content,
      tags:          decode_tags(&self.tags)?,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
      likes_count:   self.likes_count.max(0) as u64,
      replies_count: self.replies_count.max(0) as u64,
    })
  }
}

/// Raw strings read from a `replies` row plus its like-count subquery.
pub struct RawReply {
  pub reply_id:      String,
  pub discussion_id: String,
  pub author_id:     String,
  pub content:       String,
  pub created_at:    String,
  pub updated_at:    String,
  pub likes_count:   i64,
}

impl RawReply {
  pub fn into_reply(self) -> Result<Reply> {
    Ok(Reply {
      reply_id:      decode_uuid(&self.reply_id)?,
      discussion_id: decode_uuid(&self.discussion_id)?,
      author_id:     decode_uuid(&self.author_id)?,
      content:       self.content,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
      likes_count:   self.likes_count.max(0) as u64,
    })
  }
}

/// Raw strings read from a `notifications` row.
pub struct RawNotification {
  pub notification_id: String,
  pub recipient_id:    String,
  pub sender_id:       String,
  pub kind:            String,
  pub discussion_id:   Option<String>,
  pub reply_id:        Option<String>,
  pub read:            bool,
  pub created_at:      String,
}

impl RawNotification {
  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      recipient_id:    decode_uuid(&self.recipient_id)?,
      sender_id:       decode_uuid(&self.sender_id)?,
      kind:            decode_notification_kind(&self.kind)?,
      discussion_id:   self
        .discussion_id
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
      reply_id:        self.reply_id.as_deref().map(decode_uuid).transpose()?,
      read:            self.read,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}
