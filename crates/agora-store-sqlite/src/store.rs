//! [`SqliteStore`] — the SQLite implementation of [`FactStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use agora_core::{
  model::{
    Discussion, DiscussionPatch, LikeTarget, NewDiscussion, NewNotification,
    NewReply, Notification, Reply,
  },
  page::{Page, PageQuery, SortKey},
  store::{FactStore, InsertOutcome, UpsertOutcome},
};

use crate::{
  Error, Result,
  encode::{
    RawDiscussion, RawNotification, RawReply, decode_uuid, encode_dt,
    encode_notification_kind, encode_tags, encode_target_kind, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Projections ─────────────────────────────────────────────────────────────

/// Discussion columns with the derived-count subqueries; the `d` alias is
/// fixed so the ORDER BY clauses below can reference both raw columns and
/// the computed `likes_count`.
const DISCUSSION_SELECT: &str = "
  SELECT
    d.discussion_id, d.author_id, d.title, d.content, d.tags,
    d.created_at, d.updated_at,
    (SELECT COUNT(*) FROM likes l
       WHERE l.target_kind = 'discussion'
         AND l.target_id   = d.discussion_id) AS likes_count,
    (SELECT COUNT(*) FROM replies r
       WHERE r.discussion_id = d.discussion_id) AS replies_count
  FROM discussions d";

/// Reply columns with the derived like-count subquery.
const REPLY_SELECT: &str = "
  SELECT
    p.reply_id, p.discussion_id, p.author_id, p.content,
    p.created_at, p.updated_at,
    (SELECT COUNT(*) FROM likes l
       WHERE l.target_kind = 'reply'
         AND l.target_id   = p.reply_id) AS likes_count
  FROM replies p";

fn discussion_order(sort: SortKey) -> &'static str {
  match sort {
    SortKey::Recent => "d.created_at DESC, d.discussion_id ASC",
    SortKey::MostLiked => "likes_count DESC, d.discussion_id ASC",
    SortKey::Oldest => "d.created_at ASC, d.discussion_id ASC",
  }
}

fn reply_order(sort: SortKey) -> &'static str {
  match sort {
    SortKey::Recent => "p.created_at DESC, p.reply_id ASC",
    SortKey::MostLiked => "likes_count DESC, p.reply_id ASC",
    SortKey::Oldest => "p.created_at ASC, p.reply_id ASC",
  }
}

fn row_to_raw_discussion(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDiscussion> {
  Ok(RawDiscussion {
    discussion_id: row.get(0)?,
    author_id:     row.get(1)?,
    title:         row.get(2)?,
    content:       row.get(3)?,
    tags:          row.get(4)?,
    created_at:    row.get(5)?,
    updated_at:    row.get(6)?,
    likes_count:   row.get(7)?,
    replies_count: row.get(8)?,
  })
}

fn row_to_raw_reply(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawReply> {
  Ok(RawReply {
    reply_id:      row.get(0)?,
    discussion_id: row.get(1)?,
    author_id:     row.get(2)?,
    content:       row.get(3)?,
    created_at:    row.get(4)?,
    updated_at:    row.get(5)?,
    likes_count:   row.get(6)?,
  })
}

fn row_to_raw_notification(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<RawNotification> {
  Ok(RawNotification {
    notification_id: row.get(0)?,
    recipient_id:    row.get(1)?,
    sender_id:       row.get(2)?,
    kind:            row.get(3)?,
    discussion_id:   row.get(4)?,
    reply_id:        row.get(5)?,
    read:            row.get(6)?,
    created_at:      row.get(7)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Agora fact store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── FactStore impl ──────────────────────────────────────────────────────────

impl FactStore for SqliteStore {
  type Error = Error;

  // ── Discussions ───────────────────────────────────────────────────────────

  async fn insert_discussion(&self, input: NewDiscussion) -> Result<Discussion> {
    let now = Utc::now();
    let discussion = Discussion {
      discussion_id: Uuid::new_v4(),
      author_id:     input.author_id,
      title:         input.title,
      content:       input.content,
      tags:          input.tags,
      created_at:    now,
      updated_at:    now,
      likes_count:   0,
      replies_count: 0,
    };

    let id_str     = encode_uuid(discussion.discussion_id);
    let author_str = encode_uuid(discussion.author_id);
    let title      = discussion.title.clone();
    let content    = discussion.content.clone();
    let tags_str   = encode_tags(&discussion.tags)?;
    let at_str     = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO discussions (
             discussion_id, author_id, title, content, tags,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
          rusqlite::params![id_str, author_str, title, content, tags_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(discussion)
  }

  async fn find_discussion(&self, id: Uuid) -> Result<Option<Discussion>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawDiscussion> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("{DISCUSSION_SELECT} WHERE d.discussion_id = ?1"),
              rusqlite::params![id_str],
              row_to_raw_discussion,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDiscussion::into_discussion).transpose()
  }

  async fn update_discussion(
    &self,
    id:    Uuid,
    patch: DiscussionPatch,
  ) -> Result<Option<Discussion>> {
    let id_str   = encode_uuid(id);
    let tags_str = patch.tags.as_deref().map(encode_tags).transpose()?;
    let title    = patch.title;
    let content  = patch.content;
    let at_str   = encode_dt(Utc::now());

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE discussions SET
             title      = COALESCE(?2, title),
             content    = COALESCE(?3, content),
             tags       = COALESCE(?4, tags),
             updated_at = ?5
           WHERE discussion_id = ?1",
          rusqlite::params![id_str, title, content, tags_str, at_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.find_discussion(id).await
  }

  async fn delete_discussion(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let deleted: usize = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM likes
           WHERE (target_kind = 'discussion' AND target_id = ?1)
              OR (target_kind = 'reply' AND target_id IN
                    (SELECT reply_id FROM replies WHERE discussion_id = ?1))",
          rusqlite::params![id_str],
        )?;
        tx.execute(
          "DELETE FROM bookmarks WHERE discussion_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.execute(
          "DELETE FROM replies WHERE discussion_id = ?1",
          rusqlite::params![id_str],
        )?;
        let n = tx.execute(
          "DELETE FROM discussions WHERE discussion_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(n)
      })
      .await?;

    Ok(deleted > 0)
  }

  async fn find_discussions(&self, query: PageQuery) -> Result<Page<Discussion>> {
    let query      = query.clamped();
    let order      = discussion_order(query.sort);
    let limit_val  = i64::from(query.limit);
    let offset_val = query.offset() as i64;

    let (raws, total): (Vec<RawDiscussion>, i64) = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "{DISCUSSION_SELECT} ORDER BY {order} LIMIT ?1 OFFSET ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![limit_val, offset_val],
            row_to_raw_discussion,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let total: i64 =
          conn.query_row("SELECT COUNT(*) FROM discussions", [], |r| r.get(0))?;

        Ok((rows, total))
      })
      .await?;

    let items = raws
      .into_iter()
      .map(RawDiscussion::into_discussion)
      .collect::<Result<Vec<_>>>()?;

    Ok(Page::new(items, total.max(0) as u64, query))
  }

  // ── Replies ───────────────────────────────────────────────────────────────

  async fn insert_reply(&self, input: NewReply) -> Result<Reply> {
    let now = Utc::now();
    let reply = Reply {
      reply_id:      Uuid::new_v4(),
      discussion_id: input.discussion_id,
      author_id:     input.author_id,
      content:       input.content,
      created_at:    now,
      updated_at:    now,
      likes_count:   0,
    };

    let id_str         = encode_uuid(reply.reply_id);
    let discussion_str = encode_uuid(reply.discussion_id);
    let author_str     = encode_uuid(reply.author_id);
    let content        = reply.content.clone();
    let at_str         = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO replies (
             reply_id, discussion_id, author_id, content,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          rusqlite::params![id_str, discussion_str, author_str, content, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(reply)
  }

  async fn find_reply(&self, id: Uuid) -> Result<Option<Reply>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawReply> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("{REPLY_SELECT} WHERE p.reply_id = ?1"),
              rusqlite::params![id_str],
              row_to_raw_reply,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawReply::into_reply).transpose()
  }

  async fn update_reply(&self, id: Uuid, content: String) -> Result<Option<Reply>> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(Utc::now());

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE replies SET content = ?2, updated_at = ?3 WHERE reply_id = ?1",
          rusqlite::params![id_str, content, at_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.find_reply(id).await
  }

  async fn delete_reply(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let deleted: usize = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM likes WHERE target_kind = 'reply' AND target_id = ?1",
          rusqlite::params![id_str],
        )?;
        let n = tx.execute(
          "DELETE FROM replies WHERE reply_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(n)
      })
      .await?;

    Ok(deleted > 0)
  }

  async fn find_replies(
    &self,
    discussion_id: Uuid,
    query:         PageQuery,
  ) -> Result<Page<Reply>> {
    let query          = query.clamped();
    let order          = reply_order(query.sort);
    let discussion_str = encode_uuid(discussion_id);
    let limit_val      = i64::from(query.limit);
    let offset_val     = query.offset() as i64;

    let (raws, total): (Vec<RawReply>, i64) = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "{REPLY_SELECT} WHERE p.discussion_id = ?1
           ORDER BY {order} LIMIT ?2 OFFSET ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![discussion_str, limit_val, offset_val],
            row_to_raw_reply,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let total: i64 = conn.query_row(
          "SELECT COUNT(*) FROM replies WHERE discussion_id = ?1",
          rusqlite::params![discussion_str],
          |r| r.get(0),
        )?;

        Ok((rows, total))
      })
      .await?;

    let items = raws
      .into_iter()
      .map(RawReply::into_reply)
      .collect::<Result<Vec<_>>>()?;

    Ok(Page::new(items, total.max(0) as u64, query))
  }

  async fn count_replies(&self, discussion_id: Uuid) -> Result<u64> {
    let discussion_str = encode_uuid(discussion_id);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM replies WHERE discussion_id = ?1",
          rusqlite::params![discussion_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(count.max(0) as u64)
  }

  // ── Likes ─────────────────────────────────────────────────────────────────

  async fn insert_like(
    &self,
    user_id: Uuid,
    target:  LikeTarget,
  ) -> Result<InsertOutcome> {
    let user_str   = encode_uuid(user_id);
    let kind_str   = encode_target_kind(target.kind).to_owned();
    let target_str = encode_uuid(target.id);
    let at_str     = encode_dt(Utc::now());

    let inserted: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO likes (user_id, target_kind, target_id, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![user_str, kind_str, target_str, at_str],
        )?)
      })
      .await?;

    Ok(if inserted == 0 {
      InsertOutcome::UniqueViolation
    } else {
      InsertOutcome::Inserted
    })
  }

  async fn delete_like(&self, user_id: Uuid, target: LikeTarget) -> Result<bool> {
    let user_str   = encode_uuid(user_id);
    let kind_str   = encode_target_kind(target.kind).to_owned();
    let target_str = encode_uuid(target.id);

    let deleted: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM likes
           WHERE user_id = ?1 AND target_kind = ?2 AND target_id = ?3",
          rusqlite::params![user_str, kind_str, target_str],
        )?)
      })
      .await?;

    Ok(deleted > 0)
  }

  async fn count_likes(&self, target: LikeTarget) -> Result<u64> {
    let kind_str   = encode_target_kind(target.kind).to_owned();
    let target_str = encode_uuid(target.id);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM likes WHERE target_kind = ?1 AND target_id = ?2",
          rusqlite::params![kind_str, target_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(count.max(0) as u64)
  }

  // ── Bookmarks ─────────────────────────────────────────────────────────────

  async fn insert_bookmark(
    &self,
    user_id:       Uuid,
    discussion_id: Uuid,
  ) -> Result<InsertOutcome> {
    let user_str       = encode_uuid(user_id);
    let discussion_str = encode_uuid(discussion_id);
    let at_str         = encode_dt(Utc::now());

    let inserted: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO bookmarks (user_id, discussion_id, created_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![user_str, discussion_str, at_str],
        )?)
      })
      .await?;

    Ok(if inserted == 0 {
      InsertOutcome::UniqueViolation
    } else {
      InsertOutcome::Inserted
    })
  }

  async fn delete_bookmark(&self, user_id: Uuid, discussion_id: Uuid) -> Result<bool> {
    let user_str       = encode_uuid(user_id);
    let discussion_str = encode_uuid(discussion_id);

    let deleted: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM bookmarks WHERE user_id = ?1 AND discussion_id = ?2",
          rusqlite::params![user_str, discussion_str],
        )?)
      })
      .await?;

    Ok(deleted > 0)
  }

  async fn bookmarked_discussion_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
    let user_str = encode_uuid(user_id);

    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT discussion_id FROM bookmarks WHERE user_id = ?1
           ORDER BY created_at DESC, discussion_id ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids.iter().map(|s| decode_uuid(s)).collect()
  }

  async fn find_bookmarked_discussions(
    &self,
    user_id: Uuid,
    query:   PageQuery,
  ) -> Result<Page<Discussion>> {
    let query      = query.clamped();
    let order      = discussion_order(query.sort);
    let user_str   = encode_uuid(user_id);
    let limit_val  = i64::from(query.limit);
    let offset_val = query.offset() as i64;

    let (raws, total): (Vec<RawDiscussion>, i64) = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "{DISCUSSION_SELECT}
           JOIN bookmarks b ON b.discussion_id = d.discussion_id
           WHERE b.user_id = ?1
           ORDER BY {order} LIMIT ?2 OFFSET ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![user_str, limit_val, offset_val],
            row_to_raw_discussion,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let total: i64 = conn.query_row(
          "SELECT COUNT(*) FROM bookmarks WHERE user_id = ?1",
          rusqlite::params![user_str],
          |r| r.get(0),
        )?;

        Ok((rows, total))
      })
      .await?;

    let items = raws
      .into_iter()
      .map(RawDiscussion::into_discussion)
      .collect::<Result<Vec<_>>>()?;

    Ok(Page::new(items, total.max(0) as u64, query))
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn upsert_notification(
    &self,
    input: NewNotification,
  ) -> Result<UpsertOutcome> {
    let notification = Notification {
      notification_id: Uuid::new_v4(),
      recipient_id:    input.recipient_id,
      sender_id:       input.sender_id,
      kind:            input.kind,
      discussion_id:   input.discussion_id,
      reply_id:        input.reply_id,
      read:            false,
      created_at:      Utc::now(),
    };

    let id_str         = encode_uuid(notification.notification_id);
    let recipient_str  = encode_uuid(notification.recipient_id);
    let sender_str     = encode_uuid(notification.sender_id);
    let kind_str       = encode_notification_kind(notification.kind).to_owned();
    let discussion_str = notification.discussion_id.map(encode_uuid);
    let reply_str      = notification.reply_id.map(encode_uuid);
    let at_str         = encode_dt(notification.created_at);

    let inserted: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO notifications (
             notification_id, recipient_id, sender_id, kind,
             discussion_id, reply_id, read, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
          rusqlite::params![
            id_str,
            recipient_str,
            sender_str,
            kind_str,
            discussion_str,
            reply_str,
            at_str,
          ],
        )?)
      })
      .await?;

    Ok(if inserted == 0 {
      UpsertOutcome::Existing
    } else {
      UpsertOutcome::Created(notification)
    })
  }

  async fn find_notifications(
    &self,
    recipient_id: Uuid,
    query:        PageQuery,
  ) -> Result<Page<Notification>> {
    // Notifications are always newest-first; the query's sort key is not
    // consulted.
    let query         = query.clamped();
    let recipient_str = encode_uuid(recipient_id);
    let limit_val     = i64::from(query.limit);
    let offset_val    = query.offset() as i64;

    let (raws, total): (Vec<RawNotification>, i64) = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT
             notification_id, recipient_id, sender_id, kind,
             discussion_id, reply_id, read, created_at
           FROM notifications
           WHERE recipient_id = ?1
           ORDER BY created_at DESC, notification_id ASC
           LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![recipient_str, limit_val, offset_val],
            row_to_raw_notification,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let total: i64 = conn.query_row(
          "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1",
          rusqlite::params![recipient_str],
          |r| r.get(0),
        )?;

        Ok((rows, total))
      })
      .await?;

    let items = raws
      .into_iter()
      .map(RawNotification::into_notification)
      .collect::<Result<Vec<_>>>()?;

    Ok(Page::new(items, total.max(0) as u64, query))
  }

  async fn mark_notification_read(
    &self,
    recipient_id:    Uuid,
    notification_id: Uuid,
  ) -> Result<bool> {
    let recipient_str = encode_uuid(recipient_id);
    let id_str        = encode_uuid(notification_id);

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE notifications SET read = 1
           WHERE notification_id = ?1 AND recipient_id = ?2",
          rusqlite::params![id_str, recipient_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn mark_all_notifications_read(&self, recipient_id: Uuid) -> Result<u64> {
    let recipient_str = encode_uuid(recipient_id);

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE notifications SET read = 1
           WHERE recipient_id = ?1 AND read = 0",
          rusqlite::params![recipient_str],
        )?)
      })
      .await?;

    Ok(changed as u64)
  }

  async fn count_unread_notifications(&self, recipient_id: Uuid) -> Result<u64> {
    let recipient_str = encode_uuid(recipient_id);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND read = 0",
          rusqlite::params![recipient_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(count.max(0) as u64)
  }
}
