//! Mutation coordination.
//!
//! Each logical mutation is serialised into atomic store operations, the
//! affected aggregates are recomputed from the fact tables (never
//! incremented in place — concurrent writers cannot drift a count that is
//! always re-derived), and the resulting typed events are published.
//!
//! No in-process lock is taken: conflicting writes on the same unique key
//! are serialised by the store itself, and toggles treat a uniqueness
//! conflict as "already exists, flip off instead".

use std::sync::Arc;

use uuid::Uuid;

use agora_core::{
  event::{Room, ServerEvent},
  model::{
    Discussion, DiscussionPatch, LikeTarget, NewDiscussion, NewReply, Reply,
    TargetKind,
  },
  store::FactStore,
};

use crate::{
  error::{MutationError, MutationResult},
  notify::Notifier,
  rooms::RoomBroadcaster,
};

// ─── Payloads ────────────────────────────────────────────────────────────────

/// Caller-supplied fields for a new discussion; the acting user becomes the
/// author.
#[derive(Debug, Clone)]
pub struct DiscussionDraft {
  pub title:   String,
  pub content: String,
  pub tags:    Vec<String>,
}

/// Caller-supplied edit; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct DiscussionEdit {
  pub title:   Option<String>,
  pub content: Option<String>,
  pub tags:    Option<Vec<String>>,
}

/// Result of a like toggle: which state it landed on and the recomputed
/// aggregate.
#[derive(Debug, Clone, Copy)]
pub struct LikeToggle {
  pub liked:       bool,
  pub likes_count: u64,
}

/// Result of a bookmark toggle.
#[derive(Debug, Clone, Copy)]
pub struct BookmarkToggle {
  pub bookmarked: bool,
}

// ─── Validation ──────────────────────────────────────────────────────────────

pub const MIN_TITLE_LEN: usize = 10;
pub const MAX_TITLE_LEN: usize = 150;
pub const MIN_CONTENT_LEN: usize = 30;

fn validate_title(title: &str) -> Result<String, String> {
  let title = title.trim();
  if title.chars().count() < MIN_TITLE_LEN {
    return Err(format!("title must be at least {MIN_TITLE_LEN} characters"));
  }
  if title.chars().count() > MAX_TITLE_LEN {
    return Err(format!("title must be at most {MAX_TITLE_LEN} characters"));
  }
  Ok(title.to_owned())
}

fn validate_content(content: &str) -> Result<String, String> {
  let content = content.trim();
  if content.chars().count() < MIN_CONTENT_LEN {
    return Err(format!(
      "content must be at least {MIN_CONTENT_LEN} characters"
    ));
  }
  Ok(content.to_owned())
}

fn validate_reply_content(content: &str) -> Result<String, String> {
  let content = content.trim();
  if content.is_empty() {
    return Err("reply content must not be empty".into());
  }
  Ok(content.to_owned())
}

/// Trim, lowercase, and deduplicate tags, preserving first-seen order.
fn normalise_tags(tags: Vec<String>) -> Vec<String> {
  let mut out: Vec<String> = Vec::with_capacity(tags.len());
  for tag in tags {
    let tag = tag.trim().to_lowercase();
    if !tag.is_empty() && !out.contains(&tag) {
      out.push(tag);
    }
  }
  out
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

/// Serialises logical mutations into store operations and event publishes.
///
/// Cloning is cheap; the store, broadcaster, and notifier are shared.
pub struct Coordinator<S> {
  store:    Arc<S>,
  rooms:    Arc<RoomBroadcaster>,
  notifier: Notifier<S>,
}

impl<S: FactStore> Clone for Coordinator<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      rooms:    Arc::clone(&self.rooms),
      notifier: Notifier::new(Arc::clone(&self.store), Arc::clone(&self.rooms)),
    }
  }
}

impl<S: FactStore> Coordinator<S> {
  pub fn new(store: Arc<S>, rooms: Arc<RoomBroadcaster>) -> Self {
    let notifier = Notifier::new(Arc::clone(&store), Arc::clone(&rooms));
    Self { store, rooms, notifier }
  }

  /// Publish a discussion-scoped event to the lobby and the discussion's own
  /// room. A connection subscribed to both receives the event twice; client
  /// merges are idempotent, so dual delivery is harmless.
  fn publish_discussion_scoped(&self, discussion_id: Uuid, event: &ServerEvent) {
    self.rooms.publish(Room::Lobby, event);
    self.rooms.publish(Room::Discussion(discussion_id), event);
  }

  // ── Discussions ───────────────────────────────────────────────────────────

  pub async fn create_discussion(
    &self,
    actor: Uuid,
    draft: DiscussionDraft,
  ) -> MutationResult<Discussion, S::Error> {
    let title =
      validate_title(&draft.title).map_err(MutationError::Validation)?;
    let content =
      validate_content(&draft.content).map_err(MutationError::Validation)?;
    let tags = normalise_tags(draft.tags);

    let discussion = self
      .store
      .insert_discussion(NewDiscussion { author_id: actor, title, content, tags })
      .await
      .map_err(MutationError::Store)?;

    tracing::debug!(discussion_id = %discussion.discussion_id, "discussion created");
    self.rooms.publish(Room::Lobby, &ServerEvent::DiscussionCreated {
      discussion: discussion.clone(),
    });
    Ok(discussion)
  }

  pub async fn edit_discussion(
    &self,
    actor: Uuid,
    discussion_id: Uuid,
    edit: DiscussionEdit,
  ) -> MutationResult<Discussion, S::Error> {
    let existing = self
      .store
      .find_discussion(discussion_id)
      .await
      .map_err(MutationError::Store)?
      .ok_or(MutationError::NotFound)?;
    if existing.author_id != actor {
      return Err(MutationError::Unauthorized);
    }

    let patch = DiscussionPatch {
      title:   edit
        .title
        .as_deref()
        .map(validate_title)
        .transpose()
        .map_err(MutationError::Validation)?,
      content: edit
        .content
        .as_deref()
        .map(validate_content)
        .transpose()
        .map_err(MutationError::Validation)?,
      tags:    edit.tags.map(normalise_tags),
    };

    let updated = self
      .store
      .update_discussion(discussion_id, patch)
      .await
      .map_err(MutationError::Store)?
      .ok_or(MutationError::NotFound)?;

    self.publish_discussion_scoped(discussion_id, &ServerEvent::DiscussionUpdated {
      discussion: updated.clone(),
    });
    Ok(updated)
  }

  pub async fn delete_discussion(
    &self,
    actor: Uuid,
    discussion_id: Uuid,
  ) -> MutationResult<(), S::Error> {
    let existing = self
      .store
      .find_discussion(discussion_id)
      .await
      .map_err(MutationError::Store)?
      .ok_or(MutationError::NotFound)?;
    if existing.author_id != actor {
      return Err(MutationError::Unauthorized);
    }

    let deleted = self
      .store
      .delete_discussion(discussion_id)
      .await
      .map_err(MutationError::Store)?;
    if !deleted {
      // Raced with another delete; the end state is what the caller asked
      // for, but the id no longer resolves.
      return Err(MutationError::NotFound);
    }

    tracing::debug!(%discussion_id, "discussion deleted");
    self.publish_discussion_scoped(discussion_id, &ServerEvent::DiscussionDeleted {
      discussion_id,
    });
    Ok(())
  }

  // ── Replies ───────────────────────────────────────────────────────────────

  pub async fn create_reply(
    &self,
    actor: Uuid,
    discussion_id: Uuid,
    content: &str,
  ) -> MutationResult<Reply, S::Error> {
    let content =
      validate_reply_content(content).map_err(MutationError::Validation)?;

    let discussion = self
      .store
      .find_discussion(discussion_id)
      .await
      .map_err(MutationError::Store)?
      .ok_or(MutationError::NotFound)?;

    let reply = self
      .store
      .insert_reply(NewReply { discussion_id, author_id: actor, content })
      .await
      .map_err(MutationError::Store)?;

    self
      .notifier
      .reply_created(&discussion, &reply)
      .await
      .map_err(MutationError::Store)?;

    self.publish_discussion_scoped(discussion_id, &ServerEvent::ReplyCreated {
      reply: reply.clone(),
    });
    Ok(reply)
  }

  pub async fn edit_reply(
    &self,
    actor: Uuid,
    reply_id: Uuid,
    content: &str,
  ) -> MutationResult<Reply, S::Error> {
    let content =
      validate_reply_content(content).map_err(MutationError::Validation)?;

    let existing = self
      .store
      .find_reply(reply_id)
      .await
      .map_err(MutationError::Store)?
      .ok_or(MutationError::NotFound)?;
    if existing.author_id != actor {
      return Err(MutationError::Unauthorized);
    }

    let updated = self
      .store
      .update_reply(reply_id, content)
      .await
      .map_err(MutationError::Store)?
      .ok_or(MutationError::NotFound)?;

    self.rooms.publish(
      Room::Discussion(updated.discussion_id),
      &ServerEvent::ReplyUpdated { reply: updated.clone() },
    );
    Ok(updated)
  }

  pub async fn delete_reply(
    &self,
    actor: Uuid,
    reply_id: Uuid,
  ) -> MutationResult<(), S::Error> {
    let existing = self
      .store
      .find_reply(reply_id)
      .await
      .map_err(MutationError::Store)?
      .ok_or(MutationError::NotFound)?;
    if existing.author_id != actor {
      return Err(MutationError::Unauthorized);
    }

    let deleted = self
      .store
      .delete_reply(reply_id)
      .await
      .map_err(MutationError::Store)?;
    if !deleted {
      return Err(MutationError::NotFound);
    }

    self.publish_discussion_scoped(
      existing.discussion_id,
      &ServerEvent::ReplyDeleted {
        discussion_id: existing.discussion_id,
        reply_id,
      },
    );
    Ok(())
  }

  // ── Toggles ───────────────────────────────────────────────────────────────

  /// Toggle the acting user's like on a discussion or reply.
  ///
  /// Insert-first: a uniqueness conflict means the like already exists, so
  /// the toggle flips it off instead. Two rapid identical requests from the
  /// same user converge on one well-defined state and the count — recomputed
  /// from the like facts either way — never double-moves.
  pub async fn toggle_like(
    &self,
    actor: Uuid,
    target: LikeTarget,
  ) -> MutationResult<LikeToggle, S::Error> {
    // Resolve the target's author and enclosing discussion up front; the
    // event and the notification both need them.
    let (target_author, discussion_id) = match target.kind {
      TargetKind::Discussion => {
        let d = self
          .store
          .find_discussion(target.id)
          .await
          .map_err(MutationError::Store)?
          .ok_or(MutationError::NotFound)?;
        (d.author_id, d.discussion_id)
      }
      TargetKind::Reply => {
        let r = self
          .store
          .find_reply(target.id)
          .await
          .map_err(MutationError::Store)?
          .ok_or(MutationError::NotFound)?;
        (r.author_id, r.discussion_id)
      }
    };

    let liked = if self
      .store
      .insert_like(actor, target)
      .await
      .map_err(MutationError::Store)?
      .inserted()
    {
      true
    } else {
      self
        .store
        .delete_like(actor, target)
        .await
        .map_err(MutationError::Store)?;
      false
    };

    let likes_count = self
      .store
      .count_likes(target)
      .await
      .map_err(MutationError::Store)?;

    if liked {
      // Unliking never retracts the notification.
      self
        .notifier
        .like_created(actor, target_author, target, discussion_id)
        .await
        .map_err(MutationError::Store)?;
    }

    let event = ServerEvent::LikeUpdated {
      target_kind: target.kind,
      target_id: target.id,
      discussion_id,
      likes_count,
    };
    match target.kind {
      // Reply like counts are only visible in an expanded detail view.
      TargetKind::Reply => {
        self.rooms.publish(Room::Discussion(discussion_id), &event);
      }
      TargetKind::Discussion => {
        self.publish_discussion_scoped(discussion_id, &event);
      }
    }

    Ok(LikeToggle { liked, likes_count })
  }

  /// Toggle the acting user's bookmark on a discussion. The resulting state
  /// is personal, so the event goes to the actor's user channel only.
  pub async fn toggle_bookmark(
    &self,
    actor: Uuid,
    discussion_id: Uuid,
  ) -> MutationResult<BookmarkToggle, S::Error> {
    self
      .store
      .find_discussion(discussion_id)
      .await
      .map_err(MutationError::Store)?
      .ok_or(MutationError::NotFound)?;

    let bookmarked = if self
      .store
      .insert_bookmark(actor, discussion_id)
      .await
      .map_err(MutationError::Store)?
      .inserted()
    {
      true
    } else {
      self
        .store
        .delete_bookmark(actor, discussion_id)
        .await
        .map_err(MutationError::Store)?;
      false
    };

    self.rooms.publish_to_user(actor, &ServerEvent::BookmarkUpdated {
      discussion_id,
      bookmarked,
    });

    Ok(BookmarkToggle { bookmarked })
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use agora_store_sqlite::SqliteStore;
  use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

  use super::*;
  use crate::rooms::ConnectionId;

  async fn fixture() -> (Coordinator<SqliteStore>, Arc<SqliteStore>, Arc<RoomBroadcaster>) {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let rooms = Arc::new(RoomBroadcaster::new());
    let coordinator = Coordinator::new(Arc::clone(&store), Arc::clone(&rooms));
    (coordinator, store, rooms)
  }

  fn draft(title: &str, content: &str) -> DiscussionDraft {
    DiscussionDraft {
      title:   title.into(),
      content: content.into(),
      tags:    vec![" Rust ".into(), "rust".into(), "sync".into()],
    }
  }

  fn valid_draft() -> DiscussionDraft {
    draft(
      "a perfectly valid title",
      "a discussion body comfortably longer than the minimum",
    )
  }

  fn subscribe_user(
    rooms: &RoomBroadcaster,
    user: Uuid,
  ) -> UnboundedReceiver<ServerEvent> {
    let conn = ConnectionId::new();
    let (tx, rx) = unbounded_channel();
    rooms.register(conn, user, tx);
    rx
  }

  fn subscribe_room(rooms: &RoomBroadcaster, room: Room) -> UnboundedReceiver<ServerEvent> {
    let conn = ConnectionId::new();
    let (tx, rx) = unbounded_channel();
    rooms.register(conn, Uuid::new_v4(), tx);
    rooms.join(conn, room);
    rx
  }

  // ── Validation & authorisation ────────────────────────────────────────────

  #[tokio::test]
  async fn short_title_is_rejected() {
    let (c, _, _) = fixture().await;
    let err = c
      .create_discussion(Uuid::new_v4(), draft("short", "long enough content for the body here"))
      .await
      .unwrap_err();
    assert!(matches!(err, MutationError::Validation(_)));
  }

  #[tokio::test]
  async fn short_content_is_rejected() {
    let (c, _, _) = fixture().await;
    let err = c
      .create_discussion(Uuid::new_v4(), draft("a valid title here", "too short"))
      .await
      .unwrap_err();
    assert!(matches!(err, MutationError::Validation(_)));
  }

  #[tokio::test]
  async fn tags_are_normalised() {
    let (c, _, _) = fixture().await;
    let d = c
      .create_discussion(Uuid::new_v4(), valid_draft())
      .await
      .unwrap();
    assert_eq!(d.tags, vec!["rust".to_string(), "sync".to_string()]);
  }

  #[tokio::test]
  async fn only_the_author_may_edit_or_delete() {
    let (c, _, _) = fixture().await;
    let author = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let d = c.create_discussion(author, valid_draft()).await.unwrap();

    let err = c
      .edit_discussion(stranger, d.discussion_id, DiscussionEdit {
        title: Some("a hostile takeover title".into()),
        ..Default::default()
      })
      .await
      .unwrap_err();
    assert!(matches!(err, MutationError::Unauthorized));

    let err = c
      .delete_discussion(stranger, d.discussion_id)
      .await
      .unwrap_err();
    assert!(matches!(err, MutationError::Unauthorized));
  }

  #[tokio::test]
  async fn missing_targets_report_not_found() {
    let (c, _, _) = fixture().await;
    let actor = Uuid::new_v4();

    let err = c
      .create_reply(actor, Uuid::new_v4(), "reply to nothing")
      .await
      .unwrap_err();
    assert!(matches!(err, MutationError::NotFound));

    let err = c
      .toggle_like(actor, LikeTarget::discussion(Uuid::new_v4()))
      .await
      .unwrap_err();
    assert!(matches!(err, MutationError::NotFound));

    let err = c.toggle_bookmark(actor, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, MutationError::NotFound));
  }

  // ── Toggle semantics ──────────────────────────────────────────────────────

  #[tokio::test]
  async fn like_then_unlike_restores_the_count() {
    let (c, store, _) = fixture().await;
    let author = Uuid::new_v4();
    let liker = Uuid::new_v4();
    let d = c.create_discussion(author, valid_draft()).await.unwrap();
    let target = LikeTarget::discussion(d.discussion_id);

    let on = c.toggle_like(liker, target).await.unwrap();
    assert!(on.liked);
    assert_eq!(on.likes_count, 1);

    let off = c.toggle_like(liker, target).await.unwrap();
    assert!(!off.liked);
    assert_eq!(off.likes_count, 0);

    use agora_core::store::FactStore as _;
    assert_eq!(store.count_likes(target).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn concurrent_likes_from_distinct_users_both_count() {
    let (c, _, _) = fixture().await;
    let author = Uuid::new_v4();
    let d = c.create_discussion(author, valid_draft()).await.unwrap();
    let reply = c
      .create_reply(author, d.discussion_id, "the reply both users like")
      .await
      .unwrap();
    let target = LikeTarget::reply(reply.reply_id);

    let (a, b) = tokio::join!(
      c.toggle_like(Uuid::new_v4(), target),
      c.toggle_like(Uuid::new_v4(), target),
    );
    a.unwrap();
    b.unwrap();

    // Regardless of interleaving, the final recomputed count is 2.
    let settled = c.toggle_like(author, target).await.unwrap();
    assert_eq!(settled.likes_count, 3);
  }

  #[tokio::test]
  async fn bookmark_toggle_converges() {
    let (c, _, rooms) = fixture().await;
    let user = Uuid::new_v4();
    let mut rx = subscribe_user(&rooms, user);
    let d = c.create_discussion(user, valid_draft()).await.unwrap();

    assert!(c.toggle_bookmark(user, d.discussion_id).await.unwrap().bookmarked);
    assert!(!c.toggle_bookmark(user, d.discussion_id).await.unwrap().bookmarked);

    let first = rx.try_recv().unwrap();
    let second = rx.try_recv().unwrap();
    assert_eq!(first, ServerEvent::BookmarkUpdated {
      discussion_id: d.discussion_id,
      bookmarked:    true,
    });
    assert_eq!(second, ServerEvent::BookmarkUpdated {
      discussion_id: d.discussion_id,
      bookmarked:    false,
    });
  }

  // ── Event routing ─────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_discussion_reaches_lobby_only() {
    let (c, _, rooms) = fixture().await;
    let mut lobby = subscribe_room(&rooms, Room::Lobby);

    let d = c
      .create_discussion(Uuid::new_v4(), valid_draft())
      .await
      .unwrap();

    match lobby.try_recv().unwrap() {
      ServerEvent::DiscussionCreated { discussion } => {
        assert_eq!(discussion.discussion_id, d.discussion_id);
      }
      other => panic!("unexpected event: {other:?}"),
    }
  }

  #[tokio::test]
  async fn reply_events_reach_lobby_and_room() {
    let (c, _, rooms) = fixture().await;
    let author = Uuid::new_v4();
    let d = c.create_discussion(author, valid_draft()).await.unwrap();

    let mut lobby = subscribe_room(&rooms, Room::Lobby);
    let mut room = subscribe_room(&rooms, Room::Discussion(d.discussion_id));

    let reply = c
      .create_reply(Uuid::new_v4(), d.discussion_id, "a broadcast reply")
      .await
      .unwrap();

    for rx in [&mut lobby, &mut room] {
      match rx.try_recv().unwrap() {
        ServerEvent::ReplyCreated { reply: r } => assert_eq!(r.reply_id, reply.reply_id),
        other => panic!("unexpected event: {other:?}"),
      }
    }
  }

  #[tokio::test]
  async fn reply_like_stays_out_of_the_lobby() {
    let (c, _, rooms) = fixture().await;
    let author = Uuid::new_v4();
    let d = c.create_discussion(author, valid_draft()).await.unwrap();
    let reply = c
      .create_reply(author, d.discussion_id, "a likeable reply")
      .await
      .unwrap();

    let mut lobby = subscribe_room(&rooms, Room::Lobby);
    let mut room = subscribe_room(&rooms, Room::Discussion(d.discussion_id));

    c.toggle_like(Uuid::new_v4(), LikeTarget::reply(reply.reply_id))
      .await
      .unwrap();

    assert!(lobby.try_recv().is_err());
    match room.try_recv().unwrap() {
      ServerEvent::LikeUpdated { target_id, likes_count, .. } => {
        assert_eq!(target_id, reply.reply_id);
        assert_eq!(likes_count, 1);
      }
      other => panic!("unexpected event: {other:?}"),
    }
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  #[tokio::test]
  async fn reply_notifies_the_discussion_author_once() {
    let (c, store, rooms) = fixture().await;
    let author = Uuid::new_v4();
    let replier = Uuid::new_v4();
    let mut inbox = subscribe_user(&rooms, author);
    let d = c.create_discussion(author, valid_draft()).await.unwrap();

    c.create_reply(replier, d.discussion_id, "first reply")
      .await
      .unwrap();
    c.create_reply(replier, d.discussion_id, "second reply")
      .await
      .unwrap();

    // One live push, one stored row: the identity tuple absorbs the repeat.
    assert!(matches!(
      inbox.try_recv().unwrap(),
      ServerEvent::NotificationCreated { .. }
    ));
    assert!(inbox.try_recv().is_err());

    use agora_core::store::FactStore as _;
    assert_eq!(store.count_unread_notifications(author).await.unwrap(), 1);
  }

  #[tokio::test]
  async fn self_actions_do_not_notify() {
    let (c, store, _) = fixture().await;
    let author = Uuid::new_v4();
    let d = c.create_discussion(author, valid_draft()).await.unwrap();

    c.create_reply(author, d.discussion_id, "replying to myself")
      .await
      .unwrap();
    c.toggle_like(author, LikeTarget::discussion(d.discussion_id))
      .await
      .unwrap();

    use agora_core::store::FactStore as _;
    assert_eq!(store.count_unread_notifications(author).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn notification_survives_unlike() {
    let (c, store, _) = fixture().await;
    let author = Uuid::new_v4();
    let liker = Uuid::new_v4();
    let d = c.create_discussion(author, valid_draft()).await.unwrap();
    let target = LikeTarget::discussion(d.discussion_id);

    c.toggle_like(liker, target).await.unwrap();
    c.toggle_like(liker, target).await.unwrap();

    // The like is gone but the audit row stays.
    use agora_core::store::FactStore as _;
    assert_eq!(store.count_likes(target).await.unwrap(), 0);
    let page = store
      .find_notifications(author, agora_core::page::PageQuery::default())
      .await
      .unwrap();
    assert_eq!(page.total, 1);
  }

  #[tokio::test]
  async fn re_like_after_unlike_does_not_stack_notifications() {
    let (c, store, _) = fixture().await;
    let author = Uuid::new_v4();
    let liker = Uuid::new_v4();
    let d = c.create_discussion(author, valid_draft()).await.unwrap();
    let target = LikeTarget::discussion(d.discussion_id);

    c.toggle_like(liker, target).await.unwrap();
    c.toggle_like(liker, target).await.unwrap();
    c.toggle_like(liker, target).await.unwrap();

    use agora_core::store::FactStore as _;
    let page = store
      .find_notifications(author, agora_core::page::PageQuery::default())
      .await
      .unwrap();
    assert_eq!(page.total, 1);
  }
}
