//! Notification derivation.
//!
//! Given a successful mutation, decide whether a notification fact should
//! exist and deliver it. Creation is an upsert on the identity tuple
//! `(recipient, kind, discussion, reply, sender)`: if an identical row
//! already exists nothing is touched — no duplicate, no re-unread. Removing
//! the triggering like or bookmark never retracts a notification; the table
//! is an append-only audit of "it happened at least once".

use std::sync::Arc;

use uuid::Uuid;

use agora_core::{
  event::ServerEvent,
  model::{Discussion, LikeTarget, NewNotification, NotificationKind, Reply, TargetKind},
  store::{FactStore, UpsertOutcome},
};

use crate::rooms::RoomBroadcaster;

/// Derives notification facts from mutations and pushes freshly-created ones
/// to the recipient's user channel. Recipients without a live connection pick
/// them up from the paginated notifications read.
pub struct Notifier<S> {
  store: Arc<S>,
  rooms: Arc<RoomBroadcaster>,
}

impl<S: FactStore> Notifier<S> {
  pub fn new(store: Arc<S>, rooms: Arc<RoomBroadcaster>) -> Self {
    Self { store, rooms }
  }

  /// A reply notifies the discussion author, unless they replied to their
  /// own discussion. The tuple deliberately omits the reply id: a second
  /// reply by the same user to the same discussion touches the existing row
  /// instead of stacking a new one.
  pub async fn reply_created(
    &self,
    discussion: &Discussion,
    reply: &Reply,
  ) -> Result<(), S::Error> {
    if discussion.author_id == reply.author_id {
      return Ok(());
    }
    self
      .upsert_and_push(NewNotification {
        recipient_id:  discussion.author_id,
        sender_id:     reply.author_id,
        kind:          NotificationKind::Reply,
        discussion_id: Some(discussion.discussion_id),
        reply_id:      None,
      })
      .await
  }

  /// A like notifies the target's author, unless it is a self-like. Called
  /// only when the toggle landed on "liked"; unliking derives nothing and
  /// retracts nothing.
  pub async fn like_created(
    &self,
    liker: Uuid,
    target_author: Uuid,
    target: LikeTarget,
    discussion_id: Uuid,
  ) -> Result<(), S::Error> {
    if liker == target_author {
      return Ok(());
    }
    let reply_id = match target.kind {
      TargetKind::Reply => Some(target.id),
      TargetKind::Discussion => None,
    };
    self
      .upsert_and_push(NewNotification {
        recipient_id: target_author,
        sender_id: liker,
        kind: NotificationKind::Like,
        discussion_id: Some(discussion_id),
        reply_id,
      })
      .await
  }

  async fn upsert_and_push(&self, input: NewNotification) -> Result<(), S::Error> {
    match self.store.upsert_notification(input).await? {
      UpsertOutcome::Created(notification) => {
        self.rooms.publish_to_user(
          notification.recipient_id,
          &ServerEvent::NotificationCreated { notification },
        );
      }
      UpsertOutcome::Existing => {}
    }
    Ok(())
  }
}
