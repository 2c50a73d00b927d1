//! End-to-end reconciliation scenarios: mutations go through the real
//! coordinator and store, events fan out through the real broadcaster, and a
//! viewer merges them into its projections exactly as a connected client
//! would.

use std::sync::Arc;

use agora_client::{Applied, Viewer};
use agora_core::{
  event::{Room, ServerEvent},
  model::LikeTarget,
  page::SortKey,
  store::FactStore,
};
use agora_store_sqlite::SqliteStore;
use agora_sync::{
  ConnectionId, Coordinator, RoomBroadcaster,
  coordinator::DiscussionDraft,
};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use uuid::Uuid;

async fn fixture() -> (
  Coordinator<SqliteStore>,
  Arc<SqliteStore>,
  Arc<RoomBroadcaster>,
) {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let rooms = Arc::new(RoomBroadcaster::new());
  let coordinator = Coordinator::new(Arc::clone(&store), Arc::clone(&rooms));
  (coordinator, store, rooms)
}

fn draft(n: usize) -> DiscussionDraft {
  DiscussionDraft {
    title:   format!("seeded discussion number {n}"),
    content: "a seeded body comfortably longer than the thirty-char floor".into(),
    tags:    vec!["seed".into()],
  }
}

/// Open a live connection for `user` and return its id plus event stream.
fn connect(
  rooms: &RoomBroadcaster,
  user: Uuid,
) -> (ConnectionId, UnboundedReceiver<ServerEvent>) {
  let conn = ConnectionId::new();
  let (tx, rx) = unbounded_channel();
  rooms.register(conn, user, tx);
  (conn, rx)
}

fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }
  events
}

// ─── Creation while another user watches page 1 ──────────────────────────────

#[tokio::test]
async fn viewer_on_page_one_sees_a_new_discussion_first() {
  let (coordinator, store, rooms) = fixture().await;
  let author = Uuid::new_v4();
  let watcher = Uuid::new_v4();

  for n in 0..5 {
    coordinator.create_discussion(author, draft(n)).await.unwrap();
  }

  let mut viewer = Viewer::new(SortKey::Recent, 5);
  viewer.apply_list_page(store.find_discussions(viewer.list().query()).await.unwrap());
  let evicted = viewer.list().entries().last().unwrap().discussion_id;

  let (conn, mut rx) = connect(&rooms, watcher);
  rooms.join(conn, Room::Lobby);

  let created = coordinator
    .create_discussion(author, DiscussionDraft {
      title:   "a brand new discussion".into(),
      content: "fresh content that everyone on page one should see first".into(),
      tags:    vec![],
    })
    .await
    .unwrap();

  for event in drain(&mut rx) {
    viewer.apply_event(&event);
  }

  let list = viewer.list();
  assert_eq!(list.total(), 6);
  assert_eq!(list.entries().len(), 5);
  assert_eq!(list.entries()[0].discussion_id, created.discussion_id);
  assert!(
    !list.entries().iter().any(|d| d.discussion_id == evicted),
    "old last item should have been evicted"
  );
}

// ─── Page-boundary invariant ─────────────────────────────────────────────────

#[tokio::test]
async fn deleting_the_only_item_on_page_two_steps_back_to_a_full_page_one() {
  let (coordinator, store, rooms) = fixture().await;
  let author = Uuid::new_v4();

  let mut created = Vec::new();
  for n in 0..6 {
    created.push(coordinator.create_discussion(author, draft(n)).await.unwrap());
  }

  // Recency sort puts the first-created discussion alone on page 2.
  let mut viewer = Viewer::new(SortKey::Recent, 5);
  let page_two = store
    .find_discussions(agora_core::page::PageQuery::new(2, 5, SortKey::Recent))
    .await
    .unwrap();
  viewer.apply_list_page(page_two);
  assert_eq!(viewer.list().entries().len(), 1);
  let lone = viewer.list().entries()[0].discussion_id;

  let (conn, mut rx) = connect(&rooms, Uuid::new_v4());
  rooms.join(conn, Room::Lobby);

  coordinator.delete_discussion(author, lone).await.unwrap();

  let mut needs_refetch = false;
  for event in drain(&mut rx) {
    if viewer.apply_event(&event) == Applied::NeedsRefetch {
      needs_refetch = true;
    }
  }
  assert!(needs_refetch, "underflow should demand a refetch");
  assert_eq!(viewer.list().page(), 1);

  // The driver performs the fetch the merge asked for; page 1 is full.
  viewer.apply_list_page(store.find_discussions(viewer.list().query()).await.unwrap());
  assert_eq!(viewer.list().entries().len(), 5);
  assert_eq!(viewer.list().total(), 5);
}

// ─── Concurrent likes on one reply ───────────────────────────────────────────

#[tokio::test]
async fn concurrent_likes_settle_on_the_fact_count() {
  let (coordinator, store, rooms) = fixture().await;
  let author = Uuid::new_v4();

  let discussion = coordinator.create_discussion(author, draft(0)).await.unwrap();
  let reply = coordinator
    .create_reply(author, discussion.discussion_id, "the reply everyone likes")
    .await
    .unwrap();
  let target = LikeTarget::reply(reply.reply_id);

  let mut viewer = Viewer::new(SortKey::Recent, 5);
  viewer.apply_list_page(store.find_discussions(viewer.list().query()).await.unwrap());
  viewer.open_detail(discussion.clone(), SortKey::Oldest, 10);
  viewer.apply_reply_page(
    store
      .find_replies(discussion.discussion_id, viewer.detail().unwrap().reply_query())
      .await
      .unwrap(),
  );

  let (conn, mut rx) = connect(&rooms, Uuid::new_v4());
  rooms.join(conn, Room::Discussion(discussion.discussion_id));

  // Two distinct users like the same reply; each toggle recomputes the
  // count from the like facts before broadcasting.
  coordinator.toggle_like(Uuid::new_v4(), target).await.unwrap();
  coordinator.toggle_like(Uuid::new_v4(), target).await.unwrap();

  let events = drain(&mut rx);
  assert_eq!(events.len(), 2, "one like.updated per toggle");
  for event in &events {
    viewer.apply_event(event);
  }
  // At-least-once delivery: the whole sequence arrives again.
  for event in &events {
    viewer.apply_event(event);
  }

  let fact_count = store.count_likes(target).await.unwrap();
  assert_eq!(fact_count, 2);
  let merged = viewer
    .detail()
    .unwrap()
    .replies()
    .iter()
    .find(|r| r.reply_id == reply.reply_id)
    .unwrap()
    .likes_count;
  assert_eq!(merged, fact_count);
}

// ─── Live notifications ──────────────────────────────────────────────────────

#[tokio::test]
async fn repeated_replies_push_one_notification() {
  let (coordinator, _store, rooms) = fixture().await;
  let author = Uuid::new_v4();
  let replier = Uuid::new_v4();

  let discussion = coordinator.create_discussion(author, draft(0)).await.unwrap();

  let mut viewer = Viewer::new(SortKey::Recent, 5);
  let (_conn, mut rx) = connect(&rooms, author);

  coordinator
    .create_reply(replier, discussion.discussion_id, "first reply")
    .await
    .unwrap();
  coordinator
    .create_reply(replier, discussion.discussion_id, "second reply")
    .await
    .unwrap();

  let events = drain(&mut rx);
  for event in &events {
    viewer.apply_event(event);
  }
  // Redelivery changes nothing.
  for event in &events {
    viewer.apply_event(event);
  }

  assert_eq!(viewer.notifications().len(), 1);
  assert_eq!(viewer.unread_notifications(), 1);
}

// ─── Detail teardown leaves personal events alive ────────────────────────────

#[tokio::test]
async fn closing_a_detail_view_keeps_bookmarks_and_list_flowing() {
  let (coordinator, store, rooms) = fixture().await;
  let author = Uuid::new_v4();
  let watcher = Uuid::new_v4();

  let discussion = coordinator.create_discussion(author, draft(0)).await.unwrap();

  let mut viewer = Viewer::new(SortKey::Recent, 5);
  viewer.apply_list_page(store.find_discussions(viewer.list().query()).await.unwrap());

  let (conn, mut rx) = connect(&rooms, watcher);
  rooms.join(conn, Room::Lobby);
  rooms.join(conn, Room::Discussion(discussion.discussion_id));
  viewer.open_detail(discussion.clone(), SortKey::Oldest, 10);

  // Close the detail: the client leaves the discussion room only.
  viewer.close_detail();
  rooms.leave(conn, Room::Discussion(discussion.discussion_id));

  // A bookmark toggle by this user still lands on the user channel...
  coordinator
    .toggle_bookmark(watcher, discussion.discussion_id)
    .await
    .unwrap();
  // ...and lobby traffic still patches the list.
  coordinator
    .create_reply(author, discussion.discussion_id, "a reply after closing")
    .await
    .unwrap();

  for event in drain(&mut rx) {
    viewer.apply_event(&event);
  }

  assert!(viewer.bookmarked().contains(&discussion.discussion_id));
  assert_eq!(viewer.list().entries()[0].replies_count, 1);
  assert!(viewer.detail().is_none());
}
