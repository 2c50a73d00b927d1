//! Room broadcaster — transient connection membership and event fan-out.
//!
//! Two independent subscription tables are kept per connection: explicit room
//! memberships (joined and left by client command) and the implicit per-user
//! channel (alive from registration to disconnect). Keeping them separate is
//! what lets a client close a detail view — leaving its discussion room —
//! without disturbing notification or bookmark delivery.
//!
//! Publishing is fire-and-forget over per-connection unbounded senders: no
//! acknowledgment, no retry, no durable queue. A recipient whose receiver is
//! gone is silently skipped; it reconciles via its next full page fetch.

use std::{
  collections::{HashMap, HashSet},
  sync::RwLock,
};

use tokio::sync::mpsc;
use uuid::Uuid;

use agora_core::event::{Room, ServerEvent};

// ─── Connection identity ─────────────────────────────────────────────────────

/// Opaque id for one live connection (one socket; a user with three tabs has
/// three of these).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for ConnectionId {
  fn default() -> Self { Self::new() }
}

/// Sending half of a connection's event queue. The receiving half is drained
/// by the socket task in `agora-server`.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

// ─── Membership tables ───────────────────────────────────────────────────────

struct ConnEntry {
  user_id: Uuid,
  sender:  EventSender,
  /// Rooms this connection has explicitly joined; used for O(rooms) teardown
  /// on disconnect.
  rooms:   HashSet<Room>,
}

#[derive(Default)]
struct Tables {
  rooms:       HashMap<Room, HashMap<ConnectionId, EventSender>>,
  users:       HashMap<Uuid, HashMap<ConnectionId, EventSender>>,
  connections: HashMap<ConnectionId, ConnEntry>,
}

// ─── Broadcaster ─────────────────────────────────────────────────────────────

/// The fan-out hub. Callers never see the membership tables; they publish to
/// a room or a user and the broadcaster resolves recipients under its own
/// lock. The lock is held only for map access — never across a send that
/// could block (unbounded senders cannot) and never across an await.
#[derive(Default)]
pub struct RoomBroadcaster {
  tables: RwLock<Tables>,
}

impl RoomBroadcaster {
  pub fn new() -> Self { Self::default() }

  /// Register a connection under its authenticated user. From this moment
  /// the connection receives user-channel events; room events require an
  /// explicit [`join`](Self::join).
  pub fn register(&self, conn: ConnectionId, user_id: Uuid, sender: EventSender) {
    let mut tables = self.tables.write().expect("broadcaster lock");
    tables
      .users
      .entry(user_id)
      .or_default()
      .insert(conn, sender.clone());
    tables.connections.insert(conn, ConnEntry {
      user_id,
      sender,
      rooms: HashSet::new(),
    });
  }

  /// Join `conn` to `room`. Returns `false` if the connection is not
  /// registered (e.g. raced with its own disconnect).
  pub fn join(&self, conn: ConnectionId, room: Room) -> bool {
    let mut tables = self.tables.write().expect("broadcaster lock");
    let Some(entry) = tables.connections.get_mut(&conn) else {
      return false;
    };
    entry.rooms.insert(room);
    let sender = entry.sender.clone();
    tables.rooms.entry(room).or_default().insert(conn, sender);
    true
  }

  /// Remove `conn` from `room`. Leaving a room never touches the user
  /// channel or other room memberships.
  pub fn leave(&self, conn: ConnectionId, room: Room) {
    let mut tables = self.tables.write().expect("broadcaster lock");
    if let Some(entry) = tables.connections.get_mut(&conn) {
      entry.rooms.remove(&room);
    }
    if let Some(members) = tables.rooms.get_mut(&room) {
      members.remove(&conn);
      if members.is_empty() {
        tables.rooms.remove(&room);
      }
    }
  }

  /// Drop every membership for `conn` — all rooms and the user channel.
  /// Called when the socket closes, for any reason.
  pub fn disconnect(&self, conn: ConnectionId) {
    let mut tables = self.tables.write().expect("broadcaster lock");
    let Some(entry) = tables.connections.remove(&conn) else {
      return;
    };
    for room in &entry.rooms {
      if let Some(members) = tables.rooms.get_mut(room) {
        members.remove(&conn);
        if members.is_empty() {
          tables.rooms.remove(room);
        }
      }
    }
    if let Some(conns) = tables.users.get_mut(&entry.user_id) {
      conns.remove(&conn);
      if conns.is_empty() {
        tables.users.remove(&entry.user_id);
      }
    }
  }

  /// Fan `event` out to every connection currently joined to `room`.
  /// A room with no members is a silent no-op.
  pub fn publish(&self, room: Room, event: &ServerEvent) {
    let tables = self.tables.read().expect("broadcaster lock");
    let Some(members) = tables.rooms.get(&room) else {
      return;
    };
    let mut delivered = 0usize;
    for sender in members.values() {
      if sender.send(event.clone()).is_ok() {
        delivered += 1;
      }
    }
    tracing::debug!(?room, delivered, "published room event");
  }

  /// Fan `event` out to every live connection authenticated as `user_id`
  /// (zero or more — multiple open tabs each get a copy).
  pub fn publish_to_user(&self, user_id: Uuid, event: &ServerEvent) {
    let tables = self.tables.read().expect("broadcaster lock");
    let Some(conns) = tables.users.get(&user_id) else {
      return;
    };
    let mut delivered = 0usize;
    for sender in conns.values() {
      if sender.send(event.clone()).is_ok() {
        delivered += 1;
      }
    }
    tracing::debug!(%user_id, delivered, "published user event");
  }

  /// Number of connections currently joined to `room`.
  pub fn room_size(&self, room: Room) -> usize {
    let tables = self.tables.read().expect("broadcaster lock");
    tables.rooms.get(&room).map_or(0, HashMap::len)
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use agora_core::event::ServerEvent;
  use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

  use super::*;

  fn deleted_event(n: u128) -> ServerEvent {
    ServerEvent::DiscussionDeleted {
      discussion_id: Uuid::from_u128(n),
    }
  }

  fn connect(
    hub: &RoomBroadcaster,
    user: Uuid,
  ) -> (ConnectionId, UnboundedReceiver<ServerEvent>) {
    let conn = ConnectionId::new();
    let (tx, rx) = unbounded_channel();
    hub.register(conn, user, tx);
    (conn, rx)
  }

  #[test]
  fn room_publish_reaches_only_members() {
    let hub = RoomBroadcaster::new();
    let room = Room::Discussion(Uuid::from_u128(1));

    let (a, mut rx_a) = connect(&hub, Uuid::new_v4());
    let (_b, mut rx_b) = connect(&hub, Uuid::new_v4());
    assert!(hub.join(a, room));

    hub.publish(room, &deleted_event(1));
    assert_eq!(rx_a.try_recv().unwrap(), deleted_event(1));
    assert!(rx_b.try_recv().is_err());
  }

  #[test]
  fn user_publish_reaches_every_tab() {
    let hub = RoomBroadcaster::new();
    let user = Uuid::new_v4();

    let (_tab1, mut rx1) = connect(&hub, user);
    let (_tab2, mut rx2) = connect(&hub, user);

    hub.publish_to_user(user, &deleted_event(2));
    assert_eq!(rx1.try_recv().unwrap(), deleted_event(2));
    assert_eq!(rx2.try_recv().unwrap(), deleted_event(2));
  }

  #[test]
  fn leave_keeps_user_channel_alive() {
    // Closing a detail view tears down the room membership only; personal
    // events must keep flowing.
    let hub = RoomBroadcaster::new();
    let user = Uuid::new_v4();
    let room = Room::Discussion(Uuid::from_u128(3));

    let (conn, mut rx) = connect(&hub, user);
    hub.join(conn, room);
    hub.leave(conn, room);

    hub.publish(room, &deleted_event(3));
    assert!(rx.try_recv().is_err());

    hub.publish_to_user(user, &deleted_event(4));
    assert_eq!(rx.try_recv().unwrap(), deleted_event(4));
  }

  #[test]
  fn disconnect_drops_all_memberships() {
    let hub = RoomBroadcaster::new();
    let user = Uuid::new_v4();
    let room = Room::Lobby;

    let (conn, mut rx) = connect(&hub, user);
    hub.join(conn, room);
    assert_eq!(hub.room_size(room), 1);

    hub.disconnect(conn);
    assert_eq!(hub.room_size(room), 0);

    hub.publish(room, &deleted_event(5));
    hub.publish_to_user(user, &deleted_event(5));
    assert!(rx.try_recv().is_err());
  }

  #[test]
  fn join_after_disconnect_is_rejected() {
    let hub = RoomBroadcaster::new();
    let (conn, _rx) = connect(&hub, Uuid::new_v4());
    hub.disconnect(conn);
    assert!(!hub.join(conn, Room::Lobby));
    assert_eq!(hub.room_size(Room::Lobby), 0);
  }

  #[test]
  fn publish_to_closed_receiver_is_silent() {
    let hub = RoomBroadcaster::new();
    let user = Uuid::new_v4();
    let (conn, rx) = connect(&hub, user);
    hub.join(conn, Room::Lobby);
    drop(rx);

    // No panic, no error: the recipient simply misses the event.
    hub.publish(Room::Lobby, &deleted_event(6));
    hub.publish_to_user(user, &deleted_event(6));
  }
}
