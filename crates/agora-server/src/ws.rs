//! The live push channel.
//!
//! Each upgraded socket registers one connection with the room broadcaster:
//! the user channel is implicit from registration to disconnect, room
//! membership follows the client's join/leave commands. Outbound events are
//! drained from the connection's queue and written to the socket; a write
//! failure or a close frame tears the connection down, dropping every
//! membership at once.

use std::sync::Arc;

use axum::{
  extract::{
    State, WebSocketUpgrade,
    ws::{Message, WebSocket},
  },
  response::Response,
};
use futures_util::{SinkExt as _, StreamExt as _};
use tokio::sync::mpsc;
use uuid::Uuid;

use agora_core::{event::ClientCommand, store::FactStore};
use agora_sync::{ConnectionId, RoomBroadcaster};

use crate::{AppState, identity::Identity};

/// `GET /ws` — upgrade to the live channel.
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  ws: WebSocketUpgrade,
) -> Response
where
  S: FactStore + 'static,
{
  let rooms = Arc::clone(&state.rooms);
  ws.on_upgrade(move |socket| drive_socket(socket, rooms, identity.user_id))
}

async fn drive_socket(socket: WebSocket, rooms: Arc<RoomBroadcaster>, user_id: Uuid) {
  let conn = ConnectionId::new();
  let (tx, mut events) = mpsc::unbounded_channel();
  rooms.register(conn, user_id, tx);
  tracing::debug!(%user_id, "live connection opened");

  let (mut sink, mut stream) = socket.split();

  loop {
    tokio::select! {
      outbound = events.recv() => {
        // The sender lives in the broadcaster tables until `disconnect`,
        // so `None` here only happens after teardown below.
        let Some(event) = outbound else { break };
        let text = match serde_json::to_string(&event) {
          Ok(text) => text,
          Err(err) => {
            tracing::warn!(?err, "failed to serialise event");
            continue;
          }
        };
        if sink.send(Message::Text(text.into())).await.is_err() {
          break;
        }
      }
      inbound = stream.next() => {
        match inbound {
          Some(Ok(Message::Text(text))) => {
            match serde_json::from_str::<ClientCommand>(&text) {
              Ok(ClientCommand::Join { room }) => {
                rooms.join(conn, room);
              }
              Ok(ClientCommand::Leave { room }) => {
                rooms.leave(conn, room);
              }
              Err(err) => {
                tracing::debug!(?err, "ignoring malformed client command");
              }
            }
          }
          Some(Ok(Message::Close(_))) | None => break,
          // Ping/pong are answered by axum; binary frames are not part of
          // the protocol.
          Some(Ok(_)) => {}
          Some(Err(err)) => {
            tracing::debug!(?err, "socket error");
            break;
          }
        }
      }
    }
  }

  rooms.disconnect(conn);
  tracing::debug!(%user_id, "live connection closed");
}
