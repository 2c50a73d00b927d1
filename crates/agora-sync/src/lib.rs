//! The real-time synchronization core: mutation coordination, notification
//! derivation, and room-scoped event fan-out.
//!
//! A write request flows through [`Coordinator`], which applies it via the
//! [`agora_core::store::FactStore`], recomputes the affected aggregates from
//! the fact tables, derives notifications through [`Notifier`], and publishes
//! typed events through [`RoomBroadcaster`]. Nothing here blocks on a remote
//! client: publishing is fire-and-forget.

pub mod coordinator;
pub mod error;
pub mod notify;
pub mod rooms;

pub use coordinator::Coordinator;
pub use error::{MutationError, MutationResult};
pub use notify::Notifier;
pub use rooms::{ConnectionId, RoomBroadcaster};
