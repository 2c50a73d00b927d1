//! SQLite backend for the Agora fact store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! pool without blocking the async runtime. Uniqueness constraints on likes,
//! bookmarks, and the notification identity tuple are what the toggle and
//! upsert semantics in `agora-sync` build on.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
