//! Client-side state for Agora viewers.
//!
//! [`client::ApiClient`] wraps the JSON REST API; [`projection`] holds the
//! reconciler — paginated, sorted in-memory views assembled from page
//! fetches and incrementally patched by push events. Merges are idempotent
//! under duplicate delivery, which is what makes the server's at-least-once,
//! dual-scope fan-out safe to consume.

pub mod client;
pub mod projection;

pub use client::{ApiClient, ApiConfig};
pub use projection::{Applied, DetailProjection, ListProjection, Viewer};
