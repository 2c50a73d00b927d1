//! REST handlers, one module per resource.

pub mod bookmarks;
pub mod discussions;
pub mod likes;
pub mod notifications;
pub mod replies;
