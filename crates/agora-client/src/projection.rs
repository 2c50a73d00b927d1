//! The reconciler — in-memory projections patched by push events.
//!
//! A viewer holds a sorted, paginated list projection over discussions and,
//! while a discussion is expanded, a detail projection with its own reply
//! list. Page fetches establish the baseline; push events patch it in place.
//!
//! Every merge is keyed on a stable entity id, never a positional index, and
//! creation/deletion events are additionally tracked in seen-sets so the
//! same event delivered twice cannot double-adjust a total. A page response
//! resets the baseline and the bookkeeping with it. The result is the merge
//! law the server's at-least-once, dual-scope fan-out depends on: applying
//! an event twice leaves the projection exactly as applying it once.

use std::collections::HashSet;

use uuid::Uuid;

use agora_core::{
  event::ServerEvent,
  model::{Discussion, Notification, Reply, TargetKind},
  page::{Page, PageQuery, SortKey, cmp_discussions, cmp_replies},
};

// ─── Merge outcome ───────────────────────────────────────────────────────────

/// What applying an event did to a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Applied {
  /// Nothing to do — the event targets another entity, or was already
  /// applied.
  Unchanged,
  /// The projection changed in place.
  Changed,
  /// The projection changed and the driver owes the server a page fetch:
  /// the visible window stepped back after an underflow. The projection
  /// never fabricates rows it has not been given.
  NeedsRefetch,
}

impl Applied {
  /// Combine outcomes from several projections; the most demanding wins.
  fn and(self, other: Applied) -> Applied { self.max(other) }
}

// ─── List projection ─────────────────────────────────────────────────────────

/// The sorted, paginated discussion-list view.
pub struct ListProjection {
  sort:  SortKey,
  page:  u32,
  limit: usize,
  total: u64,
  entries: Vec<Discussion>,
  // Merge bookkeeping, reset by every page fetch.
  created_seen:       HashSet<Uuid>,
  deleted_seen:       HashSet<Uuid>,
  reply_created_seen: HashSet<Uuid>,
  reply_deleted_seen: HashSet<Uuid>,
}

impl ListProjection {
  pub fn new(sort: SortKey, limit: usize) -> Self {
    Self {
      sort,
      page: 1,
      limit,
      total: 0,
      entries: Vec::new(),
      created_seen: HashSet::new(),
      deleted_seen: HashSet::new(),
      reply_created_seen: HashSet::new(),
      reply_deleted_seen: HashSet::new(),
    }
  }

  pub fn entries(&self) -> &[Discussion] { &self.entries }

  pub fn total(&self) -> u64 { self.total }

  pub fn page(&self) -> u32 { self.page }

  pub fn sort(&self) -> SortKey { self.sort }

  /// The query that fetches (or re-fetches) the current window.
  pub fn query(&self) -> PageQuery {
    PageQuery::new(self.page, self.limit as u32, self.sort)
  }

  /// Install a freshly-fetched page as the new baseline. Clears the merge
  /// bookkeeping — the server's totals already account for everything seen.
  pub fn apply_page(&mut self, page: Page<Discussion>) {
    self.page = page.page;
    self.limit = page.limit as usize;
    self.total = page.total;
    self.entries = page.items;
    self.created_seen.clear();
    self.deleted_seen.clear();
    self.reply_created_seen.clear();
    self.reply_deleted_seen.clear();
  }

  fn position(&self, id: Uuid) -> Option<usize> {
    self.entries.iter().position(|d| d.discussion_id == id)
  }

  fn resort(&mut self) {
    let sort = self.sort;
    self.entries.sort_by(|a, b| cmp_discussions(sort, a, b));
  }

  /// Merge one push event into the window.
  pub fn apply_event(&mut self, event: &ServerEvent) -> Applied {
    match event {
      ServerEvent::DiscussionCreated { discussion } => {
        let id = discussion.discussion_id;
        if self.created_seen.contains(&id)
          || self.deleted_seen.contains(&id)
          || self.position(id).is_some()
        {
          return Applied::Unchanged;
        }
        self.created_seen.insert(id);
        self.total += 1;
        if self.page == 1 {
          // Land the newcomer in sorted position and evict the overflow to
          // preserve the page size.
          self.entries.push(discussion.clone());
          self.resort();
          self.entries.truncate(self.limit);
        }
        Applied::Changed
      }

      ServerEvent::DiscussionUpdated { discussion } => {
        let Some(idx) = self.position(discussion.discussion_id) else {
          return Applied::Unchanged;
        };
        self.entries[idx] = discussion.clone();
        self.resort();
        Applied::Changed
      }

      ServerEvent::DiscussionDeleted { discussion_id } => {
        if self.deleted_seen.contains(discussion_id) {
          return Applied::Unchanged;
        }
        self.deleted_seen.insert(*discussion_id);
        if let Some(idx) = self.position(*discussion_id) {
          self.entries.remove(idx);
        }
        self.total = self.total.saturating_sub(1);
        if self.entries.is_empty() && self.page > 1 {
          // Page-boundary invariant: a visible page must never be empty
          // unless it is page 1 of an empty result set.
          self.page -= 1;
          return Applied::NeedsRefetch;
        }
        Applied::Changed
      }

      ServerEvent::LikeUpdated {
        target_kind: TargetKind::Discussion,
        target_id,
        likes_count,
        ..
      } => {
        let Some(idx) = self.position(*target_id) else {
          return Applied::Unchanged;
        };
        self.entries[idx].likes_count = *likes_count;
        if self.sort == SortKey::MostLiked {
          // Re-sort the current page's elements only — never a re-fetch.
          self.resort();
        }
        Applied::Changed
      }

      ServerEvent::ReplyCreated { reply } => {
        if !self.reply_created_seen.insert(reply.reply_id) {
          return Applied::Unchanged;
        }
        let Some(idx) = self.position(reply.discussion_id) else {
          return Applied::Unchanged;
        };
        // The entry's reply list may be collapsed; the count still moves.
        self.entries[idx].replies_count += 1;
        Applied::Changed
      }

      ServerEvent::ReplyDeleted { discussion_id, reply_id } => {
        if !self.reply_deleted_seen.insert(*reply_id) {
          return Applied::Unchanged;
        }
        let Some(idx) = self.position(*discussion_id) else {
          return Applied::Unchanged;
        };
        self.entries[idx].replies_count =
          self.entries[idx].replies_count.saturating_sub(1);
        Applied::Changed
      }

      // Reply likes, bookmark state, and notifications do not shape the
      // list window.
      _ => Applied::Unchanged,
    }
  }
}

// ─── Detail projection ───────────────────────────────────────────────────────

/// One expanded discussion with its accumulated, sorted reply list.
///
/// Reply pages accumulate (a "load more" model): fetched pages are merged by
/// id rather than replacing the set, and created replies append without
/// evicting.
pub struct DetailProjection {
  discussion:  Discussion,
  reply_sort:  SortKey,
  reply_page:  u32,
  reply_limit: usize,
  reply_total: u64,
  replies:     Vec<Reply>,
  reply_deleted_seen: HashSet<Uuid>,
}

impl DetailProjection {
  pub fn new(discussion: Discussion, reply_sort: SortKey, reply_limit: usize) -> Self {
    Self {
      discussion,
      reply_sort,
      reply_page: 1,
      reply_limit,
      reply_total: 0,
      replies: Vec::new(),
      reply_deleted_seen: HashSet::new(),
    }
  }

  pub fn discussion(&self) -> &Discussion { &self.discussion }

  pub fn replies(&self) -> &[Reply] { &self.replies }

  pub fn reply_total(&self) -> u64 { self.reply_total }

  /// The query that fetches the next reply page.
  pub fn reply_query(&self) -> PageQuery {
    PageQuery::new(self.reply_page, self.reply_limit as u32, self.reply_sort)
  }

  fn resort_replies(&mut self) {
    let sort = self.reply_sort;
    self.replies.sort_by(|a, b| cmp_replies(sort, a, b));
  }

  /// Merge a fetched reply page into the accumulated set.
  pub fn apply_reply_page(&mut self, page: Page<Reply>) {
    self.reply_page = page.page;
    self.reply_limit = page.limit as usize;
    self.reply_total = page.total;
    for reply in page.items {
      match self.replies.iter().position(|r| r.reply_id == reply.reply_id) {
        Some(idx) => self.replies[idx] = reply,
        None => self.replies.push(reply),
      }
    }
    self.resort_replies();
    self.reply_deleted_seen.clear();
  }

  /// Merge one push event into the expanded view.
  pub fn apply_event(&mut self, event: &ServerEvent) -> Applied {
    match event {
      ServerEvent::DiscussionUpdated { discussion }
        if discussion.discussion_id == self.discussion.discussion_id =>
      {
        self.discussion = discussion.clone();
        Applied::Changed
      }

      ServerEvent::ReplyCreated { reply }
        if reply.discussion_id == self.discussion.discussion_id =>
      {
        if self.replies.iter().any(|r| r.reply_id == reply.reply_id)
          || self.reply_deleted_seen.contains(&reply.reply_id)
        {
          return Applied::Unchanged;
        }
        self.replies.push(reply.clone());
        self.resort_replies();
        self.reply_total += 1;
        self.discussion.replies_count += 1;
        Applied::Changed
      }

      ServerEvent::ReplyUpdated { reply }
        if reply.discussion_id == self.discussion.discussion_id =>
      {
        let Some(idx) =
          self.replies.iter().position(|r| r.reply_id == reply.reply_id)
        else {
          return Applied::Unchanged;
        };
        self.replies[idx] = reply.clone();
        self.resort_replies();
        Applied::Changed
      }

      ServerEvent::ReplyDeleted { discussion_id, reply_id }
        if *discussion_id == self.discussion.discussion_id =>
      {
        if !self.reply_deleted_seen.insert(*reply_id) {
          return Applied::Unchanged;
        }
        if let Some(idx) =
          self.replies.iter().position(|r| r.reply_id == *reply_id)
        {
          self.replies.remove(idx);
        }
        self.reply_total = self.reply_total.saturating_sub(1);
        self.discussion.replies_count =
          self.discussion.replies_count.saturating_sub(1);
        Applied::Changed
      }

      ServerEvent::LikeUpdated {
        target_kind: TargetKind::Discussion,
        target_id,
        likes_count,
        ..
      } if *target_id == self.discussion.discussion_id => {
        self.discussion.likes_count = *likes_count;
        Applied::Changed
      }

      ServerEvent::LikeUpdated {
        target_kind: TargetKind::Reply,
        target_id,
        likes_count,
        ..
      } => {
        let Some(idx) =
          self.replies.iter().position(|r| r.reply_id == *target_id)
        else {
          return Applied::Unchanged;
        };
        self.replies[idx].likes_count = *likes_count;
        if self.reply_sort == SortKey::MostLiked {
          self.resort_replies();
        }
        Applied::Changed
      }

      _ => Applied::Unchanged,
    }
  }
}

// ─── Viewer ──────────────────────────────────────────────────────────────────

/// One viewer's complete client state: the list projection, an optional
/// expanded detail, the personal bookmark set, and the notification feed.
///
/// Events route to every interested projection — the same `reply.created`
/// moves the collapsed list entry's count and appends to an open detail.
/// Dual delivery (lobby + room) is absorbed by the idempotent merges.
pub struct Viewer {
  list:   ListProjection,
  detail: Option<DetailProjection>,
  bookmarked: HashSet<Uuid>,
  notifications: Vec<Notification>,
  unread: u64,
}

impl Viewer {
  pub fn new(sort: SortKey, limit: usize) -> Self {
    Self {
      list:   ListProjection::new(sort, limit),
      detail: None,
      bookmarked: HashSet::new(),
      notifications: Vec::new(),
      unread: 0,
    }
  }

  pub fn list(&self) -> &ListProjection { &self.list }

  pub fn detail(&self) -> Option<&DetailProjection> { self.detail.as_ref() }

  pub fn bookmarked(&self) -> &HashSet<Uuid> { &self.bookmarked }

  pub fn notifications(&self) -> &[Notification] { &self.notifications }

  pub fn unread_notifications(&self) -> u64 { self.unread }

  /// Install a fetched discussion page.
  pub fn apply_list_page(&mut self, page: Page<Discussion>) {
    self.list.apply_page(page);
  }

  /// Seed the bookmark set from `GET /api/bookmarks/ids`.
  pub fn seed_bookmarks(&mut self, ids: impl IntoIterator<Item = Uuid>) {
    self.bookmarked = ids.into_iter().collect();
  }

  /// Expand a discussion. The caller is responsible for joining the
  /// matching room on its live connection.
  pub fn open_detail(
    &mut self,
    discussion: Discussion,
    reply_sort: SortKey,
    reply_limit: usize,
  ) {
    self.detail = Some(DetailProjection::new(discussion, reply_sort, reply_limit));
  }

  /// Merge a fetched reply page into the open detail, if any.
  pub fn apply_reply_page(&mut self, page: Page<Reply>) {
    if let Some(detail) = &mut self.detail {
      detail.apply_reply_page(page);
    }
  }

  /// Collapse the detail view. Only the discussion-room membership goes
  /// with it — the list projection and the personal event handling below
  /// are untouched, so notifications and bookmark toggles keep working.
  pub fn close_detail(&mut self) {
    self.detail = None;
  }

  /// Merge one push event into every projection it concerns.
  pub fn apply_event(&mut self, event: &ServerEvent) -> Applied {
    let mut applied = Applied::Unchanged;

    // Personal state first.
    match event {
      ServerEvent::BookmarkUpdated { discussion_id, bookmarked } => {
        let changed = if *bookmarked {
          self.bookmarked.insert(*discussion_id)
        } else {
          self.bookmarked.remove(discussion_id)
        };
        if changed {
          applied = applied.and(Applied::Changed);
        }
      }
      ServerEvent::NotificationCreated { notification } => {
        let known = self
          .notifications
          .iter()
          .any(|n| n.notification_id == notification.notification_id);
        if !known {
          self.notifications.insert(0, notification.clone());
          self.unread += 1;
          applied = applied.and(Applied::Changed);
        }
      }
      ServerEvent::DiscussionDeleted { discussion_id } => {
        // The cascade removed any bookmark fact server-side; mirror it.
        self.bookmarked.remove(discussion_id);
        if self
          .detail
          .as_ref()
          .is_some_and(|d| d.discussion().discussion_id == *discussion_id)
        {
          self.detail = None;
          applied = applied.and(Applied::Changed);
        }
      }
      _ => {}
    }

    applied = applied.and(self.list.apply_event(event));
    if let Some(detail) = &mut self.detail {
      applied = applied.and(detail.apply_event(event));
    }
    applied
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
