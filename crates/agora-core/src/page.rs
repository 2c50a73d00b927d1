//! Pagination and sort-order types shared by server reads and client merges.
//!
//! The comparators here are canonical: the SQLite `ORDER BY` clauses and the
//! client-side page re-sorts must both agree with them, or a merged event
//! would place an entry differently than the next page fetch.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::{Discussion, Reply};

// ─── Sort keys ───────────────────────────────────────────────────────────────

/// How a paginated read is ordered. Ties always break on ascending id so the
/// order is total and stable under concurrent inserts.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
  /// Newest first by `created_at`.
  #[default]
  Recent,
  /// Highest `likes_count` first.
  MostLiked,
  /// Oldest first; the natural order for reading a reply thread.
  Oldest,
}

/// Canonical discussion ordering under `sort`.
pub fn cmp_discussions(sort: SortKey, a: &Discussion, b: &Discussion) -> Ordering {
  match sort {
    SortKey::Recent => b
      .created_at
      .cmp(&a.created_at)
      .then_with(|| a.discussion_id.cmp(&b.discussion_id)),
    SortKey::MostLiked => b
      .likes_count
      .cmp(&a.likes_count)
      .then_with(|| a.discussion_id.cmp(&b.discussion_id)),
    SortKey::Oldest => a
      .created_at
      .cmp(&b.created_at)
      .then_with(|| a.discussion_id.cmp(&b.discussion_id)),
  }
}

/// Canonical reply ordering under `sort`.
pub fn cmp_replies(sort: SortKey, a: &Reply, b: &Reply) -> Ordering {
  match sort {
    SortKey::Recent => b
      .created_at
      .cmp(&a.created_at)
      .then_with(|| a.reply_id.cmp(&b.reply_id)),
    SortKey::MostLiked => b
      .likes_count
      .cmp(&a.likes_count)
      .then_with(|| a.reply_id.cmp(&b.reply_id)),
    SortKey::Oldest => a
      .created_at
      .cmp(&b.created_at)
      .then_with(|| a.reply_id.cmp(&b.reply_id)),
  }
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// Parameters for a paginated read. `page` is 1-based.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageQuery {
  #[serde(default = "default_page")]
  pub page:  u32,
  #[serde(default = "default_limit")]
  pub limit: u32,
  #[serde(default)]
  pub sort:  SortKey,
}

const fn default_page() -> u32 { 1 }
const fn default_limit() -> u32 { 20 }

/// The largest page size a caller may request.
pub const MAX_PAGE_LIMIT: u32 = 100;

impl Default for PageQuery {
  fn default() -> Self {
    Self {
      page:  default_page(),
      limit: default_limit(),
      sort:  SortKey::default(),
    }
  }
}

impl PageQuery {
  pub fn new(page: u32, limit: u32, sort: SortKey) -> Self {
    Self { page, limit, sort }
  }

  /// Clamp out-of-range values instead of rejecting them: `page` ≥ 1,
  /// 1 ≤ `limit` ≤ [`MAX_PAGE_LIMIT`].
  pub fn clamped(self) -> Self {
    Self {
      page:  self.page.max(1),
      limit: self.limit.clamp(1, MAX_PAGE_LIMIT),
      sort:  self.sort,
    }
  }

  /// Row offset of the first item on this page.
  pub fn offset(&self) -> u64 {
    u64::from(self.page.max(1) - 1) * u64::from(self.limit)
  }
}

// ─── Page ────────────────────────────────────────────────────────────────────

/// One page of a paginated read, with the total count of the full result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
  pub items:    Vec<T>,
  pub total:    u64,
  pub page:     u32,
  pub limit:    u32,
  pub has_more: bool,
}

impl<T> Page<T> {
  /// Assemble a page from its items, the total result count, and the query
  /// that produced it.
  pub fn new(items: Vec<T>, total: u64, query: PageQuery) -> Self {
    let has_more = u64::from(query.page) * u64::from(query.limit) < total;
    Self {
      items,
      total,
      page: query.page,
      limit: query.limit,
      has_more,
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use uuid::Uuid;

  use super::*;

  fn discussion(likes: u64, at_secs: i64) -> Discussion {
    let at = Utc.timestamp_opt(at_secs, 0).unwrap();
    Discussion {
      discussion_id: Uuid::new_v4(),
      author_id:     Uuid::new_v4(),
      title:         "a title long enough".into(),
      content:       "content long enough to pass validation elsewhere".into(),
      tags:          vec![],
      created_at:    at,
      updated_at:    at,
      likes_count:   likes,
      replies_count: 0,
    }
  }

  #[test]
  fn recent_sorts_newest_first() {
    let older = discussion(0, 100);
    let newer = discussion(0, 200);
    assert_eq!(
      cmp_discussions(SortKey::Recent, &newer, &older),
      std::cmp::Ordering::Less
    );
  }

  #[test]
  fn most_liked_breaks_ties_on_id() {
    let mut a = discussion(3, 100);
    let mut b = discussion(3, 100);
    a.discussion_id = Uuid::from_u128(1);
    b.discussion_id = Uuid::from_u128(2);
    assert_eq!(
      cmp_discussions(SortKey::MostLiked, &a, &b),
      std::cmp::Ordering::Less
    );
  }

  #[test]
  fn page_query_clamps_limit_and_page() {
    let q = PageQuery::new(0, 10_000, SortKey::Recent).clamped();
    assert_eq!(q.page, 1);
    assert_eq!(q.limit, MAX_PAGE_LIMIT);
  }

  #[test]
  fn page_has_more_accounts_for_total() {
    let q = PageQuery::new(1, 5, SortKey::Recent);
    assert!(Page::new(vec![0u8; 5], 6, q).has_more);
    assert!(!Page::new(vec![0u8; 5], 5, q).has_more);
  }
}
