//! SQL schema for the Agora SQLite store.
//!
//! Executed once at connection startup; idempotent thanks to
//! `CREATE ... IF NOT EXISTS`. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL.
///
/// Derived counts (`likes_count`, `replies_count`) have no columns here —
/// they are computed by scalar subqueries at read time, so there is nothing
/// to drift.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS discussions (
    discussion_id TEXT PRIMARY KEY,
    author_id     TEXT NOT NULL,
    title         TEXT NOT NULL,
    content       TEXT NOT NULL,
    tags          TEXT NOT NULL DEFAULT '[]',  -- JSON array of strings
    created_at    TEXT NOT NULL,               -- ISO 8601 UTC; server-assigned
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS replies (
    reply_id      TEXT PRIMARY KEY,
    discussion_id TEXT NOT NULL REFERENCES discussions(discussion_id),
    author_id     TEXT NOT NULL,
    content       TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

-- One like per (user, target). The unique constraint is what turns a second
-- identical like request into a toggle instead of a duplicate row.
CREATE TABLE IF NOT EXISTS likes (
    user_id     TEXT NOT NULL,
    target_kind TEXT NOT NULL,   -- 'discussion' | 'reply'
    target_id   TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    UNIQUE (user_id, target_kind, target_id)
);

CREATE TABLE IF NOT EXISTS bookmarks (
    user_id       TEXT NOT NULL,
    discussion_id TEXT NOT NULL REFERENCES discussions(discussion_id),
    created_at    TEXT NOT NULL,
    UNIQUE (user_id, discussion_id)
);

-- Never cascaded on discussion/reply deletion: an append-only audit of
-- 'it happened at least once'.
CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    recipient_id    TEXT NOT NULL,
    sender_id       TEXT NOT NULL,
    kind            TEXT NOT NULL,   -- 'reply' | 'like' | 'mention' | 'bookmark'
    discussion_id   TEXT,
    reply_id        TEXT,
    read            INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

-- NULL refs each count as distinct under a plain UNIQUE constraint, so the
-- identity tuple goes through IFNULL.
CREATE UNIQUE INDEX IF NOT EXISTS notifications_identity_idx
    ON notifications(
        recipient_id, kind,
        IFNULL(discussion_id, ''), IFNULL(reply_id, ''),
        sender_id
    );

CREATE INDEX IF NOT EXISTS replies_discussion_idx      ON replies(discussion_id);
CREATE INDEX IF NOT EXISTS discussions_created_idx     ON discussions(created_at);
CREATE INDEX IF NOT EXISTS likes_target_idx            ON likes(target_kind, target_id);
CREATE INDEX IF NOT EXISTS bookmarks_user_idx          ON bookmarks(user_id);
CREATE INDEX IF NOT EXISTS notifications_recipient_idx ON notifications(recipient_id, read);

PRAGMA user_version = 1;
";
