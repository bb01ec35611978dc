//! SQL schema for the Docket SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Change records are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS change_records (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_kind    TEXT    NOT NULL,   -- 'Ticket' | 'Comment' | 'Attachment'
    entity_id      INTEGER NOT NULL,
    change_kind    TEXT    NOT NULL,   -- 'field' | 'marker'
    field_name     TEXT,
    old_value      TEXT,
    new_value      TEXT,
    message        TEXT,
    changed_at     TEXT    NOT NULL,   -- RFC 3339 UTC, fixed-width microseconds
    actor_id       TEXT    NOT NULL,
    batch_id       TEXT    NOT NULL,
    action_kind    TEXT    NOT NULL,   -- 'Create' | 'Update' | 'Delete'
    reference_kind TEXT    NOT NULL,
    reference_id   INTEGER NOT NULL,
    CHECK (
      (change_kind = 'field'  AND field_name IS NOT NULL AND message IS NULL) OR
      (change_kind = 'marker' AND field_name IS NULL     AND message IS NOT NULL)
    )
);

CREATE INDEX IF NOT EXISTS change_records_reference_idx
    ON change_records(reference_kind, reference_id);
CREATE INDEX IF NOT EXISTS change_records_batch_idx
    ON change_records(batch_id);

CREATE TABLE IF NOT EXISTS tickets (
    ticket_id        INTEGER PRIMARY KEY,
    title            TEXT NOT NULL,
    description      TEXT,
    status           TEXT NOT NULL,
    priority         TEXT NOT NULL,
    responsible_name TEXT,
    location         TEXT,
    due_date         TEXT              -- ISO 8601 date
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id INTEGER PRIMARY KEY,
    ticket_id  INTEGER NOT NULL REFERENCES tickets(ticket_id) ON DELETE CASCADE,
    text       TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS attachments (
    attachment_id INTEGER PRIMARY KEY,
    ticket_id     INTEGER NOT NULL REFERENCES tickets(ticket_id) ON DELETE CASCADE,
    file_name     TEXT    NOT NULL,
    content_type  TEXT    NOT NULL,
    size_bytes    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    user_id      TEXT PRIMARY KEY,
    display_name TEXT NOT NULL
);

-- Ids are reserved before the entity row is written so that the row and its
-- change records can be committed together.
CREATE TABLE IF NOT EXISTS id_sequences (
    entity_kind TEXT PRIMARY KEY,
    last_id     INTEGER NOT NULL
);

PRAGMA user_version = 1;
";
