//! SQL schema for the Docket SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;

-- Rows are never deleted. Only status, notes and version are ever updated,
-- and only through a compare-and-swap on (status, version).
CREATE TABLE IF NOT EXISTS requests (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id      TEXT NOT NULL UNIQUE,   -- e.g. 'SR-100'
    kind            TEXT NOT NULL,          -- RequestKind, kebab-case
    submitter_id    TEXT NOT NULL,
    submitter_name  TEXT NOT NULL,
    submitter_role  TEXT NOT NULL,
    payload_json    TEXT NOT NULL,          -- tagged Payload
    status          TEXT NOT NULL,
    notes           TEXT,
    version         INTEGER NOT NULL,       -- equals the history row count
    created_at      TEXT NOT NULL           -- ISO 8601 UTC; server-assigned
);

-- Strictly append-only.
CREATE TABLE IF NOT EXISTS history (
    request_id  TEXT NOT NULL REFERENCES requests(request_id),
    position    INTEGER NOT NULL,           -- 0 is the creation entry
    action      TEXT,                       -- NULL for creation
    actor_role  TEXT NOT NULL,
    actor_name  TEXT NOT NULL,
    to_status   TEXT NOT NULL,
    notes       TEXT,
    recorded_at TEXT NOT NULL,
    PRIMARY KEY (request_id, position)
);

-- Audit notifications; event_id makes redelivery idempotent.
CREATE TABLE IF NOT EXISTS notifications (
    event_id    TEXT PRIMARY KEY,
    request_id  TEXT NOT NULL REFERENCES requests(request_id),
    kind        TEXT NOT NULL,
    action      TEXT NOT NULL,
    from_status TEXT NOT NULL,
    to_status   TEXT NOT NULL,
    actor_role  TEXT NOT NULL,
    actor_name  TEXT NOT NULL,
    message     TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS requests_kind_idx       ON requests(kind);
CREATE INDEX IF NOT EXISTS requests_status_idx     ON requests(status);
CREATE INDEX IF NOT EXISTS requests_submitter_idx  ON requests(submitter_id);
CREATE INDEX IF NOT EXISTS notifications_req_idx   ON notifications(request_id);

PRAGMA user_version = 1;
";
