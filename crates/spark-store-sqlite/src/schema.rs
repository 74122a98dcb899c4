//! SQL schema for the Spark SQLite memory store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per (entity, key). An entity's dictionary is the set of its rows.
CREATE TABLE IF NOT EXISTS memory (
    entity_id   TEXT NOT NULL,   -- platform id of a room or person
    key         TEXT NOT NULL,
    value_json  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,   -- RFC 3339 UTC
    PRIMARY KEY (entity_id, key)
);

PRAGMA user_version = 1;
";
