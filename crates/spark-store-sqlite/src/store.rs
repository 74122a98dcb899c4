//! [`SqliteStore`], the SQLite implementation of [`MemoryStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use serde_json::Value;
use spark_core::memory::{MemoryStore, Values};
use tracing::debug;

use crate::{Error, Result, schema::SCHEMA};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A memory store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted. All
/// statements run on the connection's own thread, one at a time, so each
/// operation is atomic.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

fn decode_value(id: &str, key: &str, raw: &str) -> Result<Value> {
  serde_json::from_str(raw).map_err(|source| Error::CorruptValue {
    id: id.to_string(),
    key: key.to_string(),
    source,
  })
}

// ─── MemoryStore impl ────────────────────────────────────────────────────────

impl MemoryStore for SqliteStore {
  type Error = Error;

  async fn remember(&self, id: &str, key: &str, value: Value) -> Result<()> {
    let id_str     = id.to_string();
    let key_str    = key.to_string();
    let value_json = serde_json::to_string(&value)?;
    let at_str     = Utc::now().to_rfc3339();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO memory (entity_id, key, value_json, updated_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (entity_id, key)
           DO UPDATE SET value_json = excluded.value_json,
                         updated_at = excluded.updated_at",
          rusqlite::params![id_str, key_str, value_json, at_str],
        )?;
        Ok(())
      })
      .await?;

    debug!(id, key, "remembered");
    Ok(())
  }

  async fn forget(&self, id: &str, key: &str) -> Result<Option<Value>> {
    let id_str  = id.to_string();
    let key_str = key.to_string();

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "DELETE FROM memory WHERE entity_id = ?1 AND key = ?2 RETURNING value_json",
            rusqlite::params![id_str, key_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    debug!(id, key, found = raw.is_some(), "forgot");
    raw.map(|r| decode_value(id, key, &r)).transpose()
  }

  async fn recall(&self, id: &str) -> Result<Values> {
    let id_str = id.to_string();

    let rows: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn
          .prepare("SELECT key, value_json FROM memory WHERE entity_id = ?1 ORDER BY key")?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut values = Values::new();
    for (key, raw) in rows {
      let value = decode_value(id, &key, &raw)?;
      values.insert(key, value);
    }
    Ok(values)
  }

  async fn recall_key(&self, id: &str, key: &str) -> Result<Option<Value>> {
    let id_str  = id.to_string();
    let key_str = key.to_string();

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT value_json FROM memory WHERE entity_id = ?1 AND key = ?2",
            rusqlite::params![id_str, key_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    raw.map(|r| decode_value(id, key, &r)).transpose()
  }
}
