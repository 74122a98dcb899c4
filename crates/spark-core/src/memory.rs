//! The `MemoryStore` trait: a small key/value dictionary per platform entity.
//!
//! Plugins use it to share state about a room or person, keyed by the
//! entity's platform id. Implemented by `spark-store-sqlite`.

use std::future::Future;

use serde_json::{Map, Value};

/// The dictionary stored for one entity.
pub type Values = Map<String, Value>;

/// Per-entity key/value storage.
///
/// Each operation is atomic with respect to concurrent callers on the same
/// entity id.
pub trait MemoryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Set `key` to `value` in the dictionary for `id`, creating it if needed.
  fn remember<'a>(
    &'a self,
    id: &'a str,
    key: &'a str,
    value: Value,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Remove `key` from the dictionary for `id`, returning the removed value.
  fn forget<'a>(
    &'a self,
    id: &'a str,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send + 'a;

  /// The whole dictionary for `id`; empty when nothing was stored.
  fn recall<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Values, Self::Error>> + Send + 'a;

  /// A single value from the dictionary for `id`.
  fn recall_key<'a>(
    &'a self,
    id: &'a str,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send + 'a;
}
