//! Webhook subscriptions and room filter expressions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered webhook, as returned by `POST webhooks` / `GET webhooks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
  pub id:         String,
  pub name:       String,
  pub target_url: String,
  pub resource:   String,
  pub event:      String,
  #[serde(default)]
  pub filter:     Option<String>,
  #[serde(default)]
  pub secret:     Option<String>,
  #[serde(default)]
  pub status:     Option<String>,
  #[serde(default)]
  pub created:    Option<DateTime<Utc>>,
}

impl Webhook {
  /// The room id this webhook is restricted to, if its filter is a room
  /// filter.
  pub fn room_id(&self) -> Option<&str> { self.filter.as_deref().and_then(parse_room_filter) }
}

/// Body of a `POST webhooks` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWebhook {
  pub name:       String,
  pub target_url: String,
  pub resource:   String,
  pub event:      String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub filter:     Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub secret:     Option<String>,
}

// ─── Filter expressions ──────────────────────────────────────────────────────

const ROOM_FILTER_KEY: &str = "roomId";

/// The filter expression restricting a webhook to one room.
pub fn room_filter(room_id: &str) -> String { format!("{ROOM_FILTER_KEY}={room_id}") }

/// Parse `roomId=<id>` and return `<id>`.
///
/// Anything else (another key, an empty id, a compound filter joined with
/// `&`) yields `None`.
pub fn parse_room_filter(expr: &str) -> Option<&str> {
  let (key, value) = expr.split_once('=')?;
  if key.trim() != ROOM_FILTER_KEY {
    return None;
  }
  let value = value.trim();
  if value.is_empty() || value.contains(['=', '&']) {
    return None;
  }
  Some(value)
}
