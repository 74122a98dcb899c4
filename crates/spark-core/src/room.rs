//! Rooms, memberships, and occupant snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  Result,
  api::SparkApi,
  identity::RoomOccupant,
  webhook::Webhook,
};

/// Whether a room is a one-to-one conversation or a group space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
  Direct,
  Group,
}

impl RoomType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Direct => "direct",
      Self::Group => "group",
    }
  }
}

impl fmt::Display for RoomType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

// ─── Membership ──────────────────────────────────────────────────────────────

/// A person's membership of a room, as listed by `GET memberships`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
  pub id:                  String,
  pub room_id:             String,
  pub person_id:           String,
  #[serde(default)]
  pub person_email:        Option<String>,
  #[serde(default)]
  pub person_display_name: Option<String>,
  #[serde(default)]
  pub is_moderator:        bool,
  #[serde(default)]
  pub created:             Option<DateTime<Utc>>,
}

// ─── Room ────────────────────────────────────────────────────────────────────

/// A platform room.
///
/// `webhook` is owned by the subscription manager: it is `Some` exactly while
/// the bot holds an active subscription for this room. `occupants` is a
/// snapshot and only changes through [`Room::refresh_occupants`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
  pub id:          String,
  pub title:       String,
  #[serde(rename = "type")]
  pub room_type:   RoomType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sip_address: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created:     Option<DateTime<Utc>>,
  #[serde(skip)]
  pub webhook:     Option<Webhook>,
  #[serde(skip)]
  occupants:       Vec<RoomOccupant>,
  #[serde(skip)]
  shallow:         bool,
}

impl Room {
  /// An unresolved room carrying only its id. `title` is empty and
  /// `room_type` is a placeholder until [`Room::load`] runs.
  pub fn shallow(id: impl Into<String>) -> Self {
    Self {
      id:          id.into(),
      title:       String::new(),
      room_type:   RoomType::Group,
      sip_address: None,
      created:     None,
      webhook:     None,
      occupants:   Vec::new(),
      shallow:     true,
    }
  }

  /// Strictly decode a room from a raw attribute mapping. `id`, `title` and
  /// `type` are required.
  pub fn from_attributes(attributes: serde_json::Value) -> Result<Self> {
    Ok(serde_json::from_value(attributes)?)
  }

  pub fn is_shallow(&self) -> bool { self.shallow }

  pub fn occupants(&self) -> &[RoomOccupant] { &self.occupants }

  /// Fetch a room by id. A 404 surfaces as [`crate::Error::NotFound`].
  pub async fn get_by_id<A: SparkApi>(api: &A, id: &str) -> Result<Self> {
    api.get_room(id).await
  }

  /// Replace the remote attributes with the full record for the same id.
  /// Local state (webhook handle, occupant snapshot) is kept.
  pub async fn load<A: SparkApi>(&mut self, api: &A) -> Result<()> {
    let fresh = api.get_room(&self.id).await?;
    self.title = fresh.title;
    self.room_type = fresh.room_type;
    self.sip_address = fresh.sip_address;
    self.created = fresh.created;
    self.shallow = false;
    Ok(())
  }

  /// Replace the occupant snapshot using a single membership listing.
  ///
  /// On error the previous snapshot is left untouched.
  pub async fn refresh_occupants<A: SparkApi>(&mut self, api: &A) -> Result<()> {
    debug!(room = %self.id, title = %self.title, before = self.occupants.len(), "updating occupants");

    let memberships = api.list_memberships(&self.id).await?;
    self.occupants = memberships.iter().map(RoomOccupant::from_membership).collect();

    debug!(room = %self.id, title = %self.title, total = self.occupants.len(), "occupants updated");
    Ok(())
  }
}

impl PartialEq for Room {
  fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl Eq for Room {}

impl fmt::Display for Room {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.id) }
}
