//! The framework-facing message model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
  identity::{Identifier, Person, RoomOccupant},
  room::RoomType,
};

/// Well-known keys in [`Message::extras`].
pub mod extras {
  pub const ROOM_TYPE: &str = "roomType";
  pub const ROOM_ID: &str = "roomId";
  pub const MESSAGE_ID: &str = "messageId";
  pub const PERSON_EMAIL: &str = "personEmail";
}

/// Sender or recipient of a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
  /// Direct (one-to-one) addressing.
  Person(Person),
  /// A person inside a room; delivery goes to the room.
  Occupant(RoomOccupant),
}

impl Identity {
  pub fn as_person(&self) -> &Person {
    match self {
      Self::Person(p) => p,
      Self::Occupant(o) => &o.person,
    }
  }

  pub fn room_id(&self) -> Option<&str> {
    match self {
      Self::Person(_) => None,
      Self::Occupant(o) => Some(&o.room_id),
    }
  }
}

impl Identifier for Identity {
  fn person(&self) -> &str { &self.as_person().id }

  fn fullname(&self) -> &str { &self.as_person().display_name }
}

impl From<Person> for Identity {
  fn from(p: Person) -> Self { Self::Person(p) }
}

impl From<RoomOccupant> for Identity {
  fn from(o: RoomOccupant) -> Self { Self::Occupant(o) }
}

/// A chat message exchanged with the framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  /// Platform id; `None` for messages built locally and not yet sent.
  pub id:     Option<String>,
  pub body:   String,
  pub from:   Identity,
  pub to:     Identity,
  pub extras: BTreeMap<String, String>,
}

impl Message {
  pub fn new(body: impl Into<String>, from: Identity, to: Identity) -> Self {
    Self {
      id: None,
      body: body.into(),
      from,
      to,
      extras: BTreeMap::new(),
    }
  }

  pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.extras.insert(key.into(), value.into());
    self
  }

  pub fn room_type(&self) -> Option<&str> { self.extras.get(extras::ROOM_TYPE).map(String::as_str) }

  /// `true` iff the `roomType` extra is `direct`.
  pub fn is_direct(&self) -> bool { self.room_type() == Some(RoomType::Direct.as_str()) }

  pub fn is_group(&self) -> bool { !self.is_direct() }
}
