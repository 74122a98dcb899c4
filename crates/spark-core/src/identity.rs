//! People and room occupants.
//!
//! A [`Person`] is either *full* (decoded from a platform payload) or
//! *shallow* (only the id is known). Shallow people come from webhook
//! references and [`Person::shallow`]; [`Person::load`] resolves them.

use std::{
  fmt,
  hash::{Hash, Hasher},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  Result,
  api::{PeopleQuery, SparkApi},
  room::Membership,
};

// ─── Identifier ──────────────────────────────────────────────────────────────

/// The identifier surface the chat framework reads from senders and
/// recipients.
pub trait Identifier {
  /// The platform id of the person behind this identifier.
  fn person(&self) -> &str;

  /// Client/resource part; the platform has none.
  fn client(&self) -> &str { "" }

  /// The platform has no nicknames.
  fn nick(&self) -> &str { "" }

  fn fullname(&self) -> &str;

  /// The attribute ACLs are matched against.
  fn aclattr(&self) -> &str { self.person() }
}

// ─── Person ──────────────────────────────────────────────────────────────────

/// A platform user.
///
/// Equality and hashing consider only [`Person::id`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
  pub id:           String,
  pub emails:       Vec<String>,
  pub display_name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created:      Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub avatar:       Option<String>,
  #[serde(skip)]
  shallow:          bool,
}

impl Person {
  /// An unresolved person carrying only its id. Nothing is fetched.
  pub fn shallow(id: impl Into<String>) -> Self {
    Self {
      id:           id.into(),
      emails:       Vec::new(),
      display_name: String::new(),
      created:      None,
      avatar:       None,
      shallow:      true,
    }
  }

  /// Strictly decode a person from a raw attribute mapping. Missing `id`,
  /// `emails` or `displayName` is an error; unknown attributes are ignored.
  pub fn from_attributes(attributes: serde_json::Value) -> Result<Self> {
    Ok(serde_json::from_value(attributes)?)
  }

  /// Build the person half of an occupant from a membership record.
  pub fn from_membership(membership: &Membership) -> Self {
    let mut person = Self::shallow(membership.person_id.clone());
    if let Some(email) = &membership.person_email {
      person.emails.push(email.clone());
    }
    if let Some(name) = &membership.person_display_name {
      person.display_name = name.clone();
    }
    person
  }

  pub fn is_shallow(&self) -> bool { self.shallow }

  /// The first email address, if any.
  pub fn email(&self) -> Option<&str> { self.emails.first().map(String::as_str) }

  /// Replace this value with the full remote record for the same id.
  pub async fn load<A: SparkApi>(&mut self, api: &A) -> Result<()> {
    *self = api.get_person(&self.id).await?;
    Ok(())
  }

  /// Return the FIRST person whose email matches `email`.
  pub async fn find_by_email<A: SparkApi>(api: &A, email: &str) -> Result<Option<Self>> {
    let found = api.list_people(&PeopleQuery::by_email(email)).await?;
    debug!(email, matches = found.len(), "people lookup by email");
    Ok(found.into_iter().next())
  }

  /// Return the FIRST person whose display name matches `name`.
  pub async fn find_by_display_name<A: SparkApi>(api: &A, name: &str) -> Result<Option<Self>> {
    let found = api.list_people(&PeopleQuery::by_display_name(name)).await?;
    debug!(name, matches = found.len(), "people lookup by display name");
    Ok(found.into_iter().next())
  }

  /// Fetch a person by id. A 404 surfaces as [`crate::Error::NotFound`].
  pub async fn get_by_id<A: SparkApi>(api: &A, id: &str) -> Result<Self> {
    api.get_person(id).await
  }
}

impl PartialEq for Person {
  fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl Eq for Person {}

impl Hash for Person {
  fn hash<H: Hasher>(&self, state: &mut H) { self.id.hash(state); }
}

impl fmt::Display for Person {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.id) }
}

impl Identifier for Person {
  fn person(&self) -> &str { &self.id }

  fn fullname(&self) -> &str { &self.display_name }
}

// ─── RoomOccupant ────────────────────────────────────────────────────────────

/// A person in the context of one room. The room is referenced by id only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomOccupant {
  pub person:  Person,
  pub room_id: String,
}

impl RoomOccupant {
  pub fn new(person: Person, room_id: impl Into<String>) -> Self {
    Self { person, room_id: room_id.into() }
  }

  pub fn from_membership(membership: &Membership) -> Self {
    Self::new(Person::from_membership(membership), membership.room_id.clone())
  }
}

impl fmt::Display for RoomOccupant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.person.fmt(f) }
}

impl Identifier for RoomOccupant {
  fn person(&self) -> &str { &self.person.id }

  fn fullname(&self) -> &str { &self.person.display_name }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::testing::FakeApi;

  fn alice() -> serde_json::Value {
    json!({
      "id": "P-alice",
      "emails": ["alice@example.com", "a@example.org"],
      "displayName": "Alice",
      "created": "2017-03-01T10:00:00.000Z",
      "orgId": "O1",
      "type": "person"
    })
  }

  #[test]
  fn attributes_round_trip() {
    let person = Person::from_attributes(alice()).unwrap();
    assert_eq!(person.id, "P-alice");
    assert_eq!(person.emails, vec!["alice@example.com", "a@example.org"]);
    assert_eq!(person.display_name, "Alice");
    assert!(person.created.is_some());
    assert!(!person.is_shallow());
  }

  #[test]
  fn missing_required_attribute_is_an_error() {
    let err = Person::from_attributes(json!({ "id": "P1", "emails": [] }));
    assert!(err.is_err());
  }

  #[test]
  fn equality_is_by_id() {
    let full = Person::from_attributes(alice()).unwrap();
    let shallow = Person::shallow("P-alice");
    assert_eq!(full, shallow);
    assert_ne!(full, Person::shallow("P-bob"));
    assert_eq!(full.to_string(), "P-alice");
  }

  #[test]
  fn identifier_accessors() {
    let person = Person::from_attributes(alice()).unwrap();
    assert_eq!(person.person(), "P-alice");
    assert_eq!(person.fullname(), "Alice");
    assert_eq!(person.aclattr(), "P-alice");
    assert_eq!(person.client(), "");
    assert_eq!(person.nick(), "");

    let occupant = RoomOccupant::new(person, "R1");
    assert_eq!(occupant.person(), "P-alice");
    assert_eq!(occupant.to_string(), "P-alice");
  }

  #[tokio::test]
  async fn lookups_distinguish_found_from_absent() {
    let api = FakeApi::default();
    api.add_person(Person::from_attributes(alice()).unwrap());

    let found = Person::find_by_email(&api, "alice@example.com").await.unwrap();
    assert_eq!(found.map(|p| p.id), Some("P-alice".to_string()));
    assert!(Person::find_by_email(&api, "nobody@example.com").await.unwrap().is_none());

    let found = Person::find_by_display_name(&api, "Alice").await.unwrap();
    assert!(found.is_some());
    assert!(Person::find_by_display_name(&api, "Mallory").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn get_by_id_reports_not_found() {
    let api = FakeApi::default();
    let err = Person::get_by_id(&api, "P-missing").await.unwrap_err();
    assert!(err.is_not_found());
  }

  #[tokio::test]
  async fn load_resolves_a_shallow_person() {
    let api = FakeApi::default();
    api.add_person(Person::from_attributes(alice()).unwrap());

    let mut person = Person::shallow("P-alice");
    assert!(person.is_shallow());
    person.load(&api).await.unwrap();
    assert!(!person.is_shallow());
    assert_eq!(person.display_name, "Alice");
  }
}
