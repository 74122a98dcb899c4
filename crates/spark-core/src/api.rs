//! The `SparkApi` trait and the wire records it exchanges.
//!
//! The trait is implemented by `spark-client` against the platform's REST API
//! and by in-process fakes in tests. Higher layers (`spark-backend`) depend on
//! this abstraction, not on any concrete client.

use std::{future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  identity::Person,
  room::{Membership, Room, RoomType},
  webhook::{NewWebhook, Webhook},
};

// ─── Wire records ────────────────────────────────────────────────────────────

/// Search parameters for [`SparkApi::list_people`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeopleQuery {
  pub email:        Option<String>,
  pub display_name: Option<String>,
}

impl PeopleQuery {
  pub fn by_email(email: impl Into<String>) -> Self {
    Self { email: Some(email.into()), ..Self::default() }
  }

  pub fn by_display_name(name: impl Into<String>) -> Self {
    Self { display_name: Some(name.into()), ..Self::default() }
  }
}

/// Body of a `POST messages` call. Exactly one of `room_id` and
/// `to_person_id` is set; use the constructors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub room_id:      Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub to_person_id: Option<String>,
  pub text:         String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub markdown:     Option<String>,
}

impl NewMessage {
  pub fn to_room(room_id: impl Into<String>, text: impl Into<String>) -> Self {
    Self {
      room_id:      Some(room_id.into()),
      to_person_id: None,
      text:         text.into(),
      markdown:     None,
    }
  }

  pub fn to_person(person_id: impl Into<String>, text: impl Into<String>) -> Self {
    Self {
      room_id:      None,
      to_person_id: Some(person_id.into()),
      text:         text.into(),
      markdown:     None,
    }
  }

  pub fn with_markdown(mut self, markdown: impl Into<String>) -> Self {
    self.markdown = Some(markdown.into());
    self
  }
}

/// A message as returned by `GET messages/{id}` and `POST messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
  pub id:           String,
  pub room_id:      String,
  #[serde(default)]
  pub room_type:    Option<RoomType>,
  /// Absent for file-only messages.
  #[serde(default)]
  pub text:         Option<String>,
  #[serde(default)]
  pub markdown:     Option<String>,
  pub person_id:    String,
  #[serde(default)]
  pub person_email: Option<String>,
  #[serde(default)]
  pub created:      Option<DateTime<Utc>>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Typed access to the platform REST API.
///
/// Implementations classify HTTP failures into [`crate::Error`]: 404 is
/// [`crate::Error::NotFound`], 409 is [`crate::Error::Conflict`], timeouts and
/// connection failures are [`crate::Error::Timeout`] / [`crate::Error::Transport`].
///
/// All methods return `Send` futures so the trait can be used from axum
/// handlers on a multi-threaded runtime.
pub trait SparkApi: Send + Sync {
  // ── People ────────────────────────────────────────────────────────────

  /// `GET people/me`: the identity the token belongs to.
  fn me(&self) -> impl Future<Output = Result<Person>> + Send + '_;

  /// `GET people?email=|displayName=`
  fn list_people<'a>(
    &'a self,
    query: &'a PeopleQuery,
  ) -> impl Future<Output = Result<Vec<Person>>> + Send + 'a;

  /// `GET people/{id}`
  fn get_person<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Person>> + Send + 'a;

  // ── Rooms & memberships ───────────────────────────────────────────────

  /// `GET rooms/{id}`
  fn get_room<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Room>> + Send + 'a;

  /// `POST memberships`: add `person_id` to `room_id`.
  fn create_membership<'a>(
    &'a self,
    room_id: &'a str,
    person_id: &'a str,
  ) -> impl Future<Output = Result<Membership>> + Send + 'a;

  /// `GET memberships?roomId=`
  fn list_memberships<'a>(
    &'a self,
    room_id: &'a str,
  ) -> impl Future<Output = Result<Vec<Membership>>> + Send + 'a;

  /// `DELETE memberships/{id}`
  fn delete_membership<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  // ── Messages ──────────────────────────────────────────────────────────

  /// `POST messages`
  fn create_message<'a>(
    &'a self,
    message: &'a NewMessage,
  ) -> impl Future<Output = Result<MessageRecord>> + Send + 'a;

  /// `GET messages/{id}`
  fn get_message<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<MessageRecord>> + Send + 'a;

  // ── Webhooks ──────────────────────────────────────────────────────────

  /// `POST webhooks`. Never retried by implementations: a retry after a
  /// lost response would register a duplicate subscription.
  fn create_webhook<'a>(
    &'a self,
    webhook: &'a NewWebhook,
  ) -> impl Future<Output = Result<Webhook>> + Send + 'a;

  /// `GET webhooks`
  fn list_webhooks(&self) -> impl Future<Output = Result<Vec<Webhook>>> + Send + '_;

  /// `DELETE webhooks/{id}`
  fn delete_webhook<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;
}

impl<T: SparkApi> SparkApi for Arc<T> {
  fn me(&self) -> impl Future<Output = Result<Person>> + Send + '_ { (**self).me() }

  fn list_people<'a>(&'a self, query: &'a PeopleQuery) -> impl Future<Output = Result<Vec<Person>>> + Send + 'a {
    (**self).list_people(query)
  }

  fn get_person<'a>(&'a self, id: &'a str) -> impl Future<Output = Result<Person>> + Send + 'a {
    (**self).get_person(id)
  }

  fn get_room<'a>(&'a self, id: &'a str) -> impl Future<Output = Result<Room>> + Send + 'a {
    (**self).get_room(id)
  }

  fn create_membership<'a>(
    &'a self,
    room_id: &'a str,
    person_id: &'a str,
  ) -> impl Future<Output = Result<Membership>> + Send + 'a {
    (**self).create_membership(room_id, person_id)
  }

  fn list_memberships<'a>(&'a self, room_id: &'a str) -> impl Future<Output = Result<Vec<Membership>>> + Send + 'a {
    (**self).list_memberships(room_id)
  }

  fn delete_membership<'a>(&'a self, id: &'a str) -> impl Future<Output = Result<()>> + Send + 'a {
    (**self).delete_membership(id)
  }

  fn create_message<'a>(
    &'a self,
    message: &'a NewMessage,
  ) -> impl Future<Output = Result<MessageRecord>> + Send + 'a {
    (**self).create_message(message)
  }

  fn get_message<'a>(&'a self, id: &'a str) -> impl Future<Output = Result<MessageRecord>> + Send + 'a {
    (**self).get_message(id)
  }

  fn create_webhook<'a>(&'a self, webhook: &'a NewWebhook) -> impl Future<Output = Result<Webhook>> + Send + 'a {
    (**self).create_webhook(webhook)
  }

  fn list_webhooks(&self) -> impl Future<Output = Result<Vec<Webhook>>> + Send + '_ { (**self).list_webhooks() }

  fn delete_webhook<'a>(&'a self, id: &'a str) -> impl Future<Output = Result<()>> + Send + 'a {
    (**self).delete_webhook(id)
  }
}
