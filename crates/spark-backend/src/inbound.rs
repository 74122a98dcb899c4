//! Inbound webhook deliveries: parsing, resolution into framework
//! [`Message`]s, and duplicate suppression.

use std::collections::{HashSet, VecDeque};

use serde::Deserialize;
use spark_core::{
  Identity, Message, Person, Room, RoomOccupant, RoomType, api::SparkApi, message::extras,
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
  error::{Error, Result},
  subscriptions::{WEBHOOK_EVENT, WEBHOOK_RESOURCE},
};

// ─── Parsing ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Envelope {
  resource: Option<String>,
  event:    Option<String>,
  data:     Option<EnvelopeData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeData {
  id:           Option<String>,
  room_id:      Option<String>,
  person_id:    Option<String>,
  person_email: Option<String>,
  room_type:    Option<RoomType>,
}

/// The fields of a delivery the backend acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEvent {
  pub resource:     String,
  pub event:        String,
  pub room_id:      String,
  pub message_id:   String,
  pub person_id:    String,
  pub person_email: Option<String>,
  pub room_type:    Option<RoomType>,
}

impl NormalizedEvent {
  pub fn is_message_created(&self) -> bool {
    self.resource == WEBHOOK_RESOURCE && self.event == WEBHOOK_EVENT
  }
}

/// Decode a webhook delivery body.
pub fn parse_event(payload: &[u8]) -> Result<NormalizedEvent> {
  let envelope: Envelope = serde_json::from_slice(payload)
    .map_err(|e| Error::MalformedPayload(format!("invalid JSON: {e}")))?;

  let resource = field("resource", envelope.resource)?;
  let event = field("event", envelope.event)?;
  let data = envelope
    .data
    .ok_or_else(|| Error::MalformedPayload("missing `data`".to_string()))?;

  Ok(NormalizedEvent {
    resource,
    event,
    room_id: field("data.roomId", data.room_id)?,
    message_id: field("data.id", data.id)?,
    person_id: field("data.personId", data.person_id)?,
    person_email: data.person_email,
    room_type: data.room_type,
  })
}

fn field(name: &str, value: Option<String>) -> Result<String> {
  value
    .filter(|v| !v.is_empty())
    .ok_or_else(|| Error::MalformedPayload(format!("missing `{name}`")))
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// Fetch the message behind `event` and wrap it for the framework.
///
/// The sender is a [`Person`] in direct rooms and a [`RoomOccupant`] in group
/// rooms; the recipient is `bot` in the same shape. The room type comes from
/// the delivery or the message record, and only falls back to a room lookup
/// when neither carries it.
pub async fn resolve_message<A: SparkApi>(api: &A, bot: &Person, event: &NormalizedEvent) -> Result<Message> {
  let record = api.get_message(&event.message_id).await?;

  let room_type = match event.room_type.or(record.room_type) {
    Some(t) => t,
    None => Room::get_by_id(api, &record.room_id).await?.room_type,
  };

  let email = record.person_email.clone().or_else(|| event.person_email.clone());
  let sender = match Person::get_by_id(api, &record.person_id).await {
    Ok(person) => person,
    Err(e) => {
      warn!(person = %record.person_id, error = %e, "could not load sender, using a shallow identity");
      let mut person = Person::shallow(record.person_id.clone());
      person.emails.extend(email.clone());
      person
    }
  };

  let (from, to) = match room_type {
    RoomType::Direct => (Identity::Person(sender), Identity::Person(bot.clone())),
    RoomType::Group => (
      Identity::Occupant(RoomOccupant::new(sender, record.room_id.clone())),
      Identity::Occupant(RoomOccupant::new(bot.clone(), record.room_id.clone())),
    ),
  };

  let mut message = Message::new(record.text.clone().unwrap_or_default(), from, to)
    .with_extra(extras::ROOM_TYPE, room_type.as_str())
    .with_extra(extras::ROOM_ID, record.room_id.clone())
    .with_extra(extras::MESSAGE_ID, record.id.clone());
  if let Some(email) = email {
    message = message.with_extra(extras::PERSON_EMAIL, email);
  }
  message.id = Some(record.id);

  debug!(message = ?message.id, room = %event.room_id, %room_type, "resolved message");
  Ok(message)
}

// ─── Deduplication ───────────────────────────────────────────────────────────

pub const DEDUP_WINDOW: usize = 1024;

/// A bounded window of recently dispatched message ids.
pub struct Deduplicator {
  capacity: usize,
  inner:    Mutex<Window>,
}

#[derive(Default)]
struct Window {
  order: VecDeque<String>,
  seen:  HashSet<String>,
}

impl Deduplicator {
  pub fn new(capacity: usize) -> Self { Self { capacity, inner: Mutex::new(Window::default()) } }

  /// Record `id`. Returns `false` if it is already in the window.
  pub async fn first_seen(&self, id: &str) -> bool {
    let mut window = self.inner.lock().await;
    if window.seen.contains(id) {
      return false;
    }
    if window.order.len() >= self.capacity
      && let Some(oldest) = window.order.pop_front()
    {
      window.seen.remove(&oldest);
    }
    window.order.push_back(id.to_string());
    window.seen.insert(id.to_string());
    true
  }

  /// Drop `id` from the window so a redelivery is dispatched again.
  pub async fn release(&self, id: &str) {
    let mut window = self.inner.lock().await;
    if window.seen.remove(id) {
      window.order.retain(|seen| seen != id);
    }
  }
}

impl Default for Deduplicator {
  fn default() -> Self { Self::new(DEDUP_WINDOW) }
}
