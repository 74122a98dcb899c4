//! In-process [`SparkApi`] fake.
//!
//! Behaves like the platform for the calls the backend makes: 404 for unknown
//! ids, 409 for duplicate memberships, generated ids for created objects.
//! Failures can be queued per operation with [`FakeApi::fail_next`].

use std::{
  collections::HashMap,
  sync::{Mutex, MutexGuard},
};

use crate::{
  Error, Result,
  api::{MessageRecord, NewMessage, PeopleQuery, SparkApi},
  identity::Person,
  room::{Membership, Room},
  webhook::{NewWebhook, Webhook},
};

#[derive(Default)]
struct State {
  me:          Option<Person>,
  people:      Vec<Person>,
  rooms:       HashMap<String, Room>,
  memberships: Vec<Membership>,
  messages:    HashMap<String, MessageRecord>,
  sent:        Vec<NewMessage>,
  webhooks:    Vec<Webhook>,
  failures:    Vec<(&'static str, Error)>,
  calls:       Vec<&'static str>,
  next_id:     u64,
}

impl State {
  fn next_id(&mut self, prefix: &str) -> String {
    self.next_id += 1;
    format!("{prefix}{}", self.next_id)
  }

  /// Record the call and pop a queued failure for `op`, if any.
  fn enter(&mut self, op: &'static str) -> Result<()> {
    self.calls.push(op);
    match self.failures.iter().position(|(o, _)| *o == op) {
      Some(i) => Err(self.failures.remove(i).1),
      None => Ok(()),
    }
  }
}

#[derive(Default)]
pub struct FakeApi {
  state: Mutex<State>,
}

impl FakeApi {
  /// A fake whose `people/me` is `bot`.
  pub fn with_bot(bot: Person) -> Self {
    let api = Self::default();
    api.lock().me = Some(bot);
    api
  }

  fn lock(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  pub fn add_person(&self, person: Person) { self.lock().people.push(person); }

  pub fn add_room(&self, room: Room) { self.lock().rooms.insert(room.id.clone(), room); }

  pub fn add_membership(&self, membership: Membership) {
    self.lock().memberships.push(membership);
  }

  pub fn remove_membership(&self, id: &str) { self.lock().memberships.retain(|m| m.id != id); }

  pub fn add_message(&self, record: MessageRecord) {
    self.lock().messages.insert(record.id.clone(), record);
  }

  /// Register a webhook directly, as another integration would.
  pub fn add_webhook(&self, webhook: Webhook) { self.lock().webhooks.push(webhook); }

  /// Make the next call to `op` (the trait method name) fail with `error`.
  pub fn fail_next(&self, op: &'static str, error: Error) {
    self.lock().failures.push((op, error));
  }

  pub fn webhooks(&self) -> Vec<Webhook> { self.lock().webhooks.clone() }

  pub fn memberships(&self) -> Vec<Membership> { self.lock().memberships.clone() }

  pub fn sent(&self) -> Vec<NewMessage> { self.lock().sent.clone() }

  /// Number of calls made to `op`, including failed ones.
  pub fn calls(&self, op: &str) -> usize { self.lock().calls.iter().filter(|c| **c == op).count() }
}

/// A webhook named like the backend's, filtered to `room_id`.
pub fn webhook(id: &str, room_id: &str) -> Webhook {
  Webhook {
    id:         id.to_string(),
    name:       "CiscoSparkBackend".to_string(),
    target_url: "https://bot.example.com/errbot/spark".to_string(),
    resource:   "messages".to_string(),
    event:      "created".to_string(),
    filter:     Some(crate::webhook::room_filter(room_id)),
    secret:     None,
    status:     Some("active".to_string()),
    created:    None,
  }
}

impl SparkApi for FakeApi {
  async fn me(&self) -> Result<Person> {
    let mut st = self.lock();
    st.enter("me")?;
    st.me.clone().ok_or_else(|| Error::NotFound("people/me".to_string()))
  }

  async fn list_people(&self, query: &PeopleQuery) -> Result<Vec<Person>> {
    let mut st = self.lock();
    st.enter("list_people")?;
    Ok(
      st.people
        .iter()
        .filter(|p| query.email.as_ref().is_none_or(|e| p.emails.contains(e)))
        .filter(|p| query.display_name.as_ref().is_none_or(|n| &p.display_name == n))
        .cloned()
        .collect(),
    )
  }

  async fn get_person(&self, id: &str) -> Result<Person> {
    let mut st = self.lock();
    st.enter("get_person")?;
    st.people
      .iter()
      .find(|p| p.id == id)
      .cloned()
      .ok_or_else(|| Error::NotFound(format!("people/{id}")))
  }

  async fn get_room(&self, id: &str) -> Result<Room> {
    let mut st = self.lock();
    st.enter("get_room")?;
    st.rooms.get(id).cloned().ok_or_else(|| Error::NotFound(format!("rooms/{id}")))
  }

  async fn create_membership(&self, room_id: &str, person_id: &str) -> Result<Membership> {
    let mut st = self.lock();
    st.enter("create_membership")?;
    if !st.rooms.contains_key(room_id) {
      return Err(Error::NotFound(format!("rooms/{room_id}")));
    }
    if st.memberships.iter().any(|m| m.room_id == room_id && m.person_id == person_id) {
      return Err(Error::Conflict(format!("{person_id} is already a member of {room_id}")));
    }
    let membership = Membership {
      id:                  st.next_id("MB"),
      room_id:             room_id.to_string(),
      person_id:           person_id.to_string(),
      person_email:        None,
      person_display_name: None,
      is_moderator:        false,
      created:             None,
    };
    st.memberships.push(membership.clone());
    Ok(membership)
  }

  async fn list_memberships(&self, room_id: &str) -> Result<Vec<Membership>> {
    let mut st = self.lock();
    st.enter("list_memberships")?;
    Ok(st.memberships.iter().filter(|m| m.room_id == room_id).cloned().collect())
  }

  async fn delete_membership(&self, id: &str) -> Result<()> {
    let mut st = self.lock();
    st.enter("delete_membership")?;
    let before = st.memberships.len();
    st.memberships.retain(|m| m.id != id);
    if st.memberships.len() == before {
      return Err(Error::NotFound(format!("memberships/{id}")));
    }
    Ok(())
  }

  async fn create_message(&self, message: &NewMessage) -> Result<MessageRecord> {
    let mut st = self.lock();
    st.enter("create_message")?;
    st.sent.push(message.clone());
    let record = MessageRecord {
      id:           st.next_id("M"),
      room_id:      message.room_id.clone().unwrap_or_else(|| "R-direct".to_string()),
      room_type:    None,
      text:         Some(message.text.clone()),
      markdown:     message.markdown.clone(),
      person_id:    st.me.as_ref().map(|p| p.id.clone()).unwrap_or_default(),
      person_email: None,
      created:      None,
    };
    st.messages.insert(record.id.clone(), record.clone());
    Ok(record)
  }

  async fn get_message(&self, id: &str) -> Result<MessageRecord> {
    let mut st = self.lock();
    st.enter("get_message")?;
    st.messages.get(id).cloned().ok_or_else(|| Error::NotFound(format!("messages/{id}")))
  }

  async fn create_webhook(&self, webhook: &NewWebhook) -> Result<Webhook> {
    let mut st = self.lock();
    st.enter("create_webhook")?;
    let created = Webhook {
      id:         st.next_id("W"),
      name:       webhook.name.clone(),
      target_url: webhook.target_url.clone(),
      resource:   webhook.resource.clone(),
      event:      webhook.event.clone(),
      filter:     webhook.filter.clone(),
      secret:     webhook.secret.clone(),
      status:     Some("active".to_string()),
      created:    None,
    };
    st.webhooks.push(created.clone());
    Ok(created)
  }

  async fn list_webhooks(&self) -> Result<Vec<Webhook>> {
    let mut st = self.lock();
    st.enter("list_webhooks")?;
    Ok(st.webhooks.clone())
  }

  async fn delete_webhook(&self, id: &str) -> Result<()> {
    let mut st = self.lock();
    st.enter("delete_webhook")?;
    let before = st.webhooks.len();
    st.webhooks.retain(|w| w.id != id);
    if st.webhooks.len() == before {
      return Err(Error::NotFound(format!("webhooks/{id}")));
    }
    Ok(())
  }
}
