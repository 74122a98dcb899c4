//! Room membership and webhook subscription management.
//!
//! Each room the backend knows about moves through
//!
//! ```text
//! NotJoined -> Joining -> JoinedNoHook -> JoinedWithHook -> Leaving -> NotJoined
//! ```
//!
//! `Joining` and `Leaving` are reservations: while a room is in either state
//! any other join or leave for it is a no-op. The room table lock is never
//! held across a platform call.

use std::{collections::HashMap, sync::Arc};

use spark_core::{
  Person, Room,
  api::SparkApi,
  webhook::{NewWebhook, Webhook, room_filter},
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
  config::{Settings, WEBHOOK_NAME},
  error::{Error, Result},
};

pub const WEBHOOK_RESOURCE: &str = "messages";
pub const WEBHOOK_EVENT: &str = "created";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
  NotJoined,
  Joining,
  JoinedNoHook,
  JoinedWithHook,
  Leaving,
}

/// Overrides for [`SubscriptionManager::create_webhook`]. Unset fields fall
/// back to the room filter and the configured callback URL and secret.
#[derive(Debug, Clone, Default)]
pub struct WebhookOptions {
  pub filter: Option<String>,
  pub url:    Option<String>,
  pub secret: Option<String>,
}

struct Tracked {
  state: RoomState,
  room:  Room,
}

impl Tracked {
  /// A webhook only completes a join already in progress.
  fn hooked(&mut self) {
    if matches!(self.state, RoomState::Joining | RoomState::JoinedNoHook) {
      self.state = RoomState::JoinedWithHook;
    }
  }
}

/// Where a freshly created webhook ended up.
enum Placement {
  Stored,
  Duplicate(Webhook),
  Leaving,
}

pub struct SubscriptionManager<A> {
  api:      Arc<A>,
  settings: Arc<Settings>,
  bot:      Person,
  rooms:    Mutex<HashMap<String, Tracked>>,
  /// Webhooks whose deletion failed after their room was forgotten.
  orphans:  Mutex<Vec<Webhook>>,
}

impl<A: SparkApi> SubscriptionManager<A> {
  pub fn new(api: Arc<A>, settings: Arc<Settings>, bot: Person) -> Self {
    Self {
      api,
      settings,
      bot,
      rooms: Mutex::new(HashMap::new()),
      orphans: Mutex::new(Vec::new()),
    }
  }

  pub async fn state(&self, room_id: &str) -> RoomState {
    self.rooms.lock().await.get(room_id).map_or(RoomState::NotJoined, |t| t.state)
  }

  /// Snapshot of a tracked room, including its webhook handle.
  pub async fn room(&self, room_id: &str) -> Option<Room> {
    self.rooms.lock().await.get(room_id).map(|t| t.room.clone())
  }

  pub async fn webhook(&self, room_id: &str) -> Option<Webhook> {
    self.rooms.lock().await.get(room_id).and_then(|t| t.room.webhook.clone())
  }

  /// Ids of rooms currently joined, with or without a webhook.
  pub async fn joined_rooms(&self) -> Vec<String> {
    let mut ids: Vec<String> = self
      .rooms
      .lock()
      .await
      .iter()
      .filter(|(_, t)| matches!(t.state, RoomState::JoinedNoHook | RoomState::JoinedWithHook))
      .map(|(id, _)| id.clone())
      .collect();
    ids.sort();
    ids
  }

  async fn set_state(&self, room_id: &str, state: RoomState) {
    if let Some(t) = self.rooms.lock().await.get_mut(room_id) {
      t.state = state;
    }
  }

  // ─── Join ──────────────────────────────────────────────────────────────────

  /// Make the bot a member of `room` and subscribe to its messages.
  ///
  /// "Already a member" counts as success. If the membership call fails for
  /// any other reason the room goes back to `NotJoined`; if only the webhook
  /// fails it stays `JoinedNoHook` and a later join retries the webhook.
  pub async fn join(&self, room: Room) -> Result<()> {
    let from = {
      let mut rooms = self.rooms.lock().await;
      let tracked = rooms.entry(room.id.clone()).or_insert_with(|| {
        let mut room = room.clone();
        room.webhook = None;
        Tracked { state: RoomState::NotJoined, room }
      });
      match tracked.state {
        RoomState::NotJoined | RoomState::JoinedNoHook => {
          let from = tracked.state;
          tracked.state = RoomState::Joining;
          if !room.is_shallow() {
            let webhook = tracked.room.webhook.take();
            tracked.room = room.clone();
            tracked.room.webhook = webhook;
          }
          from
        }
        state => {
          debug!(room = %room.id, ?state, "join skipped");
          return Ok(());
        }
      }
    };

    if from == RoomState::NotJoined {
      match self.api.create_membership(&room.id, &self.bot.id).await {
        Ok(_) => debug!(room = %room.id, "{} is now a member", self.bot.id),
        Err(e) if e.is_conflict() => debug!(room = %room.id, "{} is already a member", self.bot.id),
        Err(e) => {
          error!(room = %room.id, error = %e, "unable to join room");
          self.reset_room(&room.id).await;
          return Err(e.into());
        }
      }
    }

    match self.create_webhook(&room.id, WebhookOptions::default()).await {
      Ok(_) => {
        info!(room = %room.id, "joined room");
        Ok(())
      }
      Err(e) => {
        error!(room = %room.id, error = %e, "joined room but could not subscribe to it");
        self.set_state(&room.id, RoomState::JoinedNoHook).await;
        Err(e)
      }
    }
  }

  /// Fetch room `room_id` and [`join`](Self::join) it.
  pub async fn join_by_id(&self, room_id: &str) -> Result<()> {
    let room = match Room::get_by_id(&*self.api, room_id).await {
      Ok(room) => room,
      Err(e) => {
        error!(room = %room_id, error = %e, "unable to look up room");
        return Err(e.into());
      }
    };
    self.join(room).await
  }

  /// Join every room in the configured presence. Failures are logged and do
  /// not stop the remaining joins. Returns the number of rooms joined.
  pub async fn join_configured_rooms(&self) -> usize {
    let mut joined = 0;
    for room_id in &self.settings.rooms {
      if self.join_by_id(room_id).await.is_ok() {
        joined += 1;
      }
    }
    info!(joined, configured = self.settings.rooms.len(), "joined configured rooms");
    joined
  }

  // ─── Webhooks ──────────────────────────────────────────────────────────────

  /// Subscribe to `messages/created` in `room_id`.
  ///
  /// Returns the existing handle without calling the platform when the room
  /// already has one. At most one handle is kept per room: if another call
  /// stored one while this one was in flight, the new webhook is deleted.
  ///
  /// A webhook does not make the bot a member. On a room that is not joined
  /// the handle is kept for a later [`join`](Self::join) and the room stays
  /// `NotJoined`. A room being left gets no webhook.
  pub async fn create_webhook(&self, room_id: &str, options: WebhookOptions) -> Result<Webhook> {
    {
      let mut rooms = self.rooms.lock().await;
      if let Some(tracked) = rooms.get_mut(room_id) {
        if tracked.state == RoomState::Leaving {
          warn!(room = %room_id, "not subscribing to a room being left");
          return Err(Error::RoomLeaving(room_id.to_string()));
        }
        if let Some(existing) = tracked.room.webhook.clone() {
          tracked.hooked();
          debug!(room = %room_id, webhook = %existing.id, "webhook already exists");
          return Ok(existing);
        }
      }
    }

    let request = NewWebhook {
      name:       WEBHOOK_NAME.to_string(),
      target_url: options.url.unwrap_or_else(|| self.settings.webhook_url.clone()),
      resource:   WEBHOOK_RESOURCE.to_string(),
      event:      WEBHOOK_EVENT.to_string(),
      filter:     Some(options.filter.unwrap_or_else(|| room_filter(room_id))),
      secret:     Some(options.secret.unwrap_or_else(|| self.settings.webhook_secret.clone())),
    };
    let created = self.api.create_webhook(&request).await?;
    debug!(room = %room_id, webhook = %created.id, target = %created.target_url, "created webhook");

    let placement = {
      let mut rooms = self.rooms.lock().await;
      let tracked = rooms.entry(room_id.to_string()).or_insert_with(|| Tracked {
        state: RoomState::NotJoined,
        room:  Room::shallow(room_id),
      });
      match (&tracked.room.webhook, tracked.state) {
        (_, RoomState::Leaving) => Placement::Leaving,
        (Some(existing), _) => Placement::Duplicate(existing.clone()),
        (None, _) => {
          tracked.room.webhook = Some(created.clone());
          tracked.hooked();
          Placement::Stored
        }
      }
    };

    match placement {
      Placement::Stored => Ok(created),
      Placement::Duplicate(existing) => {
        warn!(room = %room_id, webhook = %created.id, "discarding duplicate webhook");
        self.discard(&created).await;
        Ok(existing)
      }
      Placement::Leaving => {
        warn!(room = %room_id, webhook = %created.id, "room is being left; discarding new webhook");
        self.discard(&created).await;
        Err(Error::RoomLeaving(room_id.to_string()))
      }
    }
  }

  /// Delete a webhook no room holds. One that cannot be deleted is kept for
  /// the next cleanup.
  async fn discard(&self, webhook: &Webhook) {
    match self.api.delete_webhook(&webhook.id).await {
      Ok(()) => {}
      Err(e) if e.is_not_found() => {}
      Err(e) => {
        error!(webhook = %webhook.id, error = %e, "could not delete unowned webhook");
        self.orphans.lock().await.push(webhook.clone());
      }
    }
  }

  /// Delete `webhook` on the platform and drop any local handle to it.
  /// A webhook that no longer exists is not an error.
  pub async fn delete_webhook(&self, webhook: &Webhook) -> Result<()> {
    match self.api.delete_webhook(&webhook.id).await {
      Ok(()) => debug!(webhook = %webhook.id, "deleted webhook"),
      Err(e) if e.is_not_found() => warn!(webhook = %webhook.id, "webhook already gone"),
      Err(e) => {
        error!(webhook = %webhook.id, error = %e, "unable to delete webhook");
        return Err(e.into());
      }
    }
    self.drop_handle(&webhook.id).await;
    Ok(())
  }

  async fn drop_handle(&self, webhook_id: &str) {
    let mut rooms = self.rooms.lock().await;
    for tracked in rooms.values_mut() {
      if tracked.room.webhook.as_ref().is_some_and(|w| w.id == webhook_id) {
        tracked.room.webhook = None;
        if tracked.state == RoomState::JoinedWithHook {
          tracked.state = RoomState::JoinedNoHook;
        }
      }
    }
  }

  /// Delete every webhook this backend owns: named like ours and filtered to
  /// a configured room, plus any orphan left behind by a failed deletion.
  /// Webhooks of other integrations, or for rooms outside the configured
  /// presence, are left alone. Returns how many were deleted.
  pub async fn delete_all_owned_webhooks(&self) -> Result<usize> {
    let webhooks = match self.api.list_webhooks().await {
      Ok(w) => w,
      Err(e) => {
        error!(error = %e, "unable to list webhooks");
        return Err(e.into());
      }
    };

    let mut owned: Vec<Webhook> = webhooks
      .into_iter()
      .filter(|w| w.name == WEBHOOK_NAME)
      .filter(|w| w.room_id().is_some_and(|id| self.settings.is_configured_room(id)))
      .collect();
    let orphans = std::mem::take(&mut *self.orphans.lock().await);
    for orphan in orphans {
      if !owned.iter().any(|w| w.id == orphan.id) {
        owned.push(orphan);
      }
    }

    let mut deleted = 0;
    for webhook in &owned {
      if self.delete_webhook(webhook).await.is_ok() {
        deleted += 1;
      } else {
        self.orphans.lock().await.push(webhook.clone());
      }
    }
    info!(deleted, owned = owned.len(), "removed owned webhooks");
    Ok(deleted)
  }

  // ─── Leave ─────────────────────────────────────────────────────────────────

  /// Unsubscribe from `room_id` and remove the bot's membership.
  ///
  /// Returns `false` without doing anything when the room is not joined or a
  /// join or leave for it is in flight. Otherwise both steps are attempted
  /// even if the first fails and the room ends `NotJoined`. A webhook that
  /// could not be deleted is kept for the next cleanup. The membership error,
  /// if any, is returned.
  pub async fn leave(&self, room_id: &str) -> Result<bool> {
    let webhook = {
      let mut rooms = self.rooms.lock().await;
      let tracked = rooms.get_mut(room_id);
      let state = tracked.as_ref().map_or(RoomState::NotJoined, |t| t.state);
      match tracked {
        Some(tracked) if matches!(state, RoomState::JoinedNoHook | RoomState::JoinedWithHook) => {
          tracked.state = RoomState::Leaving;
          tracked.room.webhook.clone()
        }
        _ => {
          warn!(room = %room_id, ?state, "leave skipped");
          return Ok(false);
        }
      }
    };

    if let Some(webhook) = &webhook
      && self.delete_webhook(webhook).await.is_err()
    {
      error!(room = %room_id, webhook = %webhook.id, "webhook orphaned; retried on the next cleanup");
      self.orphans.lock().await.push(webhook.clone());
    }

    let result = self.remove_membership(room_id).await;
    self.forget_room(room_id).await;
    result?;
    info!(room = %room_id, "left room");
    Ok(true)
  }

  async fn remove_membership(&self, room_id: &str) -> Result<()> {
    let memberships = self.api.list_memberships(room_id).await.inspect_err(|e| {
      error!(room = %room_id, error = %e, "unable to list memberships");
    })?;
    let Some(own) = memberships.iter().find(|m| m.person_id == self.bot.id) else {
      debug!(room = %room_id, "no membership to remove");
      return Ok(());
    };
    match self.api.delete_membership(&own.id).await {
      Ok(()) => Ok(()),
      Err(e) if e.is_not_found() => Ok(()),
      Err(e) => {
        error!(room = %room_id, error = %e, "unable to leave room");
        Err(e.into())
      }
    }
  }

  async fn forget_room(&self, room_id: &str) { self.rooms.lock().await.remove(room_id); }

  /// Back to `NotJoined` after a failed join. A room holding a webhook stays
  /// tracked so the handle is reused.
  async fn reset_room(&self, room_id: &str) {
    let mut rooms = self.rooms.lock().await;
    if rooms.get(room_id).is_some_and(|t| t.room.webhook.is_some()) {
      if let Some(tracked) = rooms.get_mut(room_id) {
        tracked.state = RoomState::NotJoined;
      }
    } else {
      rooms.remove(room_id);
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use spark_core::{
    Error as ApiError, Membership,
    testing::{FakeApi, webhook},
  };

  use super::*;
  use crate::config::test_settings;

  fn bot() -> Person {
    Person::from_attributes(json!({
      "id": "P-bot", "emails": ["bot@example.com"], "displayName": "Bot",
    }))
    .unwrap()
  }

  fn room(id: &str) -> Room {
    Room::from_attributes(json!({ "id": id, "title": format!("Room {id}"), "type": "group" })).unwrap()
  }

  fn manager() -> (Arc<FakeApi>, SubscriptionManager<FakeApi>) {
    let api = Arc::new(FakeApi::with_bot(bot()));
    api.add_room(room("R1"));
    api.add_room(room("R2"));
    let mgr = SubscriptionManager::new(api.clone(), Arc::new(test_settings()), bot());
    (api, mgr)
  }

  fn own_membership(id: &str, room_id: &str) -> Membership {
    Membership {
      id:                  id.into(),
      room_id:             room_id.into(),
      person_id:           "P-bot".into(),
      person_email:        None,
      person_display_name: None,
      is_moderator:        false,
      created:             None,
    }
  }

  #[tokio::test]
  async fn join_creates_membership_and_webhook() {
    let (api, mgr) = manager();
    mgr.join(room("R1")).await.unwrap();

    assert_eq!(mgr.state("R1").await, RoomState::JoinedWithHook);
    let hooks = api.webhooks();
    assert_eq!(hooks.len(), 1);
    assert_eq!(hooks[0].name, "CiscoSparkBackend");
    assert_eq!(hooks[0].filter.as_deref(), Some("roomId=R1"));
    assert_eq!(hooks[0].target_url, "https://bot.example.com/errbot/spark");
    assert_eq!(hooks[0].secret.as_deref(), Some("s3cret"));
    assert_eq!(mgr.webhook("R1").await.map(|w| w.id), Some(hooks[0].id.clone()));
    assert_eq!(api.memberships().len(), 1);
  }

  #[tokio::test]
  async fn double_join_yields_one_webhook() {
    let (api, mgr) = manager();
    mgr.join(room("R1")).await.unwrap();
    mgr.join(room("R1")).await.unwrap();
    assert_eq!(api.webhooks().len(), 1);
    assert_eq!(api.calls("create_membership"), 1);
  }

  #[tokio::test]
  async fn concurrent_joins_yield_one_webhook() {
    let (api, mgr) = manager();
    let mgr = Arc::new(mgr);
    let a = tokio::spawn({
      let mgr = mgr.clone();
      async move { mgr.join(room("R1")).await }
    });
    let b = tokio::spawn({
      let mgr = mgr.clone();
      async move { mgr.join(room("R1")).await }
    });
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();
    assert_eq!(api.webhooks().len(), 1);
  }

  #[tokio::test]
  async fn already_member_still_subscribes() {
    let (api, mgr) = manager();
    api.add_membership(own_membership("MB-existing", "R1"));
    mgr.join(room("R1")).await.unwrap();
    assert_eq!(mgr.state("R1").await, RoomState::JoinedWithHook);
    assert_eq!(api.webhooks().len(), 1);
  }

  #[tokio::test]
  async fn membership_failure_leaves_room_not_joined() {
    let (api, mgr) = manager();
    api.fail_next("create_membership", ApiError::Status { status: 403, message: "nope".into() });
    assert!(mgr.join(room("R1")).await.is_err());
    assert_eq!(mgr.state("R1").await, RoomState::NotJoined);
    assert!(api.webhooks().is_empty());
  }

  #[tokio::test]
  async fn webhook_failure_leaves_room_joined_and_rejoin_retries() {
    let (api, mgr) = manager();
    api.fail_next("create_webhook", ApiError::Transport("reset".into()));
    assert!(mgr.join(room("R1")).await.is_err());
    assert_eq!(mgr.state("R1").await, RoomState::JoinedNoHook);

    mgr.join(room("R1")).await.unwrap();
    assert_eq!(mgr.state("R1").await, RoomState::JoinedWithHook);
    assert_eq!(api.calls("create_membership"), 1);
    assert_eq!(api.webhooks().len(), 1);
  }

  #[tokio::test]
  async fn create_webhook_is_skipped_when_handle_exists() {
    let (api, mgr) = manager();
    mgr.join(room("R1")).await.unwrap();
    let existing = mgr.create_webhook("R1", WebhookOptions::default()).await.unwrap();
    assert_eq!(Some(existing.id), mgr.webhook("R1").await.map(|w| w.id));
    assert_eq!(api.calls("create_webhook"), 1);
  }

  #[tokio::test]
  async fn create_webhook_honours_overrides() {
    let (api, mgr) = manager();
    let hook = mgr
      .create_webhook("R9", WebhookOptions {
        filter: Some("roomId=R9".into()),
        url:    Some("https://elsewhere.example.com/hook".into()),
        secret: Some("other".into()),
      })
      .await
      .unwrap();
    assert_eq!(hook.target_url, "https://elsewhere.example.com/hook");
    assert_eq!(api.webhooks()[0].secret.as_deref(), Some("other"));
  }

  #[tokio::test]
  async fn join_configured_rooms_skips_failures() {
    let (api, mgr) = manager();
    api.fail_next("get_room", ApiError::NotFound("rooms/R1".into()));
    assert_eq!(mgr.join_configured_rooms().await, 1);
    assert_eq!(mgr.joined_rooms().await, vec!["R2".to_string()]);
  }

  #[tokio::test]
  async fn delete_all_owned_webhooks_is_scoped() {
    let (api, mgr) = manager();
    mgr.join(room("R1")).await.unwrap();
    api.add_webhook(webhook("W-outside", "R9"));
    api.add_webhook(Webhook { name: "SomeoneElse".into(), ..webhook("W-foreign", "R2") });
    api.add_webhook(Webhook { filter: None, ..webhook("W-unfiltered", "R1") });

    assert_eq!(mgr.delete_all_owned_webhooks().await.unwrap(), 1);

    let mut left: Vec<String> = api.webhooks().into_iter().map(|w| w.id).collect();
    left.sort();
    assert_eq!(left, vec!["W-foreign", "W-outside", "W-unfiltered"]);
    assert_eq!(mgr.state("R1").await, RoomState::JoinedNoHook);
    assert!(mgr.webhook("R1").await.is_none());
  }

  #[tokio::test]
  async fn delete_missing_webhook_is_not_an_error() {
    let (_api, mgr) = manager();
    assert!(mgr.delete_webhook(&webhook("W-gone", "R1")).await.is_ok());
  }

  #[tokio::test]
  async fn delete_webhook_propagates_other_errors() {
    let (api, mgr) = manager();
    mgr.join(room("R1")).await.unwrap();
    let hook = mgr.webhook("R1").await.unwrap();
    api.fail_next("delete_webhook", ApiError::Status { status: 500, message: "boom".into() });
    assert!(mgr.delete_webhook(&hook).await.is_err());
    assert_eq!(mgr.state("R1").await, RoomState::JoinedWithHook);
  }

  #[tokio::test]
  async fn leave_removes_webhook_and_membership() {
    let (api, mgr) = manager();
    mgr.join(room("R1")).await.unwrap();
    assert!(mgr.leave("R1").await.unwrap());

    assert_eq!(mgr.state("R1").await, RoomState::NotJoined);
    assert!(api.webhooks().is_empty());
    assert!(api.memberships().is_empty());
  }

  #[tokio::test]
  async fn leave_ends_not_joined_even_on_failure() {
    let (api, mgr) = manager();
    mgr.join(room("R1")).await.unwrap();
    api.fail_next("list_memberships", ApiError::Transport("reset".into()));
    assert!(mgr.leave("R1").await.is_err());
    assert_eq!(mgr.state("R1").await, RoomState::NotJoined);
    assert!(api.webhooks().is_empty());
  }

  #[tokio::test]
  async fn leave_unknown_room_is_noop() {
    let (api, mgr) = manager();
    assert!(!mgr.leave("R1").await.unwrap());
    assert_eq!(api.calls("list_memberships"), 0);
  }

  #[tokio::test]
  async fn leave_during_join_is_reported_as_skipped() {
    let (api, mgr) = manager();
    mgr.join(room("R1")).await.unwrap();
    mgr.set_state("R1", RoomState::Joining).await;

    assert!(!mgr.leave("R1").await.unwrap());
    assert_eq!(mgr.state("R1").await, RoomState::Joining);
    assert_eq!(api.calls("list_memberships"), 0);
    assert_eq!(api.webhooks().len(), 1);
  }

  #[tokio::test]
  async fn webhook_orphaned_by_leave_is_removed_on_cleanup() {
    let (api, mgr) = manager();
    api.add_room(room("R9"));
    mgr.join(room("R9")).await.unwrap();
    api.fail_next("delete_webhook", ApiError::Status { status: 500, message: "boom".into() });

    assert!(mgr.leave("R9").await.unwrap());
    assert_eq!(mgr.state("R9").await, RoomState::NotJoined);
    assert_eq!(api.webhooks().len(), 1);

    assert_eq!(mgr.delete_all_owned_webhooks().await.unwrap(), 1);
    assert!(api.webhooks().is_empty());
  }

  #[tokio::test]
  async fn webhook_before_join_does_not_count_as_joined() {
    let (api, mgr) = manager();
    let hook = mgr.create_webhook("R1", WebhookOptions::default()).await.unwrap();
    assert_eq!(mgr.state("R1").await, RoomState::NotJoined);
    assert!(mgr.joined_rooms().await.is_empty());

    mgr.join_by_id("R1").await.unwrap();
    assert_eq!(mgr.state("R1").await, RoomState::JoinedWithHook);
    assert_eq!(api.calls("create_membership"), 1);
    assert_eq!(api.memberships().len(), 1);
    assert_eq!(api.calls("create_webhook"), 1);
    assert_eq!(mgr.webhook("R1").await.map(|w| w.id), Some(hook.id));
  }

  #[tokio::test]
  async fn failed_join_keeps_existing_webhook_handle() {
    let (api, mgr) = manager();
    mgr.create_webhook("R1", WebhookOptions::default()).await.unwrap();
    api.fail_next("create_membership", ApiError::Status { status: 403, message: "nope".into() });

    assert!(mgr.join(room("R1")).await.is_err());
    assert_eq!(mgr.state("R1").await, RoomState::NotJoined);
    assert!(mgr.webhook("R1").await.is_some());

    mgr.join(room("R1")).await.unwrap();
    assert_eq!(api.webhooks().len(), 1);
    assert_eq!(api.memberships().len(), 1);
  }

  #[tokio::test]
  async fn no_webhook_for_a_room_being_left() {
    let (api, mgr) = manager();
    mgr.join(room("R1")).await.unwrap();
    {
      let mut rooms = mgr.rooms.lock().await;
      let tracked = rooms.get_mut("R1").unwrap();
      tracked.room.webhook = None;
      tracked.state = RoomState::Leaving;
    }

    let err = mgr.create_webhook("R1", WebhookOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::RoomLeaving(ref id) if id == "R1"), "{err}");
    assert_eq!(api.calls("create_webhook"), 1);
    assert!(mgr.webhook("R1").await.is_none());
  }
}
