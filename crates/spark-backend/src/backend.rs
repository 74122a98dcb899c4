//! [`Backend`]: the connected adapter the framework talks to.

use std::{collections::BTreeMap, future::Future, sync::Arc};

use axum::Router;
use serde_json::Value;
use spark_core::{
  Identity, Message, Person, Room, RoomOccupant,
  api::{MessageRecord, SparkApi},
  memory::{MemoryStore, Values},
};
use tokio::{net::TcpListener, sync::mpsc};
use tracing::{error, info, warn};

use crate::{
  AppState,
  config::Settings,
  delivery::{self, Outbound},
  error::{Error, Result},
  inbound::Deduplicator,
  subscriptions::SubscriptionManager,
};

/// Name of this backend as reported to the framework.
pub const MODE: &str = "CiscoSpark";

/// A backend connected to the platform as the bot identity.
///
/// Cloning is cheap; all clones share the same subscription table and
/// delivery window.
pub struct Backend<A, M> {
  settings:      Arc<Settings>,
  api:           Arc<A>,
  store:         Arc<M>,
  bot:           Arc<Person>,
  subscriptions: Arc<SubscriptionManager<A>>,
  outbound:      Arc<Outbound<A>>,
  dedup:         Arc<Deduplicator>,
}

impl<A, M> Clone for Backend<A, M> {
  fn clone(&self) -> Self {
    Self {
      settings:      self.settings.clone(),
      api:           self.api.clone(),
      store:         self.store.clone(),
      bot:           self.bot.clone(),
      subscriptions: self.subscriptions.clone(),
      outbound:      self.outbound.clone(),
      dedup:         self.dedup.clone(),
    }
  }
}

impl<A, M> Backend<A, M>
where
  A: SparkApi + 'static,
  M: MemoryStore + 'static,
{
  /// Resolve the bot identity (`GET people/me`) and assemble the backend.
  pub async fn connect(settings: Settings, api: A, store: M) -> Result<Self> {
    let api = Arc::new(api);
    let bot = match api.me().await {
      Ok(bot) => bot,
      Err(e) => {
        error!(error = %e, "unable to resolve the bot identity");
        return Err(e.into());
      }
    };
    info!(bot = %bot.id, name = %bot.display_name, "connected");

    let settings = Arc::new(settings);
    let subscriptions = SubscriptionManager::new(api.clone(), settings.clone(), bot.clone());
    let outbound = Outbound::new(api.clone(), settings.message_size_limit);

    Ok(Self {
      settings,
      api,
      store: Arc::new(store),
      bot: Arc::new(bot),
      subscriptions: Arc::new(subscriptions),
      outbound: Arc::new(outbound),
      dedup: Arc::new(Deduplicator::default()),
    })
  }

  pub fn mode(&self) -> &'static str { MODE }

  pub fn bot_identifier(&self) -> &Person { &self.bot }

  pub fn settings(&self) -> &Settings { &self.settings }

  pub fn subscriptions(&self) -> &SubscriptionManager<A> { &self.subscriptions }

  pub fn app_state(&self, dispatch: mpsc::Sender<Message>) -> AppState<A> {
    AppState {
      api:      self.api.clone(),
      settings: self.settings.clone(),
      bot:      self.bot.clone(),
      dedup:    self.dedup.clone(),
      dispatch,
    }
  }

  /// The webhook receiver. Resolved messages are sent on `dispatch`.
  pub fn router(&self, dispatch: mpsc::Sender<Message>) -> Router { crate::router(self.app_state(dispatch)) }

  // ─── Lifecycle ─────────────────────────────────────────────────────────────

  /// Join the configured rooms, then serve webhook deliveries on `listener`
  /// until `shutdown` resolves. Owned webhooks are removed before returning.
  pub async fn serve<F>(&self, listener: TcpListener, dispatch: mpsc::Sender<Message>, shutdown: F) -> Result<()>
  where
    F: Future<Output = ()> + Send + 'static,
  {
    self.subscriptions.join_configured_rooms().await;

    let addr = listener.local_addr()?;
    info!(%addr, webhook = %self.settings.webhook_url, "backend is now ready");

    axum::serve(listener, self.router(dispatch))
      .with_graceful_shutdown(shutdown)
      .await?;
    info!("stopped accepting deliveries");

    self.disconnect().await;
    Ok(())
  }

  /// Delete all owned webhooks, giving up after the shutdown grace period.
  pub async fn disconnect(&self) {
    let grace = self.settings.shutdown_grace;
    match tokio::time::timeout(grace, self.subscriptions.delete_all_owned_webhooks()).await {
      Ok(Ok(deleted)) => info!(deleted, "disconnected"),
      Ok(Err(e)) => error!(error = %e, "webhook cleanup failed"),
      Err(_) => warn!(?grace, "webhook cleanup abandoned"),
    }
  }

  // ─── Messages ──────────────────────────────────────────────────────────────

  pub async fn send_message(&self, message: &Message) -> Result<MessageRecord> {
    self.outbound.send(message).await.inspect_err(|e| {
      error!(error = %e, to = %message.to.as_person(), "unable to send message");
    })
  }

  pub fn build_reply(&self, original: &Message, text: impl Into<String>, private: bool) -> Message {
    delivery::build_reply(original, text, private)
  }

  pub fn build_message(
    &self,
    body: impl Into<String>,
    from: Identity,
    to: Identity,
    extras: BTreeMap<String, String>,
  ) -> Message {
    delivery::build_message(body, from, to, extras)
  }

  pub async fn get_message_using_id(&self, id: &str) -> Result<MessageRecord> {
    Ok(self.api.get_message(id).await?)
  }

  // ─── Identities ────────────────────────────────────────────────────────────

  /// The first person with `email`, if any.
  pub async fn get_person_using_email(&self, email: &str) -> Result<Option<Person>> {
    Ok(Person::find_by_email(&*self.api, email).await?)
  }

  pub async fn get_person_using_id(&self, id: &str) -> Result<Person> {
    Ok(Person::get_by_id(&*self.api, id).await?)
  }

  /// A shallow person for `id`. Nothing is fetched.
  pub fn create_person_using_id(&self, id: &str) -> Person { Person::shallow(id) }

  /// Turn the textual form of an identifier (a person id) back into one.
  pub fn build_identifier(&self, text: &str) -> Person { Person::shallow(text.trim()) }

  pub async fn get_room_using_id(&self, id: &str) -> Result<Room> { Ok(Room::get_by_id(&*self.api, id).await?) }

  /// Like [`get_room_using_id`](Self::get_room_using_id), with a missing room
  /// as `None`.
  pub async fn query_room(&self, id: &str) -> Result<Option<Room>> {
    match Room::get_by_id(&*self.api, id).await {
      Ok(room) => Ok(Some(room)),
      Err(e) if e.is_not_found() => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  /// A shallow room for `id`. Nothing is fetched.
  pub fn create_room_using_id(&self, id: &str) -> Room { Room::shallow(id) }

  pub async fn get_occupant_using_id(&self, person_id: &str, room_id: &str) -> Result<RoomOccupant> {
    let person = self.get_person_using_id(person_id).await?;
    Ok(RoomOccupant::new(person, room_id))
  }

  /// Rooms the bot has joined through this backend.
  pub async fn rooms(&self) -> Vec<String> { self.subscriptions.joined_rooms().await }

  // ─── Memory ────────────────────────────────────────────────────────────────

  pub async fn remember(&self, id: &str, key: &str, value: Value) -> Result<()> {
    self.store.remember(id, key, value).await.map_err(Error::store)
  }

  pub async fn forget(&self, id: &str, key: &str) -> Result<Option<Value>> {
    self.store.forget(id, key).await.map_err(Error::store)
  }

  pub async fn recall(&self, id: &str) -> Result<Values> { self.store.recall(id).await.map_err(Error::store) }

  pub async fn recall_key(&self, id: &str, key: &str) -> Result<Option<Value>> {
    self.store.recall_key(id, key).await.map_err(Error::store)
  }
}
