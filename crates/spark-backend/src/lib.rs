//! Spark chat backend.
//!
//! Connects a chatbot framework to the Spark (Webex) platform: joins the
//! configured rooms, registers a `messages/created` webhook per room, and
//! exposes an axum [`Router`] that verifies, normalizes, and dispatches each
//! delivery as a framework [`Message`]. Outbound messages go through
//! [`Backend::send_message`].

pub mod backend;
pub mod config;
pub mod delivery;
pub mod error;
pub mod inbound;
pub mod markdown;
pub mod signature;
pub mod subscriptions;

pub use backend::{Backend, MODE};
pub use config::{BackendConfig, ConfigError, Settings};
pub use error::Error;

use std::sync::Arc;

use axum::{
  Router,
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
  routing::post,
};
use spark_core::{Message, Person, api::SparkApi};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use config::WEBHOOK_PATH;
use error::Result;
use inbound::Deduplicator;
use signature::SignedPayload;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through the webhook handler.
pub struct AppState<A> {
  pub api:      Arc<A>,
  pub settings: Arc<Settings>,
  pub bot:      Arc<Person>,
  pub dedup:    Arc<Deduplicator>,
  /// Resolved messages are handed to the framework here.
  pub dispatch: mpsc::Sender<Message>,
}

impl<A> Clone for AppState<A> {
  fn clone(&self) -> Self {
    Self {
      api:      self.api.clone(),
      settings: self.settings.clone(),
      bot:      self.bot.clone(),
      dedup:    self.dedup.clone(),
      dispatch: self.dispatch.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] receiving webhook deliveries.
pub fn router<A>(state: AppState<A>) -> Router
where
  A: SparkApi + 'static,
{
  Router::new()
    .route(&format!("/{WEBHOOK_PATH}"), post(webhook_handler::<A>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// What happened to an accepted delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  Dispatched(String),
  /// Not a `messages/created` event.
  Ignored,
  /// Written by the bot itself.
  OwnMessage,
  Duplicate,
  /// Deleted before it could be fetched.
  Vanished,
}

async fn webhook_handler<A>(
  State(state): State<AppState<A>>,
  SignedPayload(body): SignedPayload,
) -> Response
where
  A: SparkApi + 'static,
{
  match handle_delivery(&state, &body).await {
    Ok(outcome) => {
      debug!(?outcome, "delivery handled");
      StatusCode::NO_CONTENT.into_response()
    }
    Err(e) => {
      warn!(error = %e, "delivery failed");
      e.into_response()
    }
  }
}

/// Normalize a verified delivery body and dispatch it to the framework.
pub async fn handle_delivery<A: SparkApi>(state: &AppState<A>, body: &[u8]) -> Result<Outcome> {
  let event = inbound::parse_event(body)?;
  if !event.is_message_created() {
    debug!(resource = %event.resource, event = %event.event, "ignoring event");
    return Ok(Outcome::Ignored);
  }
  if event.person_id == state.bot.id {
    return Ok(Outcome::OwnMessage);
  }
  if !state.dedup.first_seen(&event.message_id).await {
    debug!(message = %event.message_id, "duplicate delivery");
    return Ok(Outcome::Duplicate);
  }

  let message = match inbound::resolve_message(&*state.api, &state.bot, &event).await {
    Ok(message) => message,
    Err(e) if e.is_not_found() => {
      info!(message = %event.message_id, "message vanished before it could be fetched");
      return Ok(Outcome::Vanished);
    }
    Err(e) => {
      state.dedup.release(&event.message_id).await;
      return Err(e);
    }
  };

  if state.dispatch.send(message).await.is_err() {
    state.dedup.release(&event.message_id).await;
    return Err(Error::DispatchClosed);
  }
  Ok(Outcome::Dispatched(event.message_id))
}
