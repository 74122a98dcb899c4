//! Outbound messages: building replies and sending them to the platform.

use std::{collections::BTreeMap, sync::Arc};

use spark_core::{
  Identity, Message, RoomType,
  api::{MessageRecord, NewMessage, SparkApi},
  message::extras,
};
use tracing::{debug, warn};

use crate::{error::Result, markdown};

/// Build a message from its parts.
pub fn build_message(
  body: impl Into<String>,
  from: Identity,
  to: Identity,
  extras: BTreeMap<String, String>,
) -> Message {
  let mut message = Message::new(body, from, to);
  message.extras = extras;
  message
}

/// Build the reply to `original`.
///
/// The reply comes from whoever `original` was addressed to. It goes back to
/// the sender's room, unless `private` is set on a group message, in which
/// case it is addressed to the sender directly.
pub fn build_reply(original: &Message, text: impl Into<String>, private: bool) -> Message {
  let from = original.to.clone();
  if private && original.is_group() {
    Message::new(text, from, Identity::Person(original.from.as_person().clone()))
      .with_extra(extras::ROOM_TYPE, RoomType::Direct.as_str())
  } else {
    let mut reply = Message::new(text, from, original.from.clone());
    for key in [extras::ROOM_TYPE, extras::ROOM_ID] {
      if let Some(value) = original.extras.get(key) {
        reply.extras.insert(key.to_string(), value.clone());
      }
    }
    reply
  }
}

/// Sends [`Message`]s through a [`SparkApi`].
pub struct Outbound<A> {
  api:                Arc<A>,
  message_size_limit: usize,
}

impl<A: SparkApi> Outbound<A> {
  pub fn new(api: Arc<A>, message_size_limit: usize) -> Self { Self { api, message_size_limit } }

  /// Send `message` to its recipient: a person directly, an occupant to the
  /// occupant's room. The body is sent both as plain text and as rendered
  /// markdown.
  pub async fn send(&self, message: &Message) -> Result<MessageRecord> {
    let len = message.body.chars().count();
    if len > self.message_size_limit {
      warn!(len, limit = self.message_size_limit, "message body exceeds the size limit");
    }

    let request = match &message.to {
      Identity::Person(person) => NewMessage::to_person(&person.id, &message.body),
      Identity::Occupant(occupant) => NewMessage::to_room(&occupant.room_id, &message.body),
    }
    .with_markdown(markdown::render(&message.body));

    let record = self.api.create_message(&request).await?;
    debug!(message = %record.id, room = %record.room_id, "sent message");
    Ok(record)
  }
}
