//! Backend configuration.
//!
//! [`BackendConfig`] is the raw shape deserialised from `config.toml` and
//! `SPARK_*` environment variables. [`Settings::from_config`] validates it
//! once at startup; the resulting [`Settings`] is shared (behind an `Arc`) by
//! every component that needs the token, callback URL, or secret.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Name given to every webhook this backend registers.
pub const WEBHOOK_NAME: &str = "CiscoSparkBackend";

/// Path (relative to `webhook_destination`) the platform posts events to.
pub const WEBHOOK_PATH: &str = "errbot/spark";

/// Longest message body the platform accepts, in characters.
pub const PLATFORM_MESSAGE_SIZE_LIMIT: usize = 7439;

const DEFAULT_MESSAGE_SIZE_LIMIT: usize = 10_000;

// ─── Raw configuration ───────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `config.toml` / environment.
///
/// The mandatory values are optional here so that a missing one is reported
/// by name from [`Settings::from_config`] instead of as a serde error.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  #[serde(default)]
  pub token:                Option<String>,
  #[serde(default)]
  pub webhook_destination:  Option<String>,
  #[serde(default)]
  pub webhook_secret:       Option<String>,
  /// Room ids the bot joins at startup and whose webhooks it owns.
  #[serde(default)]
  pub chatroom_presence:    Vec<String>,
  #[serde(default = "default_message_size_limit")]
  pub message_size_limit:   usize,
  #[serde(default = "default_host")]
  pub host:                 String,
  #[serde(default = "default_port")]
  pub port:                 u16,
  #[serde(default = "default_api_url")]
  pub api_url:              String,
  #[serde(default = "default_store_path")]
  pub store_path:           PathBuf,
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs: u64,
  #[serde(default = "default_shutdown_grace_secs")]
  pub shutdown_grace_secs:  u64,
}

fn default_message_size_limit() -> usize { DEFAULT_MESSAGE_SIZE_LIMIT }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_api_url() -> String { spark_client::DEFAULT_API_URL.to_string() }
fn default_store_path() -> PathBuf { PathBuf::from("spark-memory.db") }
fn default_request_timeout_secs() -> u64 { 30 }
fn default_shutdown_grace_secs() -> u64 { 10 }

impl Default for BackendConfig {
  fn default() -> Self {
    Self {
      token:                None,
      webhook_destination:  None,
      webhook_secret:       None,
      chatroom_presence:    Vec::new(),
      message_size_limit:   default_message_size_limit(),
      host:                 default_host(),
      port:                 default_port(),
      api_url:              default_api_url(),
      store_path:           default_store_path(),
      request_timeout_secs: default_request_timeout_secs(),
      shutdown_grace_secs:  default_shutdown_grace_secs(),
    }
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// A configuration problem. Always fatal: the backend must not start.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("missing required setting `{0}`")]
  Missing(&'static str),

  #[error("invalid setting `{key}`: {reason}")]
  Invalid { key: &'static str, reason: String },
}

/// Validated settings shared by all backend components.
#[derive(Debug, Clone)]
pub struct Settings {
  pub token:              String,
  /// Full callback URL, `<webhook_destination>/errbot/spark`.
  pub webhook_url:        String,
  pub webhook_secret:     String,
  /// Configured room presence, in configuration order, without duplicates.
  pub rooms:              Vec<String>,
  /// Framework-wide message size limit after clamping.
  pub message_size_limit: usize,
  pub listen_addr:        String,
  pub api_url:            String,
  pub store_path:         PathBuf,
  pub request_timeout:    Duration,
  pub shutdown_grace:     Duration,
}

impl Settings {
  pub fn from_config(config: BackendConfig) -> Result<Self, ConfigError> {
    let token = required("token", config.token)?;
    let destination = required("webhook_destination", config.webhook_destination)?;
    let webhook_secret = required("webhook_secret", config.webhook_secret)?;

    let mut rooms: Vec<String> = Vec::new();
    for room in config.chatroom_presence {
      let room = room.trim();
      if !room.is_empty() && !rooms.iter().any(|r| r == room) {
        rooms.push(room.to_string());
      }
    }
    if rooms.is_empty() {
      return Err(ConfigError::Missing("chatroom_presence"));
    }
    debug!(?rooms, "room presence");

    if !(destination.starts_with("https://") || destination.starts_with("http://")) {
      return Err(ConfigError::Invalid {
        key:    "webhook_destination",
        reason: format!("{destination:?} is not an http(s) URL"),
      });
    }
    if config.message_size_limit == 0 {
      return Err(ConfigError::Invalid {
        key:    "message_size_limit",
        reason: "must be greater than zero".to_string(),
      });
    }

    Ok(Self {
      token,
      webhook_url: webhook_url(&destination),
      webhook_secret,
      rooms,
      message_size_limit: clamp_message_size_limit(config.message_size_limit),
      listen_addr: format!("{}:{}", config.host, config.port),
      api_url: config.api_url,
      store_path: config.store_path,
      request_timeout: Duration::from_secs(config.request_timeout_secs),
      shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
    })
  }

  /// Whether `room_id` is in the configured room presence.
  pub fn is_configured_room(&self, room_id: &str) -> bool { self.rooms.iter().any(|r| r == room_id) }
}

fn required(key: &'static str, value: Option<String>) -> Result<String, ConfigError> {
  value
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty())
    .ok_or(ConfigError::Missing(key))
}

/// Append the webhook path to `destination`, normalising the slash between
/// them.
pub fn webhook_url(destination: &str) -> String {
  format!("{}/{WEBHOOK_PATH}", destination.trim_end_matches('/'))
}

/// Cap `limit` at what the platform accepts.
pub fn clamp_message_size_limit(limit: usize) -> usize {
  if limit > PLATFORM_MESSAGE_SIZE_LIMIT {
    info!(
      configured = limit,
      "capping message_size_limit to {PLATFORM_MESSAGE_SIZE_LIMIT}, the maximum length allowed by the platform"
    );
    PLATFORM_MESSAGE_SIZE_LIMIT
  } else {
    limit
  }
}

/// Settings for unit tests: rooms `R1` and `R2`, nothing listening.
#[cfg(test)]
pub(crate) fn test_settings() -> Settings {
  Settings {
    token:              "tok".into(),
    webhook_url:        "https://bot.example.com/errbot/spark".into(),
    webhook_secret:     "s3cret".into(),
    rooms:              vec!["R1".into(), "R2".into()],
    message_size_limit: PLATFORM_MESSAGE_SIZE_LIMIT,
    listen_addr:        "127.0.0.1:0".into(),
    api_url:            "http://127.0.0.1:1".into(),
    store_path:         PathBuf::from(":memory:"),
    request_timeout:    Duration::from_secs(1),
    shutdown_grace:     Duration::from_secs(1),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn complete() -> BackendConfig {
    BackendConfig {
      token:               Some("tok".into()),
      webhook_destination: Some("https://bot.example.com".into()),
      webhook_secret:      Some("s3cret".into()),
      chatroom_presence:   vec!["R1".into(), "R2".into()],
      ..BackendConfig::default()
    }
  }

  #[test]
  fn webhook_url_appends_path() {
    assert_eq!(webhook_url("https://bot.example.com"), "https://bot.example.com/errbot/spark");
    assert_eq!(webhook_url("https://bot.example.com/"), "https://bot.example.com/errbot/spark");
  }

  #[test]
  fn message_size_limit_is_clamped() {
    assert_eq!(clamp_message_size_limit(10_000), 7439);
    assert_eq!(clamp_message_size_limit(5000), 5000);
    assert_eq!(clamp_message_size_limit(7439), 7439);

    let settings = Settings::from_config(BackendConfig { message_size_limit: 10_000, ..complete() }).unwrap();
    assert_eq!(settings.message_size_limit, 7439);
    let settings = Settings::from_config(BackendConfig { message_size_limit: 5000, ..complete() }).unwrap();
    assert_eq!(settings.message_size_limit, 5000);
  }

  #[test]
  fn complete_config_validates() {
    let settings = Settings::from_config(complete()).unwrap();
    assert_eq!(settings.webhook_url, "https://bot.example.com/errbot/spark");
    assert_eq!(settings.rooms, vec!["R1", "R2"]);
    assert_eq!(settings.listen_addr, "0.0.0.0:8080");
    assert!(settings.is_configured_room("R2"));
    assert!(!settings.is_configured_room("R3"));
  }

  #[test]
  fn each_mandatory_value_is_fatal_when_missing() {
    let cases = [
      (BackendConfig { token: None, ..complete() }, "token"),
      (BackendConfig { webhook_destination: None, ..complete() }, "webhook_destination"),
      (BackendConfig { webhook_secret: Some("  ".into()), ..complete() }, "webhook_secret"),
      (BackendConfig { chatroom_presence: vec![], ..complete() }, "chatroom_presence"),
    ];
    for (config, key) in cases {
      assert_eq!(Settings::from_config(config).unwrap_err(), ConfigError::Missing(key));
    }
  }

  #[test]
  fn room_presence_is_deduplicated() {
    let config = BackendConfig {
      chatroom_presence: vec!["R1".into(), " R1 ".into(), "".into(), "R2".into()],
      ..complete()
    };
    assert_eq!(Settings::from_config(config).unwrap().rooms, vec!["R1", "R2"]);
  }

  #[test]
  fn destination_must_be_http() {
    let config = BackendConfig { webhook_destination: Some("bot.example.com".into()), ..complete() };
    assert!(matches!(
      Settings::from_config(config),
      Err(ConfigError::Invalid { key: "webhook_destination", .. })
    ));
  }
}
