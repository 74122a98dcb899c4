//! Async HTTP client wrapping the Spark REST API.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use spark_core::{
  Error, Membership, Person, Result, Room, Webhook,
  api::{MessageRecord, NewMessage, PeopleQuery, SparkApi},
  webhook::NewWebhook,
};
use tracing::{debug, warn};

/// Public Webex API root.
pub const DEFAULT_API_URL: &str = "https://webexapis.com/v1";

/// Connection settings for the platform API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
  pub base_url:         String,
  /// Pre-provisioned bot access token.
  pub token:            String,
  /// Upper bound for a single HTTP exchange.
  pub timeout:          Duration,
  /// Total attempts for a GET, including the first.
  pub max_get_attempts: u32,
  /// Delay before the first GET retry; doubled for each further retry.
  pub retry_backoff:    Duration,
}

impl ClientConfig {
  pub fn new(token: impl Into<String>) -> Self {
    Self {
      base_url:         DEFAULT_API_URL.to_string(),
      token:            token.into(),
      timeout:          Duration::from_secs(30),
      max_get_attempts: 3,
      retry_backoff:    Duration::from_millis(250),
    }
  }
}

/// Async HTTP client for the platform REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct SparkClient {
  client: Client,
  config: ClientConfig,
}

/// List responses wrap their records in `{"items": [...]}`.
#[derive(Deserialize)]
struct Items<T> {
  items: Vec<T>,
}

/// Error body returned by the platform.
#[derive(Deserialize)]
struct ErrorBody {
  message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewMembership<'a> {
  room_id:   &'a str,
  person_id: &'a str,
}

impl SparkClient {
  pub fn new(config: ClientConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn request(&self, method: Method, path: &str) -> RequestBuilder {
    self.client.request(method, self.url(path)).bearer_auth(&self.config.token)
  }

  async fn send(&self, what: &str, req: RequestBuilder) -> Result<Response> {
    let resp = req.send().await.map_err(|e| transport_error(what, e))?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
      .map(|b| b.message)
      .unwrap_or(body);
    Err(match status.as_u16() {
      404 => Error::NotFound(format!("{what}: {message}")),
      409 => Error::Conflict(format!("{what}: {message}")),
      code => Error::Status { status: code, message: format!("{what}: {message}") },
    })
  }

  async fn decode<T: DeserializeOwned>(what: &str, resp: Response) -> Result<T> {
    let bytes = resp.bytes().await.map_err(|e| transport_error(what, e))?;
    Ok(serde_json::from_slice(&bytes)?)
  }

  /// `GET` with bounded retry.
  async fn get_json<T: DeserializeOwned + Send>(
    &self,
    path:  &str,
    query: &[(&str, &str)],
  ) -> Result<T> {
    let what = format!("GET {path}");
    let mut attempt = 1;
    loop {
      let req = self.request(Method::GET, path).query(query);
      let result = match self.send(&what, req).await {
        Ok(resp) => Self::decode(&what, resp).await,
        Err(e) => Err(e),
      };
      match result {
        Err(e) if e.is_retryable() && attempt < self.config.max_get_attempts => {
          let delay = self.config.retry_backoff * 2u32.pow(attempt - 1);
          warn!(request = %what, attempt, error = %e, ?delay, "request failed; retrying");
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        other => return other,
      }
    }
  }

  /// `POST` exactly once.
  async fn post_json<B: Serialize + Sync, T: DeserializeOwned + Send>(
    &self,
    path: &str,
    body: &B,
  ) -> Result<T> {
    let what = format!("POST {path}");
    let resp = self.send(&what, self.request(Method::POST, path).json(body)).await?;
    Self::decode(&what, resp).await
  }

  /// `DELETE` exactly once.
  async fn delete(&self, path: &str) -> Result<()> {
    let what = format!("DELETE {path}");
    self.send(&what, self.request(Method::DELETE, path)).await?;
    debug!(request = %what, "deleted");
    Ok(())
  }
}

fn transport_error(what: &str, e: reqwest::Error) -> Error {
  if e.is_timeout() {
    Error::Timeout(what.to_string())
  } else {
    Error::Transport(format!("{what}: {e}"))
  }
}

impl SparkApi for SparkClient {
  // ── People ────────────────────────────────────────────────────────────────

  async fn me(&self) -> Result<Person> { self.get_json("people/me", &[]).await }

  async fn list_people(&self, query: &PeopleQuery) -> Result<Vec<Person>> {
    let mut params = Vec::new();
    if let Some(email) = &query.email {
      params.push(("email", email.as_str()));
    }
    if let Some(name) = &query.display_name {
      params.push(("displayName", name.as_str()));
    }
    let page: Items<Person> = self.get_json("people", &params).await?;
    Ok(page.items)
  }

  async fn get_person(&self, id: &str) -> Result<Person> {
    self.get_json(&format!("people/{id}"), &[]).await
  }

  // ── Rooms & memberships ───────────────────────────────────────────────────

  async fn get_room(&self, id: &str) -> Result<Room> {
    self.get_json(&format!("rooms/{id}"), &[]).await
  }

  async fn create_membership(&self, room_id: &str, person_id: &str) -> Result<Membership> {
    self.post_json("memberships", &NewMembership { room_id, person_id }).await
  }

  async fn list_memberships(&self, room_id: &str) -> Result<Vec<Membership>> {
    let page: Items<Membership> = self.get_json("memberships", &[("roomId", room_id)]).await?;
    Ok(page.items)
  }

  async fn delete_membership(&self, id: &str) -> Result<()> {
    self.delete(&format!("memberships/{id}")).await
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn create_message(&self, message: &NewMessage) -> Result<MessageRecord> {
    self.post_json("messages", message).await
  }

  async fn get_message(&self, id: &str) -> Result<MessageRecord> {
    self.get_json(&format!("messages/{id}"), &[]).await
  }

  // ── Webhooks ──────────────────────────────────────────────────────────────

  async fn create_webhook(&self, webhook: &NewWebhook) -> Result<Webhook> {
    self.post_json("webhooks", webhook).await
  }

  async fn list_webhooks(&self) -> Result<Vec<Webhook>> {
    let page: Items<Webhook> = self.get_json("webhooks", &[]).await?;
    Ok(page.items)
  }

  async fn delete_webhook(&self, id: &str) -> Result<()> {
    self.delete(&format!("webhooks/{id}")).await
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  };

  use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
  };
  use serde_json::{Value, json};

  use super::*;

  #[derive(Clone, Default)]
  struct Counters {
    rooms:    Arc<AtomicUsize>,
    webhooks: Arc<AtomicUsize>,
    slow:     Arc<AtomicUsize>,
  }

  fn authorised(headers: &HeaderMap) -> bool {
    headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer tok")
  }

  fn bot() -> Value {
    json!({ "id": "P-bot", "emails": ["bot@sparkbot.io"], "displayName": "Bot" })
  }

  async fn me(headers: HeaderMap) -> Response {
    if !authorised(&headers) {
      return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "bad token" }))).into_response();
    }
    Json(bot()).into_response()
  }

  async fn people(Query(q): Query<std::collections::HashMap<String, String>>) -> Json<Value> {
    let items = if q.get("email").map(String::as_str) == Some("bot@sparkbot.io") {
      vec![bot()]
    } else {
      vec![]
    };
    Json(json!({ "items": items }))
  }

  /// Fails with 503 on the first call, then succeeds.
  async fn room(State(c): State<Counters>, Path(id): Path<String>) -> Response {
    if id == "R-missing" {
      return (StatusCode::NOT_FOUND, Json(json!({ "message": "room not found" }))).into_response();
    }
    if c.rooms.fetch_add(1, Ordering::SeqCst) == 0 {
      return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Json(json!({ "id": id, "title": "Ops", "type": "group" })).into_response()
  }

  async fn memberships() -> Response {
    (StatusCode::CONFLICT, Json(json!({ "message": "already a member" }))).into_response()
  }

  async fn create_webhook(State(c): State<Counters>) -> StatusCode {
    c.webhooks.fetch_add(1, Ordering::SeqCst);
    StatusCode::SERVICE_UNAVAILABLE
  }

  async fn list_webhooks() -> Json<Value> {
    Json(json!({ "items": [{
      "id": "W1",
      "name": "CiscoSparkBackend",
      "targetUrl": "https://bot.example.com/errbot/spark",
      "resource": "messages",
      "event": "created",
      "filter": "roomId=R1"
    }]}))
  }

  /// Answers well after the client has given up.
  async fn slow(State(c): State<Counters>) -> StatusCode {
    c.slow.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(500)).await;
    StatusCode::NO_CONTENT
  }

  async fn delete_webhook(Path(id): Path<String>) -> StatusCode {
    if id == "W1" { StatusCode::NO_CONTENT } else { StatusCode::NOT_FOUND }
  }

  async fn serve() -> (SparkClient, Counters) {
    let counters = Counters::default();
    let app = Router::new()
      .route("/people/me", get(me))
      .route("/people", get(people))
      .route("/rooms/{id}", get(room))
      .route("/memberships", post(memberships))
      .route("/webhooks", get(list_webhooks).post(create_webhook))
      .route("/webhooks/{id}", delete(delete_webhook))
      .route("/messages", post(slow))
      .route("/messages/{id}", get(slow))
      .with_state(counters.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let config = ClientConfig {
      base_url:         format!("http://{addr}/"),
      retry_backoff:    Duration::from_millis(5),
      ..ClientConfig::new("tok")
    };
    (SparkClient::new(config).unwrap(), counters)
  }

  #[tokio::test]
  async fn me_sends_bearer_token() {
    let (client, _) = serve().await;
    let me = client.me().await.unwrap();
    assert_eq!(me.id, "P-bot");
    assert_eq!(me.display_name, "Bot");
  }

  #[tokio::test]
  async fn wrong_token_is_a_status_error() {
    let (client, _) = serve().await;
    let client = SparkClient::new(ClientConfig {
      token: "nope".into(),
      ..client.config.clone()
    })
    .unwrap();
    match client.me().await {
      Err(Error::Status { status, message }) => {
        assert_eq!(status, 401);
        assert!(message.contains("bad token"), "{message}");
      }
      other => panic!("unexpected: {other:?}"),
    }
  }

  #[tokio::test]
  async fn list_people_unwraps_items() {
    let (client, _) = serve().await;
    let found = client.list_people(&PeopleQuery::by_email("bot@sparkbot.io")).await.unwrap();
    assert_eq!(found.len(), 1);
    let none = client.list_people(&PeopleQuery::by_email("x@example.com")).await.unwrap();
    assert!(none.is_empty());
  }

  #[tokio::test]
  async fn get_retries_transient_failures() {
    let (client, counters) = serve().await;
    let room = client.get_room("R1").await.unwrap();
    assert_eq!(room.title, "Ops");
    assert_eq!(counters.rooms.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn not_found_is_not_retried() {
    let (client, _) = serve().await;
    let err = client.get_room("R-missing").await.unwrap_err();
    assert!(err.is_not_found(), "{err}");
  }

  #[tokio::test]
  async fn conflict_is_classified() {
    let (client, _) = serve().await;
    let err = client.create_membership("R1", "P-bot").await.unwrap_err();
    assert!(err.is_conflict(), "{err}");
  }

  #[tokio::test]
  async fn webhook_creation_is_never_retried() {
    let (client, counters) = serve().await;
    let hook = NewWebhook {
      name:       "CiscoSparkBackend".into(),
      target_url: "https://bot.example.com/errbot/spark".into(),
      resource:   "messages".into(),
      event:      "created".into(),
      filter:     Some("roomId=R1".into()),
      secret:     Some("s3cret".into()),
    };
    assert!(client.create_webhook(&hook).await.is_err());
    assert_eq!(counters.webhooks.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn list_and_delete_webhooks() {
    let (client, _) = serve().await;
    let hooks = client.list_webhooks().await.unwrap();
    assert_eq!(hooks[0].room_id(), Some("R1"));
    client.delete_webhook("W1").await.unwrap();
    assert!(client.delete_webhook("W2").await.unwrap_err().is_not_found());
  }

  #[tokio::test]
  async fn get_retries_timeouts_and_post_does_not() {
    let (client, counters) = serve().await;
    let client = SparkClient::new(ClientConfig {
      timeout: Duration::from_millis(50),
      ..client.config.clone()
    })
    .unwrap();

    let err = client.get_message("M1").await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)), "{err}");
    assert!(err.is_retryable());
    assert_eq!(counters.slow.load(Ordering::SeqCst), 3);

    let err = client.create_message(&NewMessage::to_room("R1", "hi")).await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)), "{err}");
    assert_eq!(counters.slow.load(Ordering::SeqCst), 4);
  }

  #[tokio::test]
  async fn unreachable_host_is_a_transport_error() {
    let client = SparkClient::new(ClientConfig {
      base_url:         "http://127.0.0.1:1".into(),
      max_get_attempts: 1,
      ..ClientConfig::new("tok")
    })
    .unwrap();
    let err = client.me().await.unwrap_err();
    assert!(err.is_retryable(), "{err}");
  }
}
