//! Error types and axum `IntoResponse` implementation.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum Error {
  #[error("configuration error: {0}")]
  Configuration(#[from] ConfigError),
  #[error("platform error: {0}")]
  Api(#[from] spark_core::Error),
  #[error("signature verification failed: {0}")]
  Authentication(&'static str),
  #[error("malformed payload: {0}")]
  MalformedPayload(String),
  #[error("message dispatch unavailable")]
  DispatchClosed,
  #[error("room {0} is being left")]
  RoomLeaving(String),
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn is_not_found(&self) -> bool { matches!(self, Error::Api(e) if e.is_not_found()) }

  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::Store(Box::new(e))
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Authentication(_) => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
      Error::MalformedPayload(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
      Error::Api(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
      Error::DispatchClosed => {
        (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
      }
      Error::Configuration(_) | Error::RoomLeaving(_) | Error::Store(_) | Error::Io(_) => {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
      }
    }
  }
}
