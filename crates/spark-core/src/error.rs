//! Error types for `spark-core`.
//!
//! [`Error`] doubles as the error type of [`crate::api::SparkApi`], so REST
//! implementations classify HTTP failures into these variants.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The platform answered 404.
  #[error("not found: {0}")]
  NotFound(String),

  /// The platform answered 409 (e.g. the bot is already a room member).
  #[error("conflict: {0}")]
  Conflict(String),

  /// Any other non-success status.
  #[error("platform returned {status}: {message}")]
  Status { status: u16, message: String },

  #[error("request timed out: {0}")]
  Timeout(String),

  #[error("transport error: {0}")]
  Transport(String),

  #[error("decode error: {0}")]
  Decode(#[from] serde_json::Error),
}

impl Error {
  pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound(_)) }

  pub fn is_conflict(&self) -> bool { matches!(self, Self::Conflict(_)) }

  /// Whether repeating the same idempotent request may succeed.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Timeout(_) | Self::Transport(_) => true,
      Self::Status { status, .. } => *status == 429 || *status >= 500,
      _ => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn retryable_classification() {
    assert!(Error::Timeout("GET rooms/R1".into()).is_retryable());
    assert!(Error::Transport("connection reset".into()).is_retryable());
    assert!(Error::Status { status: 503, message: String::new() }.is_retryable());
    assert!(Error::Status { status: 429, message: String::new() }.is_retryable());
    assert!(!Error::Status { status: 400, message: String::new() }.is_retryable());
    assert!(!Error::NotFound("x".into()).is_retryable());
    assert!(!Error::Conflict("x".into()).is_retryable());
  }
}
