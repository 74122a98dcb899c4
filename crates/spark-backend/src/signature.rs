//! Webhook signature verification and the [`SignedPayload`] extractor.
//!
//! The platform signs every delivery with HMAC-SHA1 over the raw request
//! body, keyed by the webhook secret, and sends the lowercase hex digest in
//! the `X-Spark-Signature` header.

use axum::{
  extract::{FromRequest, Request},
  http::HeaderMap,
};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use spark_core::api::SparkApi;
use tracing::warn;

use crate::{AppState, error::Error};

pub const SIGNATURE_HEADER: &str = "x-spark-signature";

/// Largest webhook body accepted.
const MAX_BODY_BYTES: usize = 1024 * 1024;

type HmacSha1 = Hmac<Sha1>;

fn keyed(secret: &str) -> Result<HmacSha1, Error> {
  HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| Error::Authentication("unusable secret"))
}

/// Hex HMAC-SHA1 of `body` under `secret`, as the platform computes it.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, Error> {
  let mut mac = keyed(secret)?;
  mac.update(body);
  Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check `signature` (the header value, if any) against `body`.
///
/// The digest comparison is constant-time.
pub fn verify_signature(body: &[u8], signature: Option<&str>, secret: &str) -> Result<(), Error> {
  let signature = signature.ok_or(Error::Authentication("missing signature header"))?;
  let expected =
    hex::decode(signature.trim()).map_err(|_| Error::Authentication("signature is not hex"))?;

  let mut mac = keyed(secret)?;
  mac.update(body);
  mac
    .verify_slice(&expected)
    .map_err(|_| Error::Authentication("signature mismatch"))
}

/// Verify a delivery directly from its headers.
pub fn verify_headers(headers: &HeaderMap, body: &[u8], secret: &str) -> Result<(), Error> {
  let header = match headers.get(SIGNATURE_HEADER) {
    Some(v) => Some(v.to_str().map_err(|_| Error::Authentication("signature is not ascii"))?),
    None => None,
  };
  verify_signature(body, header, secret)
}

/// The raw body of a delivery whose signature has been verified.
pub struct SignedPayload(pub Bytes);

impl<A> FromRequest<AppState<A>> for SignedPayload
where
  A: SparkApi + 'static,
{
  type Rejection = Error;

  async fn from_request(req: Request, state: &AppState<A>) -> Result<Self, Self::Rejection> {
    let (parts, body) = req.into_parts();
    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
      .await
      .map_err(|e| Error::MalformedPayload(format!("unreadable body: {e}")))?;
    if let Err(e) = verify_headers(&parts.headers, &body, &state.settings.webhook_secret) {
      warn!(error = %e, "rejected webhook delivery");
      return Err(e);
    }
    Ok(SignedPayload(body))
  }
}
