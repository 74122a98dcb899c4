//! REST client for the Spark (Webex) platform API.
//!
//! [`SparkClient`] implements [`spark_core::api::SparkApi`] over `reqwest`
//! with a per-call timeout. Idempotent GETs are retried with exponential
//! backoff on timeouts, transport failures, 429 and 5xx; writes are sent
//! exactly once.

mod client;

pub use client::{ClientConfig, DEFAULT_API_URL, SparkClient};
