//! Core types and trait definitions for the Spark chat backend.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! platform REST API and the per-entity memory store are expressed as traits
//! ([`api::SparkApi`], [`memory::MemoryStore`]) implemented by sibling crates.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod api;
pub mod error;
pub mod identity;
pub mod memory;
pub mod message;
pub mod room;
pub mod webhook;

pub use error::{Error, Result};
pub use identity::{Identifier, Person, RoomOccupant};
pub use message::{Identity, Message};
pub use room::{Membership, Room, RoomType};
pub use webhook::{NewWebhook, Webhook};

#[cfg(any(test, feature = "testing"))]
pub mod testing;
