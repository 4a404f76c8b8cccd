//! Sealed submission relay.
//!
//! Accepts RSA-encrypted form submissions, seals them for storage in a
//! durable queue and relays them to a fixed set of recipients.

pub mod api;
pub mod config;
pub mod crypto;
pub mod delivery;
pub mod metrics;
pub mod queue;
pub mod relay;
