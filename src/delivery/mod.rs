//! Outbound delivery to operator recipients
//!
//! The transport is asynchronous and lives on the tokio runtime; the relay
//! worker is a plain thread. [`DeliveryChannel`] bridges the two with an
//! explicit per-call timeout.

pub mod channel;
pub mod error;
pub mod recipient;
pub mod telegram;
pub mod transport;

pub use channel::DeliveryChannel;
pub use error::{DeliveryError, DeliveryResult};
pub use recipient::{RecipientId, RecipientSet};
pub use telegram::{TelegramConfig, TelegramTransport};
pub use transport::DeliveryTransport;
