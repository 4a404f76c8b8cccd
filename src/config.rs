//! Process configuration
//!
//! Built once at startup and handed to each component by reference; nothing
//! here is mutated afterwards.

use crate::delivery::{RecipientSet, TelegramConfig};
use crate::queue::RedisQueueConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Backoff applied by the relay worker while the queue store is failing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueBackoffConfig {
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
}

impl Default for QueueBackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 100,
            max_interval_ms: 30_000,
        }
    }
}

impl QueueBackoffConfig {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms.max(1))
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms.max(self.initial_interval_ms).max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// PKCS#8 PEM private key used to open submissions
    pub private_key_path: PathBuf,

    /// Raw 32-byte at-rest key, generated on first run
    pub at_rest_key_path: PathBuf,

    /// Queue store connection
    pub queue: RedisQueueConfig,

    /// Outbound transport
    pub telegram: TelegramConfig,

    /// Delivery targets, in fan-out order
    pub recipients: Vec<String>,

    /// First line of every delivered message
    pub message_header: String,

    /// How long one worker pop blocks on an empty queue
    pub poll_timeout_ms: u64,

    /// Upper bound on a single per-recipient send
    pub delivery_timeout_ms: u64,

    pub queue_backoff: QueueBackoffConfig,

    /// HTTP listen address for the submission endpoint
    pub listen_addr: SocketAddr,

    /// Prometheus exporter address; disabled when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            private_key_path: PathBuf::from("keys/private_key.pem"),
            at_rest_key_path: PathBuf::from("keys/at_rest.key"),
            queue: RedisQueueConfig::default(),
            telegram: TelegramConfig::default(),
            recipients: Vec::new(),
            message_header: "📧 New form submission:".to_string(),
            poll_timeout_ms: 1_000,
            delivery_timeout_ms: 10_000,
            queue_backoff: QueueBackoffConfig::default(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            metrics_addr: None,
        }
    }
}

impl RelayConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    pub fn recipient_set(&self) -> RecipientSet {
        RecipientSet::new(self.recipients.iter().cloned())
    }

    /// Render the text delivered for one plaintext message
    pub fn format_message(&self, plaintext: &str) -> String {
        if self.message_header.is_empty() {
            plaintext.to_string()
        } else {
            format!("{}\n\n{}", self.message_header, plaintext)
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.recipient_set().is_empty() {
            return Err(ConfigError::Invalid(
                "at least one recipient is required".to_string(),
            ));
        }
        if self.telegram.bot_token.trim().is_empty() {
            return Err(ConfigError::Invalid("telegram bot token is empty".to_string()));
        }
        if self.poll_timeout_ms == 0 {
            return Err(ConfigError::Invalid("poll_timeout_ms must be > 0".to_string()));
        }
        if self.delivery_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "delivery_timeout_ms must be > 0".to_string(),
            ));
        }
        self.queue
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> RelayConfig {
        RelayConfig {
            recipients: vec!["797316319".to_string()],
            telegram: TelegramConfig {
                bot_token: "123:abc".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.delivery_timeout(), Duration::from_secs(10));
        assert_eq!(config.poll_timeout(), Duration::from_secs(1));
        assert!(config.metrics_addr.is_none());
    }

    #[test]
    fn test_validate() {
        assert!(valid_config().validate().is_ok());

        let no_recipients = RelayConfig {
            recipients: vec!["  ".to_string()],
            ..valid_config()
        };
        assert!(matches!(
            no_recipients.validate(),
            Err(ConfigError::Invalid(_))
        ));

        let mut no_token = valid_config();
        no_token.telegram.bot_token.clear();
        assert!(no_token.validate().is_err());

        let zero_poll = RelayConfig {
            poll_timeout_ms: 0,
            ..valid_config()
        };
        assert!(zero_poll.validate().is_err());
    }

    #[test]
    fn test_format_message() {
        let config = valid_config();
        assert_eq!(
            config.format_message("hello"),
            "📧 New form submission:\n\nhello"
        );

        let bare = RelayConfig {
            message_header: String::new(),
            ..valid_config()
        };
        assert_eq!(bare.format_message("hello"), "hello");
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("relay.json");
        std::fs::write(
            &path,
            r#"{
                "recipients": ["1", "2"],
                "telegram": {"api_base": "https://api.telegram.org", "bot_token": "t", "request_timeout_ms": 5000},
                "queue": {"url": "redis://queue:6379/1", "key": "custom", "io_timeout_ms": 500}
            }"#,
        )
        .unwrap();

        let config = RelayConfig::from_json_file(&path).unwrap();
        assert_eq!(config.recipient_set().len(), 2);
        assert_eq!(config.queue.key, "custom");
        assert_eq!(config.delivery_timeout_ms, 10_000);
        assert!(config.validate().is_ok());
    }
}
