//! Telegram Bot API transport
//!
//! One `sendMessage` call per recipient, authenticated by the bot token in
//! the URL path.

use crate::delivery::error::{DeliveryError, DeliveryResult};
use crate::delivery::recipient::RecipientId;
use crate::delivery::transport::DeliveryTransport;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Without trailing slash, e.g. `https://api.telegram.org`
    pub api_base: String,

    pub bot_token: String,

    /// HTTP-level timeout; the delivery channel enforces its own on top
    pub request_timeout_ms: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            bot_token: String::new(),
            request_timeout_ms: 10_000,
        }
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_base", &self.api_base)
            .field("bot_token", &"<redacted>")
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramTransport {
    client: reqwest::Client,
    send_url: String,
    request_timeout: Duration,
}

impl TelegramTransport {
    pub fn new(config: &TelegramConfig) -> DeliveryResult<Self> {
        if config.bot_token.trim().is_empty() {
            return Err(DeliveryError::Misconfigured(
                "telegram bot token is empty".to_string(),
            ));
        }

        let request_timeout = Duration::from_millis(config.request_timeout_ms.max(1));
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| DeliveryError::Misconfigured(e.to_string()))?;

        let send_url = format!(
            "{}/bot{}/sendMessage",
            config.api_base.trim_end_matches('/'),
            config.bot_token.trim()
        );

        Ok(Self {
            client,
            send_url,
            request_timeout,
        })
    }

    async fn send_message(&self, recipient: &RecipientId, text: &str) -> DeliveryResult<()> {
        let response = self
            .client
            .post(&self.send_url)
            .json(&SendMessage {
                chat_id: recipient.as_str(),
                text,
            })
            .send()
            .await
            .map_err(|e| map_reqwest_err(e, self.request_timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_err(e, self.request_timeout))?;
        interpret_response(status.as_u16(), &body)
    }
}

impl DeliveryTransport for TelegramTransport {
    fn send<'a>(
        &'a self,
        recipient: &'a RecipientId,
        text: &'a str,
    ) -> BoxFuture<'a, DeliveryResult<()>> {
        self.send_message(recipient, text).boxed()
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

/// Map a Bot API reply to a delivery outcome
fn interpret_response(status: u16, body: &str) -> DeliveryResult<()> {
    let parsed: Option<ApiResponse> = serde_json::from_str(body).ok();

    match parsed {
        Some(reply) if reply.ok && (200..300).contains(&status) => Ok(()),
        Some(reply) => Err(DeliveryError::Rejected {
            status,
            description: reply
                .description
                .unwrap_or_else(|| "no description".to_string()),
        }),
        None => Err(DeliveryError::Rejected {
            status,
            description: format!("unparseable response ({} bytes)", body.len()),
        }),
    }
}

fn map_reqwest_err(e: reqwest::Error, timeout: Duration) -> DeliveryError {
    // Strip the URL: it embeds the bot token
    let e = e.without_url();
    if e.is_timeout() {
        DeliveryError::Timeout(timeout)
    } else {
        DeliveryError::Transport(e.to_string())
    }
}
