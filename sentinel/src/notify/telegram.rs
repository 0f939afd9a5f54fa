//! Telegram Bot API transport.

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::AppError;
use crate::notify::{DeliveryOutcome, Dispatcher};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// In-flight sendMessage calls per delivery.
const MAX_CONCURRENT_SENDS: usize = 4;

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Clone)]
pub struct TelegramDispatcher {
    http: Client,
    endpoint: String,
}

impl TelegramDispatcher {
    pub fn new(api_base: &str, token: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/bot{token}/sendMessage", api_base.trim_end_matches('/')),
        })
    }

    async fn send_one(&self, chat_id: i64, text: &str) -> Result<(), AppError> {
        let dispatch_err = |reason: String| AppError::Dispatch {
            recipient: chat_id,
            reason,
        };

        let reply: ApiReply = self
            .http
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id,
                text,
                parse_mode: "Markdown",
                disable_web_page_preview: true,
            })
            .send()
            .await
            .map_err(|e| dispatch_err(e.without_url().to_string()))?
            .json()
            .await
            .map_err(|e| dispatch_err(e.without_url().to_string()))?;

        if reply.ok {
            Ok(())
        } else {
            Err(dispatch_err(
                reply
                    .description
                    .unwrap_or_else(|| "telegram rejected the message".to_string()),
            ))
        }
    }
}

#[async_trait]
impl Dispatcher for TelegramDispatcher {
    #[instrument(skip(self, message), target = "notify", fields(recipients = recipients.len()))]
    async fn deliver(&self, recipients: &[i64], message: &str) -> Vec<DeliveryOutcome> {
        let outcomes: Vec<DeliveryOutcome> = stream::iter(recipients.iter().copied())
            .map(|recipient| async move {
                let result = self.send_one(recipient, message).await;
                if let Err(e) = &result {
                    error!(recipient, error = %e, "telegram delivery failed");
                }
                DeliveryOutcome { recipient, result }
            })
            .buffered(MAX_CONCURRENT_SENDS)
            .collect()
            .await;

        let sent = outcomes.iter().filter(|o| o.is_delivered()).count();
        info!(sent, total = outcomes.len(), "alert delivered");
        outcomes
    }
}
