//! Outbound alert delivery.
//!
//! The pipeline only decides *whether* to notify; everything about *how*
//! (transport, formatting, recipient lists) lives here.

pub mod format;
pub mod log;
pub mod telegram;

use async_trait::async_trait;

use crate::error::AppError;
use crate::store::SignalStore;

pub use format::{alert_text, tradingview_url};
pub use log::LogDispatcher;
pub use telegram::TelegramDispatcher;

/// Result of one delivery attempt.
#[derive(Debug)]
pub struct DeliveryOutcome {
    pub recipient: i64,
    pub result: Result<(), AppError>,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        self.result.is_ok()
    }
}

#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// One outcome per recipient, in input order. A failed recipient never
    /// aborts delivery to the rest.
    async fn deliver(&self, recipients: &[i64], message: &str) -> Vec<DeliveryOutcome>;
}

/// Approved subscribers plus the admin chat, without duplicates.
pub async fn recipients(store: &SignalStore, admin: Option<i64>) -> Result<Vec<i64>, AppError> {
    let mut out: Vec<i64> = store
        .subscribers(true)
        .await?
        .into_iter()
        .map(|s| s.chat_id)
        .collect();

    if let Some(admin) = admin.filter(|a| !out.contains(a)) {
        out.push(admin);
    }

    Ok(out)
}
