use async_trait::async_trait;
use tracing::info;

use crate::notify::{DeliveryOutcome, Dispatcher};

/// Dispatcher used when no chat transport is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDispatcher;

#[async_trait]
impl Dispatcher for LogDispatcher {
    async fn deliver(&self, recipients: &[i64], message: &str) -> Vec<DeliveryOutcome> {
        info!(
            target: "notify",
            recipients = recipients.len(),
            message,
            "alert (log only)"
        );

        recipients
            .iter()
            .map(|&recipient| DeliveryOutcome {
                recipient,
                result: Ok(()),
            })
            .collect()
    }
}
