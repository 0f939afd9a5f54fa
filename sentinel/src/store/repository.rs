use anyhow::Result;
use async_trait::async_trait;

use crate::signal::model::{CrossingEvent, WatchConfig};
use crate::store::model::{EventQuery, SignalRecord, Subscriber};

/// Persistence seam. Each method is one atomic operation from the caller's
/// point of view; no transactions span calls.
#[async_trait]
pub trait SignalRepository: Send + Sync {
    /// Appends an event and returns its row id.
    async fn append_event(&self, event: &CrossingEvent, created_ms: u64) -> Result<i64>;

    async fn query_events(&self, query: &EventQuery) -> Result<Vec<SignalRecord>>;

    async fn count_events(&self) -> Result<u64>;

    async fn get_watch_config(&self) -> Result<Option<WatchConfig>>;

    async fn save_watch_config(&self, config: &WatchConfig) -> Result<()>;

    async fn upsert_subscriber(&self, chat_id: i64, username: &str, now_ms: u64) -> Result<()>;

    /// Returns false when no such subscriber exists.
    async fn set_subscriber_approval(&self, chat_id: i64, approved: bool) -> Result<bool>;

    async fn list_subscribers(&self, approved_only: bool) -> Result<Vec<Subscriber>>;
}
