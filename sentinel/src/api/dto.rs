use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::metrics::counters::CountersSnapshot;
use crate::signal::model::CrossingEvent;
use crate::store::{SignalRecord, Subscriber};
use crate::time::ms_to_rfc3339;

/// Default page size for `/api/signals`.
pub const DEFAULT_SIGNALS_LIMIT: usize = 100;
/// Default page size for `/api/signals/{symbol}`.
pub const DEFAULT_SYMBOL_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 1_000;

#[derive(Debug, Default, Deserialize)]
pub struct SignalsQuery {
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    pub since_hours: Option<u64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct WatchSetUpdate {
    pub symbols: Vec<String>,
    pub timeframe: String,
}

#[derive(Debug, Deserialize)]
pub struct NotificationToggle {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubscriberRegistration {
    pub chat_id: i64,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct ApprovalUpdate {
    pub approved: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignalDto {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<i64>,
    pub symbol: String,
    pub timeframe: String,
    pub signal_type: String,
    pub rsi_value: f64,
    pub previous_rsi: f64,
    pub price: f64,
    pub timestamp: String,
    pub backfilled: bool,
}

impl SignalDto {
    pub fn from_event(event: &CrossingEvent) -> Self {
        Self {
            id: None,
            symbol: event.symbol.clone(),
            timeframe: event.timeframe.to_string(),
            signal_type: event.kind.to_string(),
            rsi_value: round2(event.oscillator_value),
            previous_rsi: round2(event.previous_oscillator_value),
            price: event.price.to_f64().unwrap_or_default(),
            timestamp: ms_to_rfc3339(event.occurred_ms),
            backfilled: event.is_backfilled,
        }
    }
}

impl From<&SignalRecord> for SignalDto {
    fn from(record: &SignalRecord) -> Self {
        Self {
            id: Some(record.id),
            ..Self::from_event(&record.event)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoricalDto {
    pub symbol: String,
    pub days: u64,
    pub timeframe: String,
    pub signals: Vec<SignalDto>,
    pub total_signals: usize,
}

#[derive(Debug, Serialize)]
pub struct SubscriberDto {
    pub chat_id: i64,
    pub username: String,
    pub approved: bool,
    pub created_at: String,
}

impl From<Subscriber> for SubscriberDto {
    fn from(s: Subscriber) -> Self {
        Self {
            chat_id: s.chat_id,
            username: s.username,
            approved: s.approved,
            created_at: ms_to_rfc3339(s.created_ms),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusDto {
    pub running: bool,
    pub last_cycle_ms: Option<u64>,
    pub last_cycle_at: Option<String>,
    pub total_signals: u64,
    pub counters: CountersSnapshot,
}

#[derive(Debug, Serialize)]
pub struct ErrorDto {
    pub error: String,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
