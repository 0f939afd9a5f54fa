use crate::signal::model::{CrossingEvent, Timeframe};

/// A persisted crossing: the event verbatim plus storage identity.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalRecord {
    pub id: i64,
    pub event: CrossingEvent,
    /// When the row was written (ms since epoch)
    pub created_ms: u64,
}

/// Filter for event reads. Results are newest first.
#[derive(Clone, Debug, PartialEq)]
pub struct EventQuery {
    pub symbol: Option<String>,
    pub timeframe: Option<Timeframe>,
    /// Inclusive lower bound on `occurred_ms`.
    pub since_ms: Option<u64>,
    /// Inclusive upper bound on `occurred_ms`.
    pub until_ms: Option<u64>,
    pub limit: usize,
}

impl EventQuery {
    pub fn recent(limit: usize) -> Self {
        Self {
            symbol: None,
            timeframe: None,
            since_ms: None,
            until_ms: None,
            limit,
        }
    }

    pub fn for_pair(symbol: &str, timeframe: Timeframe, limit: usize) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            timeframe: Some(timeframe),
            ..Self::recent(limit)
        }
    }

    pub fn between(mut self, since_ms: u64, until_ms: u64) -> Self {
        self.since_ms = Some(since_ms);
        self.until_ms = Some(until_ms);
        self
    }
}

/// Chat recipient. Only approved subscribers receive alerts.
#[derive(Clone, Debug, PartialEq)]
pub struct Subscriber {
    pub chat_id: i64,
    pub username: String,
    pub approved: bool,
    pub created_ms: u64,
}
