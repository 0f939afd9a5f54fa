//! Duplicate suppression backed solely by the store.
//!
//! Policy: a candidate is a duplicate iff the store already holds an event
//! for the same `(symbol, timeframe)` with the same kind whose `occurred_ms`
//! is strictly less than `window` away from the candidate's. At exactly
//! `window` apart the candidate is emitted.
//!
//! Store failures fail open: the candidate is emitted and the failure is
//! logged at error level, so an outage never silently swallows alerts.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tracing::{debug, error, instrument};

use crate::metrics::counters::Counters;
use crate::signal::model::CrossingEvent;
use crate::store::{EventQuery, SignalStore};

/// Upper bound on rows inspected per decision; a window holds a handful at most.
const MAX_WINDOW_ROWS: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Emit,
    /// Suppressed in favour of the already-persisted row `existing_id`.
    Suppress { existing_id: i64 },
}

pub struct DuplicateSuppressor {
    store: Arc<SignalStore>,
    window: Duration,
    counters: Counters,
}

impl DuplicateSuppressor {
    pub fn new(store: Arc<SignalStore>, window: Duration, counters: Counters) -> Self {
        Self {
            store,
            window,
            counters,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    #[instrument(
        skip(self, candidate),
        target = "suppressor",
        fields(symbol = %candidate.symbol, timeframe = %candidate.timeframe, kind = %candidate.kind)
    )]
    pub async fn check(&self, candidate: &CrossingEvent) -> Verdict {
        let window_ms = self.window.as_millis() as u64;
        if window_ms == 0 {
            return Verdict::Emit;
        }

        // (t - W, t + W) exclusive on both ends.
        let since = candidate.occurred_ms.saturating_sub(window_ms - 1);
        let until = candidate.occurred_ms.saturating_add(window_ms - 1);
        let query = EventQuery::for_pair(&candidate.symbol, candidate.timeframe, MAX_WINDOW_ROWS)
            .between(since, until);

        let recent = match self.store.query_events(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                self.counters
                    .suppressor_fail_open
                    .fetch_add(1, Ordering::Relaxed);
                error!(
                    error = %e,
                    "duplicate check could not read the store; failing open and emitting"
                );
                return Verdict::Emit;
            }
        };

        match recent.iter().find(|r| r.event.kind == candidate.kind) {
            Some(existing) => {
                debug!(
                    existing_id = existing.id,
                    existing_ms = existing.event.occurred_ms,
                    candidate_ms = candidate.occurred_ms,
                    "duplicate crossing suppressed"
                );
                Verdict::Suppress {
                    existing_id: existing.id,
                }
            }
            None => Verdict::Emit,
        }
    }
}
