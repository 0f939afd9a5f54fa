use std::sync::Arc;
use std::sync::atomic::Ordering;

use tracing::{error, info};

use crate::error::AppError;
use crate::metrics::counters::Counters;
use crate::signal::model::CrossingEvent;
use crate::store::SignalStore;

/// Writes admitted crossings through the store.
///
/// A failed write is logged and returned; the caller moves on to the next
/// symbol.
pub struct EventRecorder {
    store: Arc<SignalStore>,
    counters: Counters,
}

impl EventRecorder {
    pub fn new(store: Arc<SignalStore>, counters: Counters) -> Self {
        Self { store, counters }
    }

    pub async fn record(&self, event: &CrossingEvent) -> Result<i64, AppError> {
        if event.is_backfilled {
            return Err(AppError::Persistence(
                "backfilled crossings are read-only and never recorded".to_string(),
            ));
        }

        match self.store.append_event(event).await {
            Ok(id) => {
                self.counters.recorded.fetch_add(1, Ordering::Relaxed);
                info!(
                    id,
                    symbol = %event.symbol,
                    timeframe = %event.timeframe,
                    kind = %event.kind,
                    previous = event.previous_oscillator_value,
                    current = event.oscillator_value,
                    price = %event.price,
                    "rsi crossing recorded"
                );
                Ok(id)
            }
            Err(e) => {
                self.counters.record_failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    error = %e,
                    symbol = %event.symbol,
                    kind = %event.kind,
                    "failed to persist crossing"
                );
                Err(e)
            }
        }
    }
}
