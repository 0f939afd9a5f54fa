//! Minimum-spacing throttle around any provider.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::{Instant, sleep_until};

use crate::market::errors::ProviderError;
use crate::market::SeriesProvider;
use crate::signal::model::{SeriesWindow, Timeframe};

/// Spaces calls to the inner provider at least `min_interval` apart.
///
/// Callers reserve the next free slot under the lock and wait outside it, so
/// concurrent callers queue in reservation order.
pub struct Throttled<P> {
    inner: P,
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl<P> Throttled<P> {
    pub fn new(inner: P, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.min_interval);
            slot
        };

        sleep_until(slot).await;
    }
}

#[async_trait]
impl<P: SeriesProvider> SeriesProvider for Throttled<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        min_points: usize,
    ) -> Result<SeriesWindow, ProviderError> {
        self.acquire().await;
        self.inner.fetch_series(symbol, timeframe, min_points).await
    }
}
