//! HTTP surface: signal history, historical replay, watch-set settings and
//! subscriber approval. Reads go straight to the store; nothing here talks
//! to the worker loop.

pub mod dto;
pub mod handlers;
pub mod routes;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::market::SeriesProvider;
use crate::metrics::counters::Counters;
use crate::store::SignalStore;

pub use routes::routes;

#[derive(Clone, Debug)]
pub struct ApiSettings {
    /// Upper clamp for the historical replay horizon.
    pub backfill_max_days: u64,
    /// Most candles a single replay may request.
    pub backfill_max_points: usize,
}

impl ApiSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            backfill_max_days: cfg.backfill_max_days,
            backfill_max_points: 1_000,
        }
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<SignalStore>,
    pub provider: Arc<dyn SeriesProvider>,
    pub counters: Counters,
    pub settings: ApiSettings,
}
