use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use common::warn_if_slow;
use tracing::{debug, info, instrument};

use crate::error::AppError;
use crate::signal::model::{CrossingEvent, WatchConfig};
use crate::store::model::{EventQuery, SignalRecord, Subscriber};
use crate::store::repository::SignalRepository;
use crate::time::now_ms;

/// Service-facing store. Wraps the repository with timing, context and the
/// mapping into `AppError::Persistence`.
///
/// Holds no authoritative state of its own: the watch config defaults are
/// only used to seed an empty database.
pub struct SignalStore {
    repo: Arc<dyn SignalRepository>,
    defaults: WatchConfig,
}

impl SignalStore {
    pub fn new(repo: Arc<dyn SignalRepository>, defaults: WatchConfig) -> Self {
        Self { repo, defaults }
    }

    #[instrument(
        skip(self, event),
        target = "store",
        fields(symbol = %event.symbol, timeframe = %event.timeframe, kind = %event.kind)
    )]
    pub async fn append_event(&self, event: &CrossingEvent) -> Result<i64, AppError> {
        let id = warn_if_slow("db_append_event", Duration::from_millis(100), async {
            self.repo.append_event(event, now_ms()).await
        })
        .await
        .context("failed to append signal")
        .map_err(AppError::persistence)?;

        debug!(id, "signal appended");
        Ok(id)
    }

    #[instrument(skip(self), target = "store")]
    pub async fn query_events(&self, query: &EventQuery) -> Result<Vec<SignalRecord>, AppError> {
        warn_if_slow("db_query_events", Duration::from_millis(200), async {
            self.repo.query_events(query).await
        })
        .await
        .context("failed to query signals")
        .map_err(AppError::persistence)
    }

    pub async fn count_events(&self) -> Result<u64, AppError> {
        self.repo
            .count_events()
            .await
            .context("failed to count signals")
            .map_err(AppError::persistence)
    }

    /// Current watch config; seeds the defaults on first use.
    #[instrument(skip(self), target = "store")]
    pub async fn watch_config(&self) -> Result<WatchConfig, AppError> {
        let stored = warn_if_slow("db_get_watch_config", Duration::from_millis(50), async {
            self.repo.get_watch_config().await
        })
        .await
        .context("failed to read watch config")
        .map_err(AppError::persistence)?;

        match stored {
            Some(cfg) => Ok(cfg),
            None => {
                info!(
                    symbols = self.defaults.symbols.len(),
                    timeframe = %self.defaults.timeframe,
                    "no watch config stored; seeding defaults"
                );
                self.save_watch_config(&self.defaults).await?;
                Ok(self.defaults.clone())
            }
        }
    }

    #[instrument(skip(self, config), target = "store", fields(symbols = config.symbols.len(), timeframe = %config.timeframe))]
    pub async fn save_watch_config(&self, config: &WatchConfig) -> Result<(), AppError> {
        warn_if_slow("db_save_watch_config", Duration::from_millis(50), async {
            self.repo.save_watch_config(config).await
        })
        .await
        .context("failed to save watch config")
        .map_err(AppError::persistence)
    }

    /// Validated replace of the watch set. Leaves the stored config untouched
    /// when validation fails.
    pub async fn update_watch_set(
        &self,
        symbols: &[String],
        timeframe: &str,
    ) -> Result<WatchConfig, AppError> {
        let current = self.watch_config().await?;
        let next = current.with_watch_set(symbols, timeframe)?;
        self.save_watch_config(&next).await?;

        info!(
            symbols = ?next.symbols,
            timeframe = %next.timeframe,
            "watch set updated"
        );
        Ok(next)
    }

    pub async fn set_notifications_enabled(&self, enabled: bool) -> Result<WatchConfig, AppError> {
        let mut cfg = self.watch_config().await?;
        cfg.notifications_enabled = enabled;
        self.save_watch_config(&cfg).await?;

        info!(enabled, "notification flag updated");
        Ok(cfg)
    }

    pub async fn upsert_subscriber(&self, chat_id: i64, username: &str) -> Result<(), AppError> {
        self.repo
            .upsert_subscriber(chat_id, username, now_ms())
            .await
            .context("failed to upsert subscriber")
            .map_err(AppError::persistence)
    }

    pub async fn set_subscriber_approval(
        &self,
        chat_id: i64,
        approved: bool,
    ) -> Result<bool, AppError> {
        self.repo
            .set_subscriber_approval(chat_id, approved)
            .await
            .context("failed to update subscriber approval")
            .map_err(AppError::persistence)
    }

    pub async fn subscribers(&self, approved_only: bool) -> Result<Vec<Subscriber>, AppError> {
        self.repo
            .list_subscribers(approved_only)
            .await
            .context("failed to list subscribers")
            .map_err(AppError::persistence)
    }
}
