//! Worker loop driving the signal pipeline.
//!
//! Responsibilities:
//! - Read the watch config once at the start of every cycle.
//! - Walk the watched symbols in configured order, one at a time, with a
//!   fixed pause between them.
//! - Per symbol: fetch → detect → suppress → record → policy → dispatch.
//!
//! Failure containment:
//! - Anything that goes wrong for one symbol, a panic included, is logged
//!   and counted, and the cycle moves on to the next symbol.
//! - A failed or panicking cycle is followed by the error cooldown; the loop
//!   itself only ends on the stop signal.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Context;
use common::{TraceId, root_span};
use futures::FutureExt;
use tokio::sync::watch;
use tracing::{Instrument, Span, debug, error, info, instrument, warn};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::market::{ProviderError, SeriesProvider};
use crate::metrics::counters::Counters;
use crate::notify::{self, Dispatcher};
use crate::signal::model::{CrossingEvent, SeriesWindow, WatchConfig};
use crate::signal::{DuplicateSuppressor, EventRecorder, Verdict, detect_live, should_notify};
use crate::store::SignalStore;
use crate::time::now_ms;

#[derive(Clone, Debug)]
pub struct SchedulerSettings {
    pub check_interval: Duration,
    pub symbol_pacing: Duration,
    pub error_cooldown: Duration,
    pub fetch_timeout: Duration,
    pub min_points: usize,
    pub admin_chat_id: Option<i64>,
}

impl SchedulerSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            check_interval: cfg.check_interval,
            symbol_pacing: cfg.symbol_pacing,
            error_cooldown: cfg.error_cooldown,
            fetch_timeout: cfg.fetch_timeout,
            min_points: cfg.series_min_points,
            admin_chat_id: cfg.telegram_admin_chat_id,
        }
    }
}

/// What happened to one symbol in one cycle.
#[derive(Debug)]
pub enum SymbolOutcome {
    /// No usable series this cycle.
    Skipped(AppError),
    NoCrossing,
    Suppressed { existing_id: i64 },
    Recorded { id: i64, notified: bool },
    RecordFailed(AppError),
    /// Processing panicked; carries the panic message.
    Failed(String),
}

#[derive(Debug)]
pub struct CycleReport {
    pub trace_id: TraceId,
    /// Per symbol, in processing order.
    pub outcomes: Vec<(String, SymbolOutcome)>,
    /// The stop signal arrived mid-cycle; remaining symbols were not visited.
    pub interrupted: bool,
}

impl CycleReport {
    pub fn recorded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, SymbolOutcome::Recorded { .. }))
            .count()
    }
}

pub struct CycleScheduler {
    store: Arc<SignalStore>,
    provider: Arc<dyn SeriesProvider>,
    suppressor: DuplicateSuppressor,
    recorder: EventRecorder,
    dispatcher: Arc<dyn Dispatcher>,
    settings: SchedulerSettings,
    counters: Counters,
}

impl CycleScheduler {
    pub fn new(
        store: Arc<SignalStore>,
        provider: Arc<dyn SeriesProvider>,
        dispatcher: Arc<dyn Dispatcher>,
        duplicate_window: Duration,
        settings: SchedulerSettings,
        counters: Counters,
    ) -> Self {
        Self {
            suppressor: DuplicateSuppressor::new(store.clone(), duplicate_window, counters.clone()),
            recorder: EventRecorder::new(store.clone(), counters.clone()),
            store,
            provider,
            dispatcher,
            settings,
            counters,
        }
    }

    /// Runs cycles until `stop` flips to `true` (or its sender is dropped).
    ///
    /// Sleeps are abandoned as soon as the stop signal arrives.
    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        self.counters.worker_running.store(true, Ordering::Relaxed);
        info!(
            interval_secs = self.settings.check_interval.as_secs(),
            duplicate_window_secs = self.suppressor.window().as_secs(),
            "rsi worker started"
        );

        loop {
            if *stop.borrow() {
                break;
            }

            let result = AssertUnwindSafe(self.cycle(&mut stop)).catch_unwind().await;

            let pause = match result {
                Ok(Ok(report)) => {
                    self.counters.cycles.fetch_add(1, Ordering::Relaxed);
                    self.counters.last_cycle_ms.store(now_ms(), Ordering::Relaxed);
                    if report.interrupted {
                        break;
                    }
                    self.settings.check_interval
                }
                Ok(Err(e)) => {
                    self.counters.cycle_failures.fetch_add(1, Ordering::Relaxed);
                    error!(error = ?e, "analysis cycle failed; cooling down");
                    self.settings.error_cooldown
                }
                Err(panic) => {
                    self.counters.cycle_failures.fetch_add(1, Ordering::Relaxed);
                    error!(panic = %panic_message(&*panic), "analysis cycle panicked; cooling down");
                    self.settings.error_cooldown
                }
            };

            if sleep_or_stop(pause, &mut stop).await {
                break;
            }
        }

        self.counters.worker_running.store(false, Ordering::Relaxed);
        info!("rsi worker stopped");
    }

    /// One full pass over the watch set.
    pub async fn run_cycle(&self) -> anyhow::Result<CycleReport> {
        let (_keep, mut never) = watch::channel(false);
        self.cycle(&mut never).await
    }

    async fn cycle(&self, stop: &mut watch::Receiver<bool>) -> anyhow::Result<CycleReport> {
        let trace_id = TraceId::new();
        let span = root_span("rsi_cycle", &trace_id);

        async move {
            let config = self
                .store
                .watch_config()
                .await
                .context("failed to load watch config")?;

            Span::current().record("timeframe", config.timeframe.as_str());
            debug!(symbols = config.symbols.len(), "cycle started");

            let mut report = CycleReport {
                trace_id,
                outcomes: Vec::with_capacity(config.symbols.len()),
                interrupted: false,
            };

            for (i, symbol) in config.symbols.iter().enumerate() {
                if i > 0 && sleep_or_stop(self.settings.symbol_pacing, stop).await {
                    report.interrupted = true;
                    break;
                }

                let outcome = match AssertUnwindSafe(self.process_symbol(symbol, &config))
                    .catch_unwind()
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(panic) => {
                        let message = panic_message(&*panic);
                        self.counters.symbols_failed.fetch_add(1, Ordering::Relaxed);
                        error!(symbol = %symbol, panic = %message, "symbol processing panicked");
                        SymbolOutcome::Failed(message)
                    }
                };
                self.counters.symbols_processed.fetch_add(1, Ordering::Relaxed);
                report.outcomes.push((symbol.clone(), outcome));
            }

            info!(
                symbols = report.outcomes.len(),
                recorded = report.recorded(),
                interrupted = report.interrupted,
                "cycle finished"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    #[instrument(
        skip(self, config),
        target = "scheduler",
        fields(symbol = %symbol, timeframe = %config.timeframe)
    )]
    pub async fn process_symbol(&self, symbol: &str, config: &WatchConfig) -> SymbolOutcome {
        let window = match self.fetch(symbol, config).await {
            Ok(w) => w,
            Err(e) => {
                match &e {
                    AppError::InsufficientData { .. } => {
                        self.counters
                            .symbols_insufficient
                            .fetch_add(1, Ordering::Relaxed);
                        debug!(error = %e, "skipping symbol this cycle");
                    }
                    _ => {
                        self.counters
                            .symbols_unavailable
                            .fetch_add(1, Ordering::Relaxed);
                        warn!(error = %e, "skipping symbol this cycle");
                    }
                }
                return SymbolOutcome::Skipped(e);
            }
        };

        let Some(event) = detect_live(symbol, config.timeframe, &window, &config.thresholds())
        else {
            return SymbolOutcome::NoCrossing;
        };
        self.counters.crossings_detected.fetch_add(1, Ordering::Relaxed);

        if let Verdict::Suppress { existing_id } = self.suppressor.check(&event).await {
            self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
            info!(existing_id, kind = %event.kind, "duplicate crossing suppressed");
            return SymbolOutcome::Suppressed { existing_id };
        }

        let id = match self.recorder.record(&event).await {
            Ok(id) => id,
            Err(e) => {
                self.counters.symbols_failed.fetch_add(1, Ordering::Relaxed);
                return SymbolOutcome::RecordFailed(e);
            }
        };

        let notified = should_notify(&event, config);
        if notified {
            self.dispatch(&event).await;
        } else {
            debug!(kind = %event.kind, "crossing recorded without notification");
        }

        SymbolOutcome::Recorded { id, notified }
    }

    async fn fetch(
        &self,
        symbol: &str,
        config: &WatchConfig,
    ) -> Result<SeriesWindow, AppError> {
        let fetched = tokio::time::timeout(
            self.settings.fetch_timeout,
            self.provider
                .fetch_series(symbol, config.timeframe, self.settings.min_points),
        )
        .await
        .unwrap_or(Err(ProviderError::Timeout(self.settings.fetch_timeout)));

        let window = fetched.map_err(|e| match e {
            ProviderError::InsufficientData { got } => AppError::InsufficientData {
                symbol: symbol.to_string(),
                got,
            },
            other => AppError::SourceUnavailable {
                symbol: symbol.to_string(),
                reason: other.to_string(),
            },
        })?;

        if window.len() < 2 {
            return Err(AppError::InsufficientData {
                symbol: symbol.to_string(),
                got: window.len(),
            });
        }

        Ok(window)
    }

    async fn dispatch(&self, event: &CrossingEvent) {
        let recipients = match notify::recipients(&self.store, self.settings.admin_chat_id).await {
            Ok(r) => r,
            Err(e) => {
                self.counters
                    .notifications_failed
                    .fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "could not resolve alert recipients");
                return;
            }
        };

        if recipients.is_empty() {
            debug!("no alert recipients configured");
            return;
        }

        let text = notify::alert_text(event);
        for outcome in self.dispatcher.deliver(&recipients, &text).await {
            let counter = if outcome.is_delivered() {
                &self.counters.notifications_sent
            } else {
                &self.counters.notifications_failed
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Sleeps for `d`; returns `true` if the stop signal arrived first.
async fn sleep_or_stop(d: Duration, stop: &mut watch::Receiver<bool>) -> bool {
    if *stop.borrow() {
        return true;
    }

    tokio::select! {
        _ = tokio::time::sleep(d) => false,
        changed = stop.changed() => match changed {
            Ok(()) => *stop.borrow(),
            Err(_) => true,
        },
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
