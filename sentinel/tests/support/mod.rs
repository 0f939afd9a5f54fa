//! Shared fixtures: isolated databases and hand-written collaborators.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use uuid::Uuid;

use sentinel::db::Db;
use sentinel::error::AppError;
use sentinel::market::{ProviderError, SeriesProvider};
use sentinel::notify::{DeliveryOutcome, Dispatcher};
use sentinel::signal::model::{OscillatorPoint, SeriesWindow, Timeframe, WatchConfig};
use sentinel::signal::{CrossingEvent, CrossingKind};
use sentinel::store::{EventQuery, SignalRecord, SignalRepository, SignalStore, SqlxSignalRepository, Subscriber};

/// Isolated, uniquely named in-memory SQLite database with the schema applied.
pub async fn setup_db() -> Db {
    let conn_str = format!("sqlite:file:{}?mode=memory&cache=shared", Uuid::new_v4());
    let db = Db::connect(&conn_str).await.unwrap();
    db.migrate().await.unwrap();
    db
}

pub async fn setup_store(defaults: WatchConfig) -> Arc<SignalStore> {
    let db = setup_db().await;
    let repo = Arc::new(SqlxSignalRepository::new(db.pool.clone()));
    Arc::new(SignalStore::new(repo, defaults))
}

pub fn watch(symbols: &[&str], notifications_enabled: bool) -> WatchConfig {
    WatchConfig {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        timeframe: Timeframe::M5,
        oversold_threshold: 30,
        overbought_threshold: 70,
        notifications_enabled,
    }
}

pub fn window(points: &[(u64, f64)]) -> SeriesWindow {
    SeriesWindow::new(
        points
            .iter()
            .map(|&(ts_ms, oscillator)| OscillatorPoint {
                ts_ms,
                close: Decimal::new(4_210_050, 2),
                oscillator,
            })
            .collect(),
    )
    .unwrap()
}

pub fn event(symbol: &str, kind: CrossingKind, occurred_ms: u64) -> CrossingEvent {
    CrossingEvent {
        symbol: symbol.to_string(),
        timeframe: Timeframe::M5,
        kind,
        oscillator_value: 28.0,
        previous_oscillator_value: 35.0,
        price: Decimal::new(4_210_050, 2),
        occurred_ms,
        is_backfilled: false,
    }
}

/// One scripted provider response.
#[derive(Clone, Debug)]
pub enum Script {
    Window(SeriesWindow),
    Unavailable(String),
    Insufficient(usize),
    Panic,
}

/// Replays scripted responses per symbol. The last response for a symbol
/// repeats once the script is exhausted; unknown symbols are unavailable.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, symbol: &str, responses: Vec<Script>) -> Self {
        self.scripts
            .lock()
            .insert(symbol.to_string(), responses.into_iter().collect());
        self
    }

    pub fn push(&self, symbol: &str, response: Script) {
        self.scripts
            .lock()
            .entry(symbol.to_string())
            .or_default()
            .push_back(response);
    }

    /// Symbols requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn requested_points(&self) -> Vec<usize> {
        self.calls.lock().iter().map(|(_, n)| *n).collect()
    }

    fn next(&self, symbol: &str) -> Script {
        let mut scripts = self.scripts.lock();
        match scripts.get_mut(symbol) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if queue.len() == 1 => queue[0].clone(),
            _ => Script::Unavailable(format!("no script for {symbol}")),
        }
    }
}

#[async_trait]
impl SeriesProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_series(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        min_points: usize,
    ) -> Result<SeriesWindow, ProviderError> {
        self.calls.lock().push((symbol.to_string(), min_points));

        match self.next(symbol) {
            Script::Window(w) => Ok(w),
            Script::Unavailable(reason) => Err(ProviderError::Unavailable {
                symbol: symbol.to_string(),
                reasons: reason,
            }),
            Script::Insufficient(got) => Err(ProviderError::InsufficientData { got }),
            Script::Panic => panic!("scripted provider panic"),
        }
    }
}

/// Provider that never answers within any reasonable timeout.
pub struct StalledProvider(pub Duration);

#[async_trait]
impl SeriesProvider for StalledProvider {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn fetch_series(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        _min_points: usize,
    ) -> Result<SeriesWindow, ProviderError> {
        tokio::time::sleep(self.0).await;
        Err(ProviderError::Timeout(self.0))
    }
}

/// Captures every delivery; recipients listed in `failing` are reported as
/// failed.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub deliveries: Mutex<Vec<(Vec<i64>, String)>>,
    pub failing: Vec<i64>,
}

impl RecordingDispatcher {
    pub fn failing(recipients: &[i64]) -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            failing: recipients.to_vec(),
        }
    }

    pub fn count(&self) -> usize {
        self.deliveries.lock().len()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn deliver(&self, recipients: &[i64], message: &str) -> Vec<DeliveryOutcome> {
        self.deliveries
            .lock()
            .push((recipients.to_vec(), message.to_string()));

        recipients
            .iter()
            .map(|&recipient| DeliveryOutcome {
                recipient,
                result: if self.failing.contains(&recipient) {
                    Err(AppError::Dispatch {
                        recipient,
                        reason: "blocked".to_string(),
                    })
                } else {
                    Ok(())
                },
            })
            .collect()
    }
}

/// Repository whose every read and write fails, except the watch config.
pub struct FailingRepository {
    pub watch: WatchConfig,
}

#[async_trait]
impl SignalRepository for FailingRepository {
    async fn append_event(&self, _event: &CrossingEvent, _created_ms: u64) -> anyhow::Result<i64> {
        anyhow::bail!("database is locked")
    }

    async fn query_events(&self, _query: &EventQuery) -> anyhow::Result<Vec<SignalRecord>> {
        anyhow::bail!("database is locked")
    }

    async fn count_events(&self) -> anyhow::Result<u64> {
        anyhow::bail!("database is locked")
    }

    async fn get_watch_config(&self) -> anyhow::Result<Option<WatchConfig>> {
        Ok(Some(self.watch.clone()))
    }

    async fn save_watch_config(&self, _config: &WatchConfig) -> anyhow::Result<()> {
        anyhow::bail!("database is locked")
    }

    async fn upsert_subscriber(&self, _chat_id: i64, _username: &str, _now_ms: u64) -> anyhow::Result<()> {
        anyhow::bail!("database is locked")
    }

    async fn set_subscriber_approval(&self, _chat_id: i64, _approved: bool) -> anyhow::Result<bool> {
        anyhow::bail!("database is locked")
    }

    async fn list_subscribers(&self, _approved_only: bool) -> anyhow::Result<Vec<Subscriber>> {
        anyhow::bail!("database is locked")
    }
}

/// Real SQLite repository whose event appends fail; reads and every other
/// write go through.
pub struct WriteFailingRepository {
    pub inner: SqlxSignalRepository,
}

impl WriteFailingRepository {
    pub async fn new() -> Self {
        let db = setup_db().await;
        Self {
            inner: SqlxSignalRepository::new(db.pool.clone()),
        }
    }
}

#[async_trait]
impl SignalRepository for WriteFailingRepository {
    async fn append_event(&self, _event: &CrossingEvent, _created_ms: u64) -> anyhow::Result<i64> {
        anyhow::bail!("disk I/O error")
    }

    async fn query_events(&self, query: &EventQuery) -> anyhow::Result<Vec<SignalRecord>> {
        self.inner.query_events(query).await
    }

    async fn count_events(&self) -> anyhow::Result<u64> {
        self.inner.count_events().await
    }

    async fn get_watch_config(&self) -> anyhow::Result<Option<WatchConfig>> {
        self.inner.get_watch_config().await
    }

    async fn save_watch_config(&self, config: &WatchConfig) -> anyhow::Result<()> {
        self.inner.save_watch_config(config).await
    }

    async fn upsert_subscriber(&self, chat_id: i64, username: &str, now_ms: u64) -> anyhow::Result<()> {
        self.inner.upsert_subscriber(chat_id, username, now_ms).await
    }

    async fn set_subscriber_approval(&self, chat_id: i64, approved: bool) -> anyhow::Result<bool> {
        self.inner.set_subscriber_approval(chat_id, approved).await
    }

    async fn list_subscribers(&self, approved_only: bool) -> anyhow::Result<Vec<Subscriber>> {
        self.inner.list_subscribers(approved_only).await
    }
}

/// Repository that panics on the watch config read, i.e. before any
/// per-symbol work starts.
pub struct PanickingRepository;

#[async_trait]
impl SignalRepository for PanickingRepository {
    async fn append_event(&self, _event: &CrossingEvent, _created_ms: u64) -> anyhow::Result<i64> {
        anyhow::bail!("unreachable")
    }

    async fn query_events(&self, _query: &EventQuery) -> anyhow::Result<Vec<SignalRecord>> {
        anyhow::bail!("unreachable")
    }

    async fn count_events(&self) -> anyhow::Result<u64> {
        anyhow::bail!("unreachable")
    }

    async fn get_watch_config(&self) -> anyhow::Result<Option<WatchConfig>> {
        panic!("corrupt watch config row")
    }

    async fn save_watch_config(&self, _config: &WatchConfig) -> anyhow::Result<()> {
        anyhow::bail!("unreachable")
    }

    async fn upsert_subscriber(&self, _chat_id: i64, _username: &str, _now_ms: u64) -> anyhow::Result<()> {
        anyhow::bail!("unreachable")
    }

    async fn set_subscriber_approval(&self, _chat_id: i64, _approved: bool) -> anyhow::Result<bool> {
        anyhow::bail!("unreachable")
    }

    async fn list_subscribers(&self, _approved_only: bool) -> anyhow::Result<Vec<Subscriber>> {
        anyhow::bail!("unreachable")
    }
}
