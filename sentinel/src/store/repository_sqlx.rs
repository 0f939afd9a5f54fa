use std::str::FromStr;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::any::AnyRow;
use sqlx::{Any, AnyPool, QueryBuilder, Row};

use crate::signal::model::{CrossingEvent, CrossingKind, Timeframe, WatchConfig};
use crate::store::model::{EventQuery, SignalRecord, Subscriber};
use crate::store::repository::SignalRepository;

/// SQLx-backed implementation of SignalRepository.
/// Responsible only for persistence and row mapping.
pub struct SqlxSignalRepository {
    pool: AnyPool,
}

impl SqlxSignalRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SignalRepository for SqlxSignalRepository {
    async fn append_event(&self, event: &CrossingEvent, created_ms: u64) -> anyhow::Result<i64> {
        let result = sqlx::query(
            r#"
INSERT INTO rsi_signals
  (symbol, timeframe, signal_type, rsi_value, previous_rsi, price, occurred_ms, created_ms)
VALUES (?, ?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(event.symbol.clone())
        .bind(event.timeframe.as_str())
        .bind(event.kind.as_str())
        .bind(event.oscillator_value)
        .bind(event.previous_oscillator_value)
        .bind(event.price.to_string())
        .bind(u64_to_i64(event.occurred_ms)?)
        .bind(u64_to_i64(created_ms)?)
        .execute(&self.pool)
        .await?;

        result
            .last_insert_id()
            .ok_or_else(|| anyhow!("driver returned no row id for inserted signal"))
    }

    async fn query_events(&self, query: &EventQuery) -> anyhow::Result<Vec<SignalRecord>> {
        let mut qb: QueryBuilder<Any> = QueryBuilder::new(
            r#"
SELECT id, symbol, timeframe, signal_type, rsi_value, previous_rsi, price, occurred_ms, created_ms
FROM rsi_signals
WHERE 1 = 1"#,
        );

        if let Some(symbol) = &query.symbol {
            qb.push(" AND symbol = ").push_bind(symbol.clone());
        }
        if let Some(tf) = query.timeframe {
            qb.push(" AND timeframe = ").push_bind(tf.as_str());
        }
        if let Some(since) = query.since_ms {
            qb.push(" AND occurred_ms >= ").push_bind(u64_to_i64(since)?);
        }
        if let Some(until) = query.until_ms {
            qb.push(" AND occurred_ms <= ").push_bind(u64_to_i64(until)?);
        }

        qb.push(" ORDER BY occurred_ms DESC, id DESC LIMIT ")
            .push_bind(query.limit as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_record(&r) {
                Ok(rec) => out.push(rec),
                Err(e) => {
                    // poison-row resilience: skip but don't fail the read
                    tracing::warn!(error = %e, "skipping malformed signal row");
                }
            }
        }

        Ok(out)
    }

    async fn count_events(&self) -> anyhow::Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM rsi_signals;")
            .fetch_one(&self.pool)
            .await?;

        i64_to_u64(row.try_get("n")?)
    }

    async fn get_watch_config(&self) -> anyhow::Result<Option<WatchConfig>> {
        let row = sqlx::query(
            r#"
SELECT symbols, timeframe, rsi_oversold, rsi_overbought, notifications_enabled
FROM watch_config
WHERE id = 1;
"#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_watch_config(&r)).transpose()
    }

    async fn save_watch_config(&self, config: &WatchConfig) -> anyhow::Result<()> {
        let symbols_json = serde_json::to_string(&config.symbols).context("encode symbols")?;

        sqlx::query(
            r#"
INSERT INTO watch_config
  (id, symbols, timeframe, rsi_oversold, rsi_overbought, notifications_enabled)
VALUES (1, ?, ?, ?, ?, ?)
ON CONFLICT(id) DO UPDATE SET
  symbols = excluded.symbols,
  timeframe = excluded.timeframe,
  rsi_oversold = excluded.rsi_oversold,
  rsi_overbought = excluded.rsi_overbought,
  notifications_enabled = excluded.notifications_enabled;
"#,
        )
        .bind(symbols_json)
        .bind(config.timeframe.as_str())
        .bind(config.oversold_threshold)
        .bind(config.overbought_threshold)
        .bind(bool_to_i64(config.notifications_enabled))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_subscriber(
        &self,
        chat_id: i64,
        username: &str,
        now_ms: u64,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO subscribers (chat_id, username, approved, created_ms)
VALUES (?, ?, 0, ?)
ON CONFLICT(chat_id) DO UPDATE SET username = excluded.username;
"#,
        )
        .bind(chat_id)
        .bind(username.to_string())
        .bind(u64_to_i64(now_ms)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_subscriber_approval(&self, chat_id: i64, approved: bool) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE subscribers SET approved = ? WHERE chat_id = ?;")
            .bind(bool_to_i64(approved))
            .bind(chat_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_subscribers(&self, approved_only: bool) -> anyhow::Result<Vec<Subscriber>> {
        let sql = if approved_only {
            "SELECT chat_id, username, approved, created_ms FROM subscribers WHERE approved = 1 ORDER BY created_ms, chat_id;"
        } else {
            "SELECT chat_id, username, approved, created_ms FROM subscribers ORDER BY created_ms, chat_id;"
        };

        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|r| -> anyhow::Result<Subscriber> {
                Ok(Subscriber {
                    chat_id: r.try_get("chat_id")?,
                    username: r.try_get("username")?,
                    approved: r.try_get::<i64, _>("approved")? == 1,
                    created_ms: i64_to_u64(r.try_get("created_ms")?)?,
                })
            })
            .collect()
    }
}

/* =========================
Row mapping + conversions
========================= */

fn row_to_record(r: &AnyRow) -> anyhow::Result<SignalRecord> {
    let timeframe: String = r.try_get("timeframe")?;
    let kind: String = r.try_get("signal_type")?;
    let price: String = r.try_get("price")?;

    Ok(SignalRecord {
        id: r.try_get("id")?,
        event: CrossingEvent {
            symbol: r.try_get("symbol")?,
            timeframe: Timeframe::from_str(&timeframe).context("invalid timeframe")?,
            kind: CrossingKind::from_str(&kind)?,
            oscillator_value: r.try_get("rsi_value")?,
            previous_oscillator_value: r.try_get("previous_rsi")?,
            price: Decimal::from_str(&price).context("invalid price")?,
            occurred_ms: i64_to_u64(r.try_get("occurred_ms")?)?,
            is_backfilled: false,
        },
        created_ms: i64_to_u64(r.try_get("created_ms")?)?,
    })
}

fn row_to_watch_config(r: &AnyRow) -> anyhow::Result<WatchConfig> {
    let symbols: String = r.try_get("symbols")?;
    let timeframe: String = r.try_get("timeframe")?;

    Ok(WatchConfig {
        symbols: serde_json::from_str(&symbols).context("invalid symbols json")?,
        timeframe: Timeframe::from_str(&timeframe).context("invalid timeframe")?,
        oversold_threshold: r.try_get("rsi_oversold")?,
        overbought_threshold: r.try_get("rsi_overbought")?,
        notifications_enabled: r.try_get::<i64, _>("notifications_enabled")? == 1,
    })
}

/* =========================
Numeric safety helpers
========================= */

fn i64_to_u64(v: i64) -> anyhow::Result<u64> {
    if v < 0 {
        return Err(anyhow!("negative i64 where u64 expected: {v}"));
    }
    Ok(v as u64)
}

fn u64_to_i64(v: u64) -> anyhow::Result<i64> {
    if v > i64::MAX as u64 {
        return Err(anyhow!("u64 too large for i64: {v}"));
    }
    Ok(v as i64)
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}
