use sqlx::AnyPool;

pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // Detected crossings (append-only)
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS rsi_signals (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  symbol TEXT NOT NULL,
  timeframe TEXT NOT NULL,
  signal_type TEXT NOT NULL,
  rsi_value REAL NOT NULL,
  previous_rsi REAL NOT NULL,
  price TEXT NOT NULL,
  occurred_ms BIGINT NOT NULL,
  created_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Watch set (singleton row)
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS watch_config (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  symbols TEXT NOT NULL,
  timeframe TEXT NOT NULL,
  rsi_oversold BIGINT NOT NULL,
  rsi_overbought BIGINT NOT NULL,
  notifications_enabled INTEGER NOT NULL CHECK (notifications_enabled IN (0,1))
);
"#,
    )
    .execute(pool)
    .await?;

    // Chat recipients
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS subscribers (
  chat_id BIGINT PRIMARY KEY,
  username TEXT NOT NULL,
  approved INTEGER NOT NULL DEFAULT 0 CHECK (approved IN (0,1)),
  created_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_signals_pair_time ON rsi_signals(symbol, timeframe, occurred_ms);"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_signals_time ON rsi_signals(occurred_ms);"#)
        .execute(pool)
        .await?;

    Ok(())
}
