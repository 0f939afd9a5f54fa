use std::convert::Infallible;

use tracing::{error, info, warn};
use warp::http::StatusCode;
use warp::reply::{self, Reply, Response};

use crate::api::ApiContext;
use crate::api::dto::{
    ApprovalUpdate, DEFAULT_SIGNALS_LIMIT, DEFAULT_SYMBOL_LIMIT, ErrorDto, HistoricalDto,
    LimitQuery, MAX_LIMIT, NotificationToggle, SignalDto, SignalsQuery, StatusDto,
    SubscriberDto, SubscriberRegistration, WatchSetUpdate,
};
use crate::error::AppError;
use crate::market::ProviderError;
use crate::signal::detect_backfill;
use crate::signal::model::{Timeframe, normalize_symbol};
use crate::store::EventQuery;
use crate::time::{ms_to_rfc3339, now_ms};

const HOUR_MS: u64 = 3_600_000;
const DAY_MS: u64 = 24 * HOUR_MS;

pub type HandlerResult = Result<Response, Infallible>;

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    reply::with_status(
        reply::json(&ErrorDto {
            error: message.into(),
        }),
        status,
    )
    .into_response()
}

fn app_error_response(err: &AppError) -> Response {
    let status = match err {
        AppError::ConfigValidation(_) => StatusCode::BAD_REQUEST,
        AppError::SourceUnavailable { .. } | AppError::InsufficientData { .. } => {
            StatusCode::BAD_GATEWAY
        }
        AppError::Persistence(_) | AppError::Dispatch { .. } => {
            error!(error = %err, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, err.to_string())
}

fn ok_json<T: serde::Serialize>(body: &T) -> HandlerResult {
    Ok(reply::json(body).into_response())
}

fn clamp_limit(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

pub async fn list_signals(q: SignalsQuery, ctx: ApiContext) -> HandlerResult {
    let mut query = EventQuery::recent(clamp_limit(q.limit, DEFAULT_SIGNALS_LIMIT));

    if let Some(symbol) = q.symbol.as_deref().filter(|s| !s.trim().is_empty()) {
        match normalize_symbol(symbol) {
            Ok(s) => query.symbol = Some(s),
            Err(e) => return Ok(app_error_response(&e)),
        }
    }
    if let Some(tf) = q.timeframe.as_deref().filter(|s| !s.trim().is_empty()) {
        match tf.parse::<Timeframe>() {
            Ok(tf) => query.timeframe = Some(tf),
            Err(e) => return Ok(app_error_response(&e)),
        }
    }
    if let Some(hours) = q.since_hours {
        query.since_ms = Some(now_ms().saturating_sub(hours.saturating_mul(HOUR_MS)));
    }

    match ctx.store.query_events(&query).await {
        Ok(records) => ok_json(&records.iter().map(SignalDto::from).collect::<Vec<_>>()),
        Err(e) => Ok(app_error_response(&e)),
    }
}

pub async fn symbol_signals(symbol: String, q: LimitQuery, ctx: ApiContext) -> HandlerResult {
    let symbol = match normalize_symbol(&symbol) {
        Ok(s) => s,
        Err(e) => return Ok(app_error_response(&e)),
    };

    let query = EventQuery {
        symbol: Some(symbol),
        ..EventQuery::recent(clamp_limit(q.limit, DEFAULT_SYMBOL_LIMIT))
    };

    match ctx.store.query_events(&query).await {
        Ok(records) => ok_json(&records.iter().map(SignalDto::from).collect::<Vec<_>>()),
        Err(e) => Ok(app_error_response(&e)),
    }
}

/// Replays detection over the last `days` of history with the current watch
/// settings. Read-only: replayed crossings are never stored.
pub async fn historical(symbol: String, days: u64, ctx: ApiContext) -> HandlerResult {
    let symbol = match normalize_symbol(&symbol) {
        Ok(s) => s,
        Err(e) => return Ok(app_error_response(&e)),
    };
    let days = days.clamp(1, ctx.settings.backfill_max_days.max(1));

    let config = match ctx.store.watch_config().await {
        Ok(c) => c,
        Err(e) => return Ok(app_error_response(&e)),
    };
    let timeframe = config.timeframe;

    let wanted = (days * timeframe.candles_per_day()) as usize;
    let points = wanted.clamp(2, ctx.settings.backfill_max_points);

    let window = match ctx.provider.fetch_series(&symbol, timeframe, points).await {
        Ok(w) => w,
        Err(e) => {
            warn!(symbol = %symbol, error = %e, "historical fetch failed");
            let err = match e {
                ProviderError::InsufficientData { got } => AppError::InsufficientData {
                    symbol: symbol.clone(),
                    got,
                },
                other => AppError::SourceUnavailable {
                    symbol: symbol.clone(),
                    reason: other.to_string(),
                },
            };
            return Ok(app_error_response(&err));
        }
    };

    let since_ms = now_ms().saturating_sub(days * DAY_MS);
    let events = detect_backfill(&symbol, timeframe, &window, &config.thresholds(), since_ms);

    ok_json(&HistoricalDto {
        symbol,
        days,
        timeframe: timeframe.to_string(),
        total_signals: events.len(),
        signals: events.iter().map(SignalDto::from_event).collect(),
    })
}

pub async fn get_settings(ctx: ApiContext) -> HandlerResult {
    match ctx.store.watch_config().await {
        Ok(cfg) => ok_json(&cfg),
        Err(e) => Ok(app_error_response(&e)),
    }
}

pub async fn update_settings(body: WatchSetUpdate, ctx: ApiContext) -> HandlerResult {
    match ctx.store.update_watch_set(&body.symbols, &body.timeframe).await {
        Ok(cfg) => ok_json(&cfg),
        Err(e) => Ok(app_error_response(&e)),
    }
}

pub async fn toggle_notifications(body: NotificationToggle, ctx: ApiContext) -> HandlerResult {
    match ctx.store.set_notifications_enabled(body.enabled).await {
        Ok(cfg) => ok_json(&cfg),
        Err(e) => Ok(app_error_response(&e)),
    }
}

pub async fn list_subscribers(ctx: ApiContext) -> HandlerResult {
    match ctx.store.subscribers(false).await {
        Ok(subs) => ok_json(
            &subs
                .into_iter()
                .map(SubscriberDto::from)
                .collect::<Vec<_>>(),
        ),
        Err(e) => Ok(app_error_response(&e)),
    }
}

pub async fn register_subscriber(body: SubscriberRegistration, ctx: ApiContext) -> HandlerResult {
    match ctx
        .store
        .upsert_subscriber(body.chat_id, body.username.trim())
        .await
    {
        Ok(()) => {
            info!(chat_id = body.chat_id, "subscriber registered");
            Ok(reply::with_status(
                reply::json(&serde_json::json!({ "chat_id": body.chat_id })),
                StatusCode::CREATED,
            )
            .into_response())
        }
        Err(e) => Ok(app_error_response(&e)),
    }
}

pub async fn set_approval(chat_id: i64, body: ApprovalUpdate, ctx: ApiContext) -> HandlerResult {
    match ctx
        .store
        .set_subscriber_approval(chat_id, body.approved)
        .await
    {
        Ok(true) => {
            info!(chat_id, approved = body.approved, "subscriber approval updated");
            ok_json(&serde_json::json!({ "chat_id": chat_id, "approved": body.approved }))
        }
        Ok(false) => Ok(error_response(
            StatusCode::NOT_FOUND,
            format!("unknown subscriber {chat_id}"),
        )),
        Err(e) => Ok(app_error_response(&e)),
    }
}

pub async fn status(ctx: ApiContext) -> HandlerResult {
    let total_signals = match ctx.store.count_events().await {
        Ok(n) => n,
        Err(e) => return Ok(app_error_response(&e)),
    };
    let last_cycle_ms = ctx.counters.last_cycle_ms();

    ok_json(&StatusDto {
        running: ctx.counters.is_running(),
        last_cycle_ms,
        last_cycle_at: last_cycle_ms.map(ms_to_rfc3339),
        total_signals,
        counters: ctx.counters.snapshot(),
    })
}
