use chrono::{DateTime, SecondsFormat, Utc};

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// ISO-8601 / RFC 3339 rendering of an epoch-millisecond instant.
pub fn ms_to_rfc3339(ts_ms: u64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ts_ms as i64) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => ts_ms.to_string(),
    }
}
