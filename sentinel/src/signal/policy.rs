use super::model::{CrossingEvent, WatchConfig};

/// Whether a persisted event should be forwarded to dispatch.
///
/// Only zone entries alert; exits are kept for history.
pub fn should_notify(event: &CrossingEvent, config: &WatchConfig) -> bool {
    config.notifications_enabled && event.kind.is_entry()
}
