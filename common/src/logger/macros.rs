use tracing::{Span, field};

use super::TraceId;

/// Root span for a cycle or request. `symbol` and `timeframe` start empty
/// and are recorded by whoever narrows the work down.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = %trace_id,
        symbol = field::Empty,
        timeframe = field::Empty
    )
}
