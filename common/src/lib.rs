pub mod logger;

pub use logger::{TraceId, init_logger, root_span, warn_if_slow};
