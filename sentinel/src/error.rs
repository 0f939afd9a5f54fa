use thiserror::Error;

/// Failure taxonomy of the analysis service.
///
/// Every variant is contained to the symbol (or cycle) that produced it;
/// none of them is allowed to stop the worker loop.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("source unavailable for {symbol}: {reason}")]
    SourceUnavailable { symbol: String, reason: String },

    #[error("insufficient data for {symbol}: got {got} usable points")]
    InsufficientData { symbol: String, got: usize },

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("dispatch failure for recipient {recipient}: {reason}")]
    Dispatch { recipient: i64, reason: String },

    #[error("invalid configuration: {0}")]
    ConfigValidation(String),
}

impl AppError {
    pub fn persistence(err: anyhow::Error) -> Self {
        // `{:#}` keeps the whole context chain on one line.
        Self::Persistence(format!("{err:#}"))
    }
}
