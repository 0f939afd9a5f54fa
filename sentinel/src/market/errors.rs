use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {provider}: {reason}")]
    InvalidResponse {
        provider: &'static str,
        reason: String,
    },

    #[error("{provider} does not list {symbol}")]
    UnsupportedSymbol {
        provider: &'static str,
        symbol: String,
    },

    #[error("{provider} does not serve the {timeframe} interval")]
    UnsupportedTimeframe {
        provider: &'static str,
        timeframe: String,
    },

    #[error("insufficient data: {got} usable points")]
    InsufficientData { got: usize },

    #[error("indicator error: {0}")]
    Indicator(String),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("no provider could supply {symbol}: {reasons}")]
    Unavailable { symbol: String, reasons: String },
}

impl ProviderError {
    pub(crate) fn invalid(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider,
            reason: reason.into(),
        }
    }
}
