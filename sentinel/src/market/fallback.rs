use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::market::errors::ProviderError;
use crate::market::SeriesProvider;
use crate::signal::model::{SeriesWindow, Timeframe};

/// Tries providers in order; first success wins.
///
/// A per-symbol priority replaces the chain for that symbol: only the named
/// providers are tried, in the given order. Names with no configured
/// provider are ignored.
pub struct FallbackProvider {
    chain: Vec<Arc<dyn SeriesProvider>>,
    priority: HashMap<String, Vec<String>>,
}

impl FallbackProvider {
    pub fn new(chain: Vec<Arc<dyn SeriesProvider>>) -> Self {
        Self {
            chain,
            priority: HashMap::new(),
        }
    }

    pub fn with_priority<S: AsRef<str>>(mut self, symbol: &str, order: &[S]) -> Self {
        self.priority.insert(
            symbol.to_string(),
            order.iter().map(|s| s.as_ref().to_string()).collect(),
        );
        self
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.chain.iter().map(|p| p.name())
    }

    fn ordered_for(&self, symbol: &str) -> Vec<&Arc<dyn SeriesProvider>> {
        let Some(order) = self.priority.get(symbol) else {
            return self.chain.iter().collect();
        };

        order
            .iter()
            .filter_map(|name| self.chain.iter().find(|p| p.name() == name.as_str()))
            .collect()
    }
}

#[async_trait]
impl SeriesProvider for FallbackProvider {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn fetch_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        min_points: usize,
    ) -> Result<SeriesWindow, ProviderError> {
        let mut reasons = Vec::new();

        for provider in self.ordered_for(symbol) {
            match provider.fetch_series(symbol, timeframe, min_points).await {
                Ok(window) => {
                    debug!(provider = provider.name(), symbol, "series fetched");
                    return Ok(window);
                }
                Err(e) => {
                    warn!(provider = provider.name(), symbol, error = %e, "provider failed, trying next");
                    reasons.push(format!("{}: {e}", provider.name()));
                }
            }
        }

        Err(ProviderError::Unavailable {
            symbol: symbol.to_string(),
            reasons: if reasons.is_empty() {
                "no providers configured".to_string()
            } else {
                reasons.join("; ")
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::model::OscillatorPoint;
    use parking_lot::Mutex;
    use rust_decimal::Decimal;

    struct Fixed {
        name: &'static str,
        ok: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl SeriesProvider for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch_series(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            _min_points: usize,
        ) -> Result<SeriesWindow, ProviderError> {
            self.log.lock().push(self.name);
            if !self.ok {
                return Err(ProviderError::invalid("fixed", "down"));
            }
            let point = |ts_ms, oscillator| OscillatorPoint {
                ts_ms,
                close: Decimal::ONE,
                oscillator,
            };
            Ok(SeriesWindow::new(vec![point(1, 40.0), point(2, 41.0)]).unwrap())
        }
    }

    fn fixed(name: &'static str, ok: bool, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn SeriesProvider> {
        Arc::new(Fixed {
            name,
            ok,
            log: log.clone(),
        })
    }

    #[tokio::test]
    async fn falls_through_to_next_provider() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let p = FallbackProvider::new(vec![fixed("a", false, &log), fixed("b", true, &log)]);

        let w = p.fetch_series("BTCUSDT", Timeframe::M5, 2).await.unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn all_failing_reports_every_reason() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let p = FallbackProvider::new(vec![fixed("a", false, &log), fixed("b", false, &log)]);

        let err = p.fetch_series("BTCUSDT", Timeframe::M5, 2).await.unwrap_err();
        match err {
            ProviderError::Unavailable { symbol, reasons } => {
                assert_eq!(symbol, "BTCUSDT");
                assert!(reasons.contains("a:") && reasons.contains("b:"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn symbol_priority_reorders_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let p = FallbackProvider::new(vec![fixed("a", true, &log), fixed("b", true, &log)])
            .with_priority("ETHUSDT", &["b"]);

        p.fetch_series("ETHUSDT", Timeframe::M5, 2).await.unwrap();
        p.fetch_series("BTCUSDT", Timeframe::M5, 2).await.unwrap();
        assert_eq!(*log.lock(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn symbol_priority_skips_unnamed_providers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let p = FallbackProvider::new(vec![
            fixed("a", true, &log),
            fixed("b", false, &log),
            fixed("c", true, &log),
        ])
        .with_priority("WLDUSDT", &["b", "c", "missing"]);

        p.fetch_series("WLDUSDT", Timeframe::M5, 2).await.unwrap();
        assert_eq!(*log.lock(), vec!["b", "c"]);

        log.lock().clear();
        let p = p.with_priority("WLDUSDT", &["b"]);
        assert!(p.fetch_series("WLDUSDT", Timeframe::M5, 2).await.is_err());
        assert_eq!(*log.lock(), vec!["b"]);
    }

    #[tokio::test]
    async fn empty_chain_is_unavailable() {
        let p = FallbackProvider::new(Vec::new());
        assert!(matches!(
            p.fetch_series("BTCUSDT", Timeframe::M5, 2).await,
            Err(ProviderError::Unavailable { .. })
        ));
    }
}
