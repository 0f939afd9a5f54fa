use crate::signal::model::{CrossingEvent, Timeframe};

const TRADINGVIEW_CHART: &str = "https://www.tradingview.com/chart/";

/// `BTC ↓` followed by a chart link.
pub fn alert_text(event: &CrossingEvent) -> String {
    let arrow = if event.kind.is_oversold() { '↓' } else { '↑' };
    let base = event
        .symbol
        .strip_suffix("USDT")
        .unwrap_or(&event.symbol);

    format!(
        "{base} {arrow}\n\n📊 [Open on TradingView]({})",
        tradingview_url(&event.symbol, event.timeframe)
    )
}

pub fn tradingview_url(symbol: &str, timeframe: Timeframe) -> String {
    let base = symbol.strip_suffix("USDT").unwrap_or(symbol);
    format!(
        "{TRADINGVIEW_CHART}?symbol=BINANCE:{base}USD&interval={}",
        tradingview_interval(timeframe)
    )
}

fn tradingview_interval(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::M1 => "1",
        Timeframe::M3 => "3",
        Timeframe::M5 => "5",
        Timeframe::M15 => "15",
        Timeframe::M30 => "30",
        Timeframe::H1 => "60",
        Timeframe::H2 => "120",
        Timeframe::H4 => "240",
        Timeframe::H6 => "360",
        Timeframe::H8 => "480",
        Timeframe::H12 => "720",
        Timeframe::D1 => "D",
    }
}
