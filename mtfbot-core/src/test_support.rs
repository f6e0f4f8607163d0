//! Candle builders shared by unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::domain::Candle;

/// Timestamp of the i-th 15-minute candle from a fixed origin.
pub fn ts(i: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(15 * i as i64)
}

/// Candles from (high, low) pairs; open and close sit at the midpoint.
pub fn candles_from_hl(hl: &[(f64, f64)]) -> Vec<Candle> {
    hl.iter()
        .enumerate()
        .map(|(i, &(high, low))| {
            let mid = (high + low) / 2.0;
            Candle {
                timestamp: ts(i),
                open: mid,
                high,
                low,
                close: mid,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Plausible OHLCV from closes: open = previous close,
/// high = max(open, close) + 1, low = min(open, close) - 1.
pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: ts(i),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}
