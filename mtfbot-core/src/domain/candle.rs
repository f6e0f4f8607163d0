//! Candle, the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV candle for one instrument on one timeframe.
///
/// `timestamp` is the candle open time in UTC. The wire name `ts_utc` matches
/// the snapshot format produced by the market-data fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(rename = "ts_utc")]
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

/// Why a candle series was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandleError {
    #[error("candle {index} has non-positive or non-finite prices")]
    InvalidPrice { index: usize },

    #[error("candle {index} is not after its predecessor ({timestamp})")]
    OutOfOrder {
        index: usize,
        timestamp: DateTime<Utc>,
    },
}

impl Candle {
    /// All prices finite and strictly positive.
    pub fn has_valid_prices(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
    }
}

/// Check that a series is strictly ascending by timestamp with valid prices.
///
/// Duplicate timestamps count as out of order.
pub fn validate_series(candles: &[Candle]) -> Result<(), CandleError> {
    for (index, candle) in candles.iter().enumerate() {
        if !candle.has_valid_prices() {
            return Err(CandleError::InvalidPrice { index });
        }
        if index > 0 && candle.timestamp <= candles[index - 1].timestamp {
            return Err(CandleError::OutOfOrder {
                index,
                timestamp: candle.timestamp,
            });
        }
    }
    Ok(())
}

/// Extract closing prices.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(ts_min: i64, close: f64) -> Candle {
        Candle {
            timestamp: Utc.timestamp_opt(1_700_000_000 + ts_min * 60, 0).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn valid_series_passes() {
        let series = vec![sample(0, 100.0), sample(15, 101.0), sample(30, 99.0)];
        assert!(validate_series(&series).is_ok());
    }

    #[test]
    fn duplicate_timestamp_rejected() {
        let series = vec![sample(0, 100.0), sample(0, 101.0)];
        assert_eq!(
            validate_series(&series),
            Err(CandleError::OutOfOrder {
                index: 1,
                timestamp: series[1].timestamp
            })
        );
    }

    #[test]
    fn non_positive_price_rejected() {
        let mut bad = sample(15, 100.0);
        bad.low = 0.0;
        let series = vec![sample(0, 100.0), bad];
        assert_eq!(
            validate_series(&series),
            Err(CandleError::InvalidPrice { index: 1 })
        );
    }

    #[test]
    fn deserializes_snapshot_wire_format() {
        let json = r#"{"ts_utc":"2026-01-31T06:00:00+00:00","open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":3.0}"#;
        let candle: Candle = serde_json::from_str(json).unwrap();
        assert_eq!(candle.timestamp, Utc.with_ymd_and_hms(2026, 1, 31, 6, 0, 0).unwrap());
        assert_eq!(candle.close, 1.5);
        assert!(candle.has_valid_prices());
    }
}
