//! Multi-timeframe market snapshot: the fetcher's JSON format and the
//! validated, typed view the pipeline consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

use crate::domain::{candle, Candle, CandleError, Timeframe};
use crate::indicators::{IndicatorChain, IndicatorLengths, IndicatorTriple};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown timeframe '{0}'")]
    UnknownTimeframe(String),

    #[error("{timeframe}: {source}")]
    InvalidCandles {
        timeframe: Timeframe,
        #[source]
        source: CandleError,
    },
}

// ── Wire format ──

/// One precomputed indicator reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorReading {
    #[serde(default)]
    pub length: Option<usize>,
    #[serde(default)]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorsWire {
    #[serde(default)]
    pub rsi: Option<IndicatorReading>,
    #[serde(default)]
    pub ema_rsi: Option<IndicatorReading>,
    #[serde(default)]
    pub wma_rsi: Option<IndicatorReading>,
}

impl IndicatorsWire {
    /// The readings as a triple, provided every stated length matches
    /// `lengths`. Readings without a length are accepted as-is.
    pub fn to_triple(&self, lengths: IndicatorLengths) -> Option<IndicatorTriple> {
        let pick = |reading: Option<IndicatorReading>, expected: usize| -> Option<Option<f64>> {
            match reading {
                Some(r) if r.length.is_some_and(|l| l != expected) => None,
                Some(r) => Some(r.value.filter(|v| v.is_finite())),
                None => Some(None),
            }
        };
        Some(IndicatorTriple {
            rsi: pick(self.rsi, lengths.rsi)?,
            ema_of_rsi: pick(self.ema_rsi, lengths.ema)?,
            wma_of_rsi: pick(self.wma_rsi, lengths.wma)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameWire {
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub candles: Vec<Candle>,
    #[serde(default)]
    pub indicators: Option<IndicatorsWire>,
}

/// Snapshot as emitted by the market-data fetcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotWire {
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub generated_at_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timeframes: BTreeMap<String, FrameWire>,
}

// ── Typed snapshot ──

/// Candles of one timeframe, validated, plus any precomputed indicators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSeries {
    pub candles: Vec<Candle>,
    pub precomputed: Option<IndicatorsWire>,
}

impl FrameSeries {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            candles,
            precomputed: None,
        }
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Latest indicator triple: precomputed values when complete and computed
    /// with the chain's lengths, otherwise computed from closes.
    pub fn latest_indicators(&self, chain: &IndicatorChain) -> IndicatorTriple {
        self.precomputed
            .as_ref()
            .and_then(|wire| wire.to_triple(chain.lengths()))
            .filter(IndicatorTriple::is_complete)
            .unwrap_or_else(|| chain.latest(&candle::closes(&self.candles)))
    }
}

/// A frame the conversion refused, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedFrame {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketSnapshot {
    pub exchange: String,
    pub symbol: String,
    pub generated_at: Option<DateTime<Utc>>,
    pub frames: BTreeMap<Timeframe, FrameSeries>,
    pub dropped: Vec<DroppedFrame>,
}

impl MarketSnapshot {
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let wire: SnapshotWire = serde_json::from_str(json)?;
        Ok(Self::from_wire(wire))
    }

    /// Validate every frame. Unknown keys and frames with bad candles are
    /// dropped with a warning rather than failing the snapshot.
    pub fn from_wire(wire: SnapshotWire) -> Self {
        let mut frames = BTreeMap::new();
        let mut dropped = Vec::new();

        for (key, frame) in wire.timeframes {
            match Self::validate_frame(&key, frame) {
                Ok((timeframe, series)) => {
                    frames.insert(timeframe, series);
                }
                Err(err) => {
                    warn!(frame = %key, error = %err, "dropping timeframe");
                    dropped.push(DroppedFrame {
                        key,
                        reason: err.to_string(),
                    });
                }
            }
        }

        Self {
            exchange: wire.exchange,
            symbol: wire.symbol,
            generated_at: wire.generated_at_utc,
            frames,
            dropped,
        }
    }

    fn validate_frame(key: &str, frame: FrameWire) -> Result<(Timeframe, FrameSeries), SnapshotError> {
        let timeframe: Timeframe = key
            .parse()
            .map_err(|_| SnapshotError::UnknownTimeframe(key.to_string()))?;
        candle::validate_series(&frame.candles)
            .map_err(|source| SnapshotError::InvalidCandles { timeframe, source })?;
        Ok((
            timeframe,
            FrameSeries {
                candles: frame.candles,
                precomputed: frame.indicators,
            },
        ))
    }

    pub fn insert(&mut self, timeframe: Timeframe, candles: Vec<Candle>) {
        self.frames.insert(timeframe, FrameSeries::new(candles));
    }

    pub fn frame(&self, timeframe: Timeframe) -> Option<&FrameSeries> {
        self.frames.get(&timeframe)
    }

    pub fn candles(&self, timeframe: Timeframe) -> &[Candle] {
        self.frame(timeframe).map_or(&[], |f| f.candles.as_slice())
    }

    /// Candle series per timeframe, for zone detection.
    pub fn candle_map(&self) -> BTreeMap<Timeframe, Vec<Candle>> {
        self.frames
            .iter()
            .map(|(&tf, frame)| (tf, frame.candles.clone()))
            .collect()
    }

    /// Timeframes that were dropped but name a valid timeframe.
    pub fn dropped_timeframes(&self) -> Vec<Timeframe> {
        self.dropped
            .iter()
            .filter_map(|d| d.key.parse().ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_json() -> &'static str {
        r#"{
            "exchange": "binance",
            "symbol": "BTCUSDT",
            "generated_at_utc": "2026-01-02T00:00:00+00:00",
            "timeframes": {
                "15m": {
                    "interval": "15m",
                    "candles": [
                        {"ts_utc": "2026-01-01T00:00:00+00:00", "open": 100, "high": 101, "low": 99, "close": 100.5, "volume": 3},
                        {"ts_utc": "2026-01-01T00:15:00+00:00", "open": 100.5, "high": 102, "low": 100, "close": 101.5, "volume": 4}
                    ],
                    "indicators": {
                        "rsi": {"length": 14, "value": 35.5},
                        "ema_rsi": {"length": 9, "value": 38.0},
                        "wma_rsi": {"length": 45, "value": 44.0}
                    }
                },
                "1h": {
                    "candles": [
                        {"ts_utc": "2026-01-01T01:00:00+00:00", "open": 100, "high": 101, "low": 99, "close": 100},
                        {"ts_utc": "2026-01-01T00:00:00+00:00", "open": 100, "high": 101, "low": 99, "close": 100}
                    ]
                },
                "2w": {"candles": []}
            }
        }"#
    }

    #[test]
    fn parses_and_validates_frames() {
        let snap = MarketSnapshot::from_json(snapshot_json()).unwrap();
        assert_eq!(snap.symbol, "BTCUSDT");
        assert_eq!(snap.frames.len(), 1);
        assert_eq!(snap.candles(Timeframe::M15).len(), 2);
        assert_eq!(snap.candles(Timeframe::M15)[1].close, 101.5);

        let keys: Vec<&str> = snap.dropped.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["1h", "2w"]);
        assert_eq!(snap.dropped_timeframes(), vec![Timeframe::H1]);
    }

    #[test]
    fn precomputed_indicators_are_preferred() {
        let snap = MarketSnapshot::from_json(snapshot_json()).unwrap();
        let triple = snap
            .frame(Timeframe::M15)
            .unwrap()
            .latest_indicators(&IndicatorChain::default());
        assert_eq!(triple, IndicatorTriple::new(35.5, 38.0, 44.0));
    }

    #[test]
    fn mismatched_lengths_fall_back_to_computation() {
        let wire = IndicatorsWire {
            rsi: Some(IndicatorReading {
                length: Some(7),
                value: Some(40.0),
            }),
            ..IndicatorsWire::default()
        };
        assert!(wire.to_triple(IndicatorLengths::default()).is_none());

        let series = FrameSeries {
            candles: Vec::new(),
            precomputed: Some(wire),
        };
        // No candles to compute from
        assert_eq!(
            series.latest_indicators(&IndicatorChain::default()),
            IndicatorTriple::default()
        );
    }

    #[test]
    fn null_values_read_as_absent() {
        let wire: IndicatorsWire =
            serde_json::from_str(r#"{"rsi": {"length": 14, "value": null}}"#).unwrap();
        let triple = wire.to_triple(IndicatorLengths::default()).unwrap();
        assert_eq!(triple, IndicatorTriple::default());
    }

    #[test]
    fn garbage_is_a_json_error() {
        assert!(matches!(
            MarketSnapshot::from_json("not json"),
            Err(SnapshotError::Json(_))
        ));
    }
}
