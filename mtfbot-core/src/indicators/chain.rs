//! RSI → EMA(RSI) / WMA(RSI) chain.
//!
//! The RSI series is forward-filled before smoothing (missing values replaced by
//! the most recent RSI, 50.0 before any RSI exists) so EMA and WMA see a
//! continuous series.

use serde::{Deserialize, Serialize};

use super::{ema_of_series, wma_of_series, Indicator, Rsi};

/// Value used for forward-fill before the first RSI exists.
pub const RSI_NEUTRAL: f64 = 50.0;

/// Lengths of the three chained indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorLengths {
    pub rsi: usize,
    pub ema: usize,
    pub wma: usize,
}

impl Default for IndicatorLengths {
    fn default() -> Self {
        Self {
            rsi: 14,
            ema: 9,
            wma: 45,
        }
    }
}

/// RSI with its EMA and WMA at one candle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorTriple {
    pub rsi: Option<f64>,
    #[serde(rename = "ema_rsi")]
    pub ema_of_rsi: Option<f64>,
    #[serde(rename = "wma_rsi")]
    pub wma_of_rsi: Option<f64>,
}

impl IndicatorTriple {
    pub fn new(rsi: f64, ema_of_rsi: f64, wma_of_rsi: f64) -> Self {
        Self {
            rsi: Some(rsi),
            ema_of_rsi: Some(ema_of_rsi),
            wma_of_rsi: Some(wma_of_rsi),
        }
    }

    /// All three values, if all are present and finite.
    pub fn values(&self) -> Option<(f64, f64, f64)> {
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        Some((
            finite(self.rsi)?,
            finite(self.ema_of_rsi)?,
            finite(self.wma_of_rsi)?,
        ))
    }

    pub fn is_complete(&self) -> bool {
        self.values().is_some()
    }
}

/// Replace `None` with the most recent present value, `initial` before any.
pub fn forward_fill(series: &[Option<f64>], initial: f64) -> Vec<f64> {
    let mut last = initial;
    series
        .iter()
        .map(|v| {
            if let Some(v) = v {
                last = *v;
            }
            last
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct IndicatorChain {
    lengths: IndicatorLengths,
    rsi: Rsi,
}

impl IndicatorChain {
    pub fn new(lengths: IndicatorLengths) -> Self {
        assert!(
            lengths.ema >= 1 && lengths.wma >= 1,
            "EMA/WMA lengths must be >= 1"
        );
        Self {
            rsi: Rsi::new(lengths.rsi),
            lengths,
        }
    }

    pub fn lengths(&self) -> IndicatorLengths {
        self.lengths
    }

    /// Minimum number of closes before every member of the triple is present.
    pub fn warmup(&self) -> usize {
        (self.lengths.rsi + 1).max(self.lengths.wma).max(self.lengths.ema)
    }

    /// One triple per close.
    pub fn compute(&self, closes: &[f64]) -> Vec<IndicatorTriple> {
        let rsi = self.rsi.compute(closes);
        let filled: Vec<Option<f64>> = forward_fill(&rsi, RSI_NEUTRAL)
            .into_iter()
            .map(Some)
            .collect();
        let ema = ema_of_series(&filled, self.lengths.ema);
        let wma = wma_of_series(&filled, self.lengths.wma);

        rsi.into_iter()
            .zip(ema)
            .zip(wma)
            .map(|((rsi, ema_of_rsi), wma_of_rsi)| IndicatorTriple {
                rsi,
                ema_of_rsi,
                wma_of_rsi,
            })
            .collect()
    }

    /// Triple at the last close, or an empty triple for an empty series.
    pub fn latest(&self, closes: &[f64]) -> IndicatorTriple {
        self.compute(closes).last().copied().unwrap_or_default()
    }
}

impl Default for IndicatorChain {
    fn default() -> Self {
        Self::new(IndicatorLengths::default())
    }
}
