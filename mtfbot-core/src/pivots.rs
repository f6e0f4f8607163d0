//! Pivot Detector: fractal highs and lows over a symmetric neighbour window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Candle;

/// Neighbour window around a pivot candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotWindow {
    pub left: usize,
    pub right: usize,
}

impl PivotWindow {
    pub const fn symmetric(k: usize) -> Self {
        Self { left: k, right: k }
    }

    /// Shortest series that can contain a pivot.
    pub fn span(&self) -> usize {
        self.left + self.right + 1
    }
}

impl Default for PivotWindow {
    fn default() -> Self {
        Self::symmetric(4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotKind {
    High,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub index: usize,
    pub price: f64,
    #[serde(rename = "ts_utc")]
    pub timestamp: DateTime<Utc>,
}

/// `values[i]` must beat every neighbour in `[i-left, i+right]`; indices
/// outside the series are skipped.
fn is_pivot(values: &[f64], i: usize, left: usize, right: usize, beats: fn(f64, f64) -> bool) -> bool {
    let Some(&pivot) = values.get(i) else {
        return false;
    };
    let start = i.saturating_sub(left);
    let end = (i + right).min(values.len().saturating_sub(1));
    (start..=end)
        .filter(|&j| j != i)
        .all(|j| beats(pivot, values[j]))
}

/// True iff `highs[i]` is strictly greater than every neighbour in the window.
pub fn is_pivot_high(highs: &[f64], i: usize, left: usize, right: usize) -> bool {
    is_pivot(highs, i, left, right, |p, v| p > v)
}

/// True iff `lows[i]` is strictly less than every neighbour in the window.
pub fn is_pivot_low(lows: &[f64], i: usize, left: usize, right: usize) -> bool {
    is_pivot(lows, i, left, right, |p, v| p < v)
}

/// Pivots of one series, each list ordered by index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pivots {
    pub highs: Vec<Pivot>,
    pub lows: Vec<Pivot>,
}

impl Pivots {
    pub fn of_kind(&self, kind: PivotKind) -> &[Pivot] {
        match kind {
            PivotKind::High => &self.highs,
            PivotKind::Low => &self.lows,
        }
    }

    /// Lowest pivot high strictly above `price`; earliest wins ties.
    pub fn nearest_high_above(&self, price: f64) -> Option<&Pivot> {
        self.highs
            .iter()
            .filter(|p| p.price > price)
            .min_by(|a, b| a.price.total_cmp(&b.price))
    }

    /// Highest pivot low strictly below `price`; earliest wins ties.
    pub fn nearest_low_below(&self, price: f64) -> Option<&Pivot> {
        self.lows
            .iter()
            .filter(|p| p.price < price)
            .min_by(|a, b| b.price.total_cmp(&a.price))
    }
}

/// Scan `candles` for pivots.
///
/// Only indices with a full window on both sides are candidates, so a series
/// shorter than `left + right + 1` yields nothing.
pub fn detect_pivots(candles: &[Candle], window: PivotWindow) -> Pivots {
    let mut pivots = Pivots::default();
    if candles.len() < window.span() {
        return pivots;
    }

    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();

    for i in window.left..candles.len() - window.right {
        if is_pivot_high(&highs, i, window.left, window.right) {
            pivots.highs.push(Pivot {
                index: i,
                price: highs[i],
                timestamp: candles[i].timestamp,
            });
        }
        if is_pivot_low(&lows, i, window.left, window.right) {
            pivots.lows.push(Pivot {
                index: i,
                price: lows[i],
                timestamp: candles[i].timestamp,
            });
        }
    }

    pivots
}
