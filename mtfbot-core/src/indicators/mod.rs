//! Indicator Engine: RSI, EMA and WMA, plus the RSI → EMA/WMA chain.
//!
//! Indicators are pure functions: numeric series in, series of the same length
//! out. Values before warm-up are `None` rather than NaN so that "not yet
//! computed" can never leak into a comparison.

pub mod chain;
pub mod ema;
pub mod rsi;
pub mod wma;

pub use chain::{forward_fill, IndicatorChain, IndicatorLengths, IndicatorTriple};
pub use ema::{ema_of_series, Ema};
pub use rsi::Rsi;
pub use wma::{wma_of_series, Wma};

/// Trait for single-series indicators.
///
/// `compute` returns a vector of the same length as `values`; the first
/// `lookback()` entries are `None`.
///
/// # Look-ahead contamination guard
/// No output at index t may depend on input at t+1 or later.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "rsi_14", "wma_45").
    fn name(&self) -> &str;

    /// Number of leading indices without output.
    fn lookback(&self) -> usize;

    fn compute(&self, values: &[f64]) -> Vec<Option<f64>>;
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
