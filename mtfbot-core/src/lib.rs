//! mtfbot core: multi-timeframe analysis and the position decision state machine.
//!
//! - Domain types (candles, timeframes, positions, account state)
//! - Indicator Engine: RSI, EMA(RSI), WMA(RSI)
//! - Pivot Detector and Zone Clusterer for support/resistance
//! - Trend Classifier with midline and band rules
//! - Decision State Machine (OPEN / CLOSE / HOLD / NOOP)
//! - Snapshot model and the in-process pipeline tying the stages together
//!
//! Nothing in this crate performs I/O. State is passed in and returned.

pub mod crossover;
pub mod decision;
pub mod domain;
pub mod fingerprint;
pub mod indicators;
pub mod pipeline;
pub mod pivots;
pub mod snapshot;
pub mod trend;
pub mod zones;

#[cfg(test)]
mod test_support;
