//! Relative Strength Index (RSI).
//!
//! Wilder smoothing of average gains and average losses.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period (first value at index `period`).
//! Edge case: avg_loss == 0 → RSI = 100, including the no-movement case.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let n = closes.len();
        let mut result = vec![None; n];

        if n <= self.period {
            return result;
        }

        // Seed: simple means over the first `period` changes
        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for i in 1..=self.period {
            let change = closes[i] - closes[i - 1];
            if !change.is_finite() {
                return result;
            }
            avg_gain += change.max(0.0);
            avg_loss += (-change).max(0.0);
        }
        let len = self.period as f64;
        avg_gain /= len;
        avg_loss /= len;

        result[self.period] = Some(compute_rsi(avg_gain, avg_loss));

        for i in (self.period + 1)..n {
            let change = closes[i] - closes[i - 1];
            if !change.is_finite() {
                // Broken input taints everything after it
                return result;
            }
            avg_gain = (avg_gain * (len - 1.0) + change.max(0.0)) / len;
            avg_loss = (avg_loss * (len - 1.0) + (-change).max(0.0)) / len;
            result[i] = Some(compute_rsi(avg_gain, avg_loss));
        }

        result
    }
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}
