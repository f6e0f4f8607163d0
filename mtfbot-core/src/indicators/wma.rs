//! Weighted Moving Average (WMA).
//!
//! Linearly increasing weights 1..=period, newest value heaviest.
//! WMA[t] = sum(w_j * x[t-period+j]) / (period * (period + 1) / 2)
//! Requires a full window of present values.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Wma {
    period: usize,
    name: String,
}

impl Wma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "WMA period must be >= 1");
        Self {
            period,
            name: format!("wma_{period}"),
        }
    }
}

impl Indicator for Wma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, values: &[f64]) -> Vec<Option<f64>> {
        let wrapped: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
        wma_of_series(&wrapped, self.period)
    }
}

/// WMA over a series with gaps; any absent value in the window yields `None`.
pub fn wma_of_series(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let mut result = vec![None; n];
    if period == 0 || n < period {
        return result;
    }

    let denom = (period * (period + 1)) as f64 / 2.0;

    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        let mut acc = 0.0;
        let mut complete = true;
        for (j, value) in window.iter().enumerate() {
            match value {
                Some(v) if v.is_finite() => acc += (j + 1) as f64 * v,
                _ => {
                    complete = false;
                    break;
                }
            }
        }
        if complete {
            result[i] = Some(acc / denom);
        }
    }

    result
}
