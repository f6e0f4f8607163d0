//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = k * x[t] + (1 - k) * EMA[t-1], k = 2 / (period + 1)
//! Seed: simple mean of the first `period` present values.
//! Lookback: period - 1 on a gap-free series.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, values: &[f64]) -> Vec<Option<f64>> {
        let wrapped: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
        ema_of_series(&wrapped, self.period)
    }
}

/// EMA over a series with gaps.
///
/// Absent (or non-finite) inputs produce absent outputs but do not reset the
/// recurrence: once seeded, the next present input continues from the last
/// valid EMA value.
pub fn ema_of_series(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if period == 0 {
        return result;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut seed_sum = 0.0;
    let mut seed_count = 0;
    let mut prev: Option<f64> = None;

    for (i, value) in values.iter().enumerate() {
        let Some(v) = value.filter(|v| v.is_finite()) else {
            continue;
        };
        match prev {
            None => {
                seed_sum += v;
                seed_count += 1;
                if seed_count == period {
                    let seed = seed_sum / period as f64;
                    prev = Some(seed);
                    result[i] = Some(seed);
                }
            }
            Some(p) => {
                let ema = alpha * v + (1.0 - alpha) * p;
                prev = Some(ema);
                result[i] = Some(ema);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn ema_period_1_equals_input() {
        let result = Ema::new(1).compute(&[100.0, 200.0, 300.0]);
        assert_eq!(result, vec![Some(100.0), Some(200.0), Some(300.0)]);
    }

    #[test]
    fn ema_3_known_values() {
        // alpha = 0.5, seed at index 2: mean(10,11,12) = 11
        // EMA[3] = 0.5*13 + 0.5*11 = 12, EMA[4] = 0.5*14 + 0.5*12 = 13
        let result = Ema::new(3).compute(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        assert!(result[0].is_none());
        assert!(result[1].is_none());
        assert_approx(result[2].unwrap(), 11.0, DEFAULT_EPSILON);
        assert_approx(result[3].unwrap(), 12.0, DEFAULT_EPSILON);
        assert_approx(result[4].unwrap(), 13.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_shorter_than_period_is_absent() {
        assert!(Ema::new(9).compute(&[1.0; 8]).iter().all(Option::is_none));
    }

    #[test]
    fn ema_gap_does_not_reset_recurrence() {
        // Seed 11 at index 2, gap at 3, index 4 continues from 11: 0.5*14 + 0.5*11
        let series = [Some(10.0), Some(11.0), Some(12.0), None, Some(14.0)];
        let result = ema_of_series(&series, 3);
        assert_approx(result[2].unwrap(), 11.0, DEFAULT_EPSILON);
        assert!(result[3].is_none());
        assert_approx(result[4].unwrap(), 12.5, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_seed_skips_leading_gaps() {
        let series = [None, None, Some(2.0), Some(4.0), Some(6.0)];
        let result = ema_of_series(&series, 2);
        assert!(result[2].is_none());
        assert_approx(result[3].unwrap(), 3.0, DEFAULT_EPSILON);
        // alpha = 2/3: 2/3*6 + 1/3*3 = 5
        assert_approx(result[4].unwrap(), 5.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_lookback() {
        assert_eq!(Ema::new(9).lookback(), 8);
        assert_eq!(Ema::new(1).lookback(), 0);
    }
}
