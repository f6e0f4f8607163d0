//! EMA/WMA crossover alert on a single timeframe's closes.
//!
//! Independent of the position state machine: it only says whether the last
//! bar completed a filtered crossover.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{candle, Candle, Timeframe};
use crate::indicators::{Ema, Indicator, Rsi, Wma};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverConfig {
    pub timeframe: Timeframe,
    pub rsi: usize,
    pub ema: usize,
    pub wma: usize,
    /// BUY only while RSI is at or below this.
    pub rsi_buy_max: f64,
    /// SELL only while RSI is at or above this.
    pub rsi_sell_min: f64,
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::M15,
            rsi: 14,
            ema: 9,
            wma: 45,
            rsi_buy_max: 60.0,
            rsi_sell_min: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy,
    Sell,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossoverSignal {
    pub signal: Signal,
    pub reason: String,
    #[serde(rename = "tf")]
    pub timeframe: Timeframe,
    pub ts_utc: Option<DateTime<Utc>>,
    pub close: Option<f64>,
    pub rsi: Option<f64>,
    pub ema: Option<f64>,
    pub wma: Option<f64>,
    pub rsi_buy_max: f64,
    pub rsi_sell_min: f64,
}

/// Evaluate the last bar of `candles`.
pub fn crossover_signal(candles: &[Candle], config: &CrossoverConfig) -> CrossoverSignal {
    let closes = candle::closes(candles);
    let ema = Ema::new(config.ema).compute(&closes);
    let wma = Wma::new(config.wma).compute(&closes);
    let rsi = Rsi::new(config.rsi).compute(&closes);

    let last = closes.len().checked_sub(1);
    let at = |series: &[Option<f64>], i: Option<usize>| i.and_then(|i| series.get(i).copied().flatten());

    let mut out = CrossoverSignal {
        signal: Signal::None,
        reason: String::new(),
        timeframe: config.timeframe,
        ts_utc: candles.last().map(|c| c.timestamp),
        close: candles.last().map(|c| c.close),
        rsi: at(&rsi, last),
        ema: at(&ema, last),
        wma: at(&wma, last),
        rsi_buy_max: config.rsi_buy_max,
        rsi_sell_min: config.rsi_sell_min,
    };

    let prev = last.and_then(|i| i.checked_sub(1));
    let (Some(ema_prev), Some(wma_prev), Some(ema_now), Some(wma_now)) =
        (at(&ema, prev), at(&wma, prev), out.ema, out.wma)
    else {
        out.reason = "not_enough_data".into();
        return out;
    };
    let Some(rsi_now) = out.rsi else {
        out.reason = "rsi_not_ready".into();
        return out;
    };

    let cross_up = ema_prev <= wma_prev && ema_now > wma_now;
    let cross_down = ema_prev >= wma_prev && ema_now < wma_now;

    (out.signal, out.reason) = if cross_up && rsi_now <= config.rsi_buy_max {
        (
            Signal::Buy,
            format!(
                "ema{}_cross_up_wma{}_and_rsi<={}",
                config.ema, config.wma, config.rsi_buy_max
            ),
        )
    } else if cross_down && rsi_now >= config.rsi_sell_min {
        (
            Signal::Sell,
            format!(
                "ema{}_cross_down_wma{}_and_rsi>={}",
                config.ema, config.wma, config.rsi_sell_min
            ),
        )
    } else if cross_up || cross_down {
        (Signal::None, "filters_blocked_signal".into())
    } else {
        (Signal::None, "no_cross".into())
    };
    out
}
