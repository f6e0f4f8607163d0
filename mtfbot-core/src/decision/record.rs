//! Journal row emitted for every OPEN and CLOSE.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{AccountState, Side, Timeframe};
use crate::indicators::IndicatorTriple;
use crate::trend::{Bias, TrendReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Open,
    Close,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Open => "OPEN",
            Action::Close => "CLOSE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One journal row. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub event_id: String,
    pub event_ts_utc: DateTime<Utc>,
    pub symbol: String,
    pub action: Action,
    pub side: Option<Side>,
    pub tf_manage: Timeframe,
    pub entry: Option<f64>,
    pub sl: Option<f64>,
    pub size: Option<f64>,
    pub balance: f64,
    pub risk_pct: f64,
    pub risk_amount: f64,
    pub rsi: Option<f64>,
    pub ema_rsi: Option<f64>,
    pub wma_rsi: Option<f64>,
    pub bias_15m: Option<Bias>,
    pub bias_1h: Option<Bias>,
    pub bias_4h: Option<Bias>,
    pub bias_1d: Option<Bias>,
    pub candle_ts_utc: DateTime<Utc>,
    pub rules_hash: String,
    pub notes: String,
}

/// Event id: the candle timestamp joined to the action, e.g.
/// `2026-01-31T06:00:00+00:00_OPEN`.
pub fn event_id(candle_ts: DateTime<Utc>, action: Action) -> String {
    format!(
        "{}_{}",
        candle_ts.to_rfc3339_opts(SecondsFormat::Secs, false),
        action
    )
}

impl DecisionRecord {
    /// Row with account, identity and timing filled in; trade fields empty.
    pub fn new(
        action: Action,
        symbol: &str,
        tf_manage: Timeframe,
        candle_ts: DateTime<Utc>,
        state: &AccountState,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: event_id(candle_ts, action),
            event_ts_utc: now,
            symbol: symbol.to_string(),
            action,
            side: None,
            tf_manage,
            entry: None,
            sl: None,
            size: None,
            balance: state.balance,
            risk_pct: state.risk_pct,
            risk_amount: state.risk_amount(),
            rsi: None,
            ema_rsi: None,
            wma_rsi: None,
            bias_15m: None,
            bias_1h: None,
            bias_4h: None,
            bias_1d: None,
            candle_ts_utc: candle_ts,
            rules_hash: String::new(),
            notes: String::new(),
        }
    }

    pub fn with_trade(mut self, side: Side, entry: f64, sl: f64, size: f64) -> Self {
        self.side = Some(side);
        self.entry = Some(entry);
        self.sl = Some(sl);
        self.size = Some(size);
        self
    }

    pub fn with_indicators(mut self, triple: &IndicatorTriple) -> Self {
        self.rsi = triple.rsi;
        self.ema_rsi = triple.ema_of_rsi;
        self.wma_rsi = triple.wma_of_rsi;
        self
    }

    /// Biases of the four journaled frames; frames without a label stay empty.
    pub fn with_biases(mut self, trend: &TrendReport) -> Self {
        let bias = |tf| trend.label(tf).map(|l| l.bias);
        self.bias_15m = bias(Timeframe::M15);
        self.bias_1h = bias(Timeframe::H1);
        self.bias_4h = bias(Timeframe::H4);
        self.bias_1d = bias(Timeframe::D1);
        self
    }

    pub fn with_rules_hash(mut self, rules_hash: &str) -> Self {
        self.rules_hash = rules_hash.to_string();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}
