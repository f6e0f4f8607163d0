//! Persisted account state owned by the decision state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Position;

pub const DEFAULT_BALANCE: f64 = 1000.0;
pub const DEFAULT_RISK_PCT: f64 = 1.0;

/// Account snapshot loaded before a cycle and saved after it.
///
/// At most one open position (no hedging). Missing fields in a persisted file
/// fall back to the defaults, so a partially written state still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountState {
    #[serde(alias = "balance_usdt")]
    pub balance: f64,
    pub risk_pct: f64,
    pub position: Option<Position>,
    #[serde(rename = "last_candle_ts_utc")]
    pub last_processed_candle: Option<DateTime<Utc>>,
}

impl Default for AccountState {
    fn default() -> Self {
        Self {
            balance: DEFAULT_BALANCE,
            risk_pct: DEFAULT_RISK_PCT,
            position: None,
            last_processed_candle: None,
        }
    }
}

impl AccountState {
    pub fn with_balance(balance: f64, risk_pct: f64) -> Self {
        Self {
            balance,
            risk_pct,
            ..Self::default()
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Quote-currency amount risked per trade.
    pub fn risk_amount(&self) -> f64 {
        self.balance * self.risk_pct / 100.0
    }

    /// A candle at or before the last processed one must not be evaluated again.
    pub fn has_processed(&self, candle_ts: DateTime<Utc>) -> bool {
        self.last_processed_candle
            .is_some_and(|last| candle_ts <= last)
    }
}
