//! Bot configuration loaded from TOML.
//!
//! Every section defaults, so an empty file (or no file at all) reproduces the
//! reference rule set: BTCUSDT on Binance, RSI 14 / EMA 9 / WMA 45, 40/60 band,
//! short entries on the 15m frame with a 20-point stop buffer.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use mtfbot_core::crossover::CrossoverConfig;
use mtfbot_core::decision::DecisionConfig;
use mtfbot_core::domain::account::{DEFAULT_BALANCE, DEFAULT_RISK_PCT};
use mtfbot_core::domain::{AccountState, Timeframe};
use mtfbot_core::fingerprint::StrategyConfig;
use mtfbot_core::indicators::IndicatorLengths;
use mtfbot_core::trend::TrendRules;
use mtfbot_core::zones::ZoneConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub exchange: String,
    pub symbol: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            exchange: "binance".into(),
            symbol: "BTCUSDT".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Persisted `AccountState` (JSON).
    pub state: PathBuf,
    /// Append-only decision journal (CSV).
    pub journal: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state: PathBuf::from("trading/state_15m.json"),
            journal: PathBuf::from("trading/trades_15m.csv"),
        }
    }
}

/// Account values used when no state file exists yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub balance: f64,
    pub risk_pct: f64,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            balance: DEFAULT_BALANCE,
            risk_pct: DEFAULT_RISK_PCT,
        }
    }
}

impl AccountConfig {
    pub fn initial_state(&self) -> AccountState {
        AccountState::with_balance(self.balance, self.risk_pct)
    }
}

/// Candles of recent history per frame included in the context report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryLimit {
    pub timeframe: Timeframe,
    pub candles: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub history: Vec<HistoryLimit>,
    /// Frames searched for stop-loss and take-profit levels.
    pub level_timeframes: Vec<Timeframe>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        let limit = |timeframe, candles| HistoryLimit { timeframe, candles };
        Self {
            history: vec![
                limit(Timeframe::H1, 120),
                limit(Timeframe::M30, 160),
                limit(Timeframe::M15, 200),
                limit(Timeframe::M5, 240),
            ],
            level_timeframes: vec![Timeframe::D1, Timeframe::H4, Timeframe::H1, Timeframe::M15],
        }
    }
}

/// Complete bot configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub market: MarketConfig,
    pub paths: PathsConfig,
    pub account: AccountConfig,
    pub indicators: IndicatorLengths,
    pub trend: TrendRules,
    pub zones: ZoneConfig,
    pub decision: DecisionConfig,
    pub signal: CrossoverConfig,
    pub context: ContextConfig,
}

impl BotConfig {
    /// Read, parse and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// `from_file` when a path is given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Reject values the core would panic on or that make every decision
    /// meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let ind = &self.indicators;
        if ind.rsi == 0 || ind.ema == 0 || ind.wma == 0 {
            return invalid(format!(
                "indicator lengths must be >= 1 (rsi {}, ema {}, wma {})",
                ind.rsi, ind.ema, ind.wma
            ));
        }
        let sig = &self.signal;
        if sig.rsi == 0 || sig.ema == 0 || sig.wma == 0 {
            return invalid("signal indicator lengths must be >= 1".into());
        }
        let t = &self.trend;
        if !(t.band_low <= t.midline && t.midline <= t.band_high) {
            return invalid(format!(
                "trend thresholds must satisfy band_low <= midline <= band_high ({} / {} / {})",
                t.band_low, t.midline, t.band_high
            ));
        }
        let d = &self.decision;
        if d.balance_low > d.balance_high {
            return invalid("decision.balance_low exceeds decision.balance_high".into());
        }
        if !d.stop_buffer.is_finite() || d.stop_buffer < 0.0 {
            return invalid(format!("decision.stop_buffer must be >= 0, got {}", d.stop_buffer));
        }
        if d.higher.contains(&d.trigger) {
            return invalid(format!("decision.higher must not include the trigger frame {}", d.trigger));
        }
        let a = &self.account;
        if !(a.balance.is_finite() && a.balance >= 0.0) {
            return invalid(format!("account.balance must be >= 0, got {}", a.balance));
        }
        if !(a.risk_pct > 0.0 && a.risk_pct <= 100.0) {
            return invalid(format!("account.risk_pct must be in (0, 100], got {}", a.risk_pct));
        }
        let z = &self.zones;
        if z.fallback_width_pct <= 0.0 || z.timeframes.iter().any(|p| p.width_pct <= 0.0) {
            return invalid("zone widths must be > 0".into());
        }
        if self.market.symbol.trim().is_empty() {
            return invalid("market.symbol must not be empty".into());
        }
        Ok(())
    }

    /// The parameters that influence decisions, for the pipeline and hashing.
    pub fn strategy(&self) -> StrategyConfig {
        StrategyConfig {
            indicators: self.indicators,
            trend: self.trend.clone(),
            zones: self.zones.clone(),
            decision: self.decision.clone(),
        }
    }
}
