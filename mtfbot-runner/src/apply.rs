//! Record a decision made outside the bot (an operator or another model)
//! against the same state file and journal the cycle uses.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

use mtfbot_core::decision::{Action, DecisionRecord};
use mtfbot_core::domain::{AccountState, Position, Side, Timeframe};
use mtfbot_core::indicators::IndicatorTriple;
use mtfbot_core::trend::Bias;

use crate::config::BotConfig;
use crate::journal::Journal;
use crate::state_store::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplyAction {
    Open,
    Close,
    Noop,
}

impl FromStr for ApplyAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OPEN" => Ok(ApplyAction::Open),
            "CLOSE" => Ok(ApplyAction::Close),
            "NOOP" => Ok(ApplyAction::Noop),
            other => Err(format!("unknown action '{other}' (expected OPEN, CLOSE or NOOP)")),
        }
    }
}

impl fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApplyAction::Open => "OPEN",
            ApplyAction::Close => "CLOSE",
            ApplyAction::Noop => "NOOP",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApplyError {
    #[error("{action} requires --{field}")]
    Missing {
        action: ApplyAction,
        field: &'static str,
    },

    #[error("{field} must be positive and finite, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("stop {sl} is on the wrong side of entry {entry} for a {side} position")]
    StopSide { side: Side, entry: f64, sl: f64 },

    #[error("already in a {0} position; close it first")]
    AlreadyInPosition(Side),

    #[error("no open position to close")]
    NotInPosition,

    #[error("CLOSE side {requested} does not match open {open} position")]
    SideMismatch { requested: Side, open: Side },
}

/// An externally decided action for one candle.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyRequest {
    pub action: ApplyAction,
    pub candle_ts: DateTime<Utc>,
    pub side: Option<Side>,
    /// Managed timeframe; defaults to the trigger timeframe.
    pub timeframe: Option<Timeframe>,
    pub entry: Option<f64>,
    pub sl: Option<f64>,
    pub size: Option<f64>,
    pub notes: String,
    pub indicators: IndicatorTriple,
    /// Trigger-timeframe bias at decision time, journaled as `bias_15m`.
    pub bias: Option<Bias>,
}

impl ApplyRequest {
    pub fn new(action: ApplyAction, candle_ts: DateTime<Utc>) -> Self {
        Self {
            action,
            candle_ts,
            side: None,
            timeframe: None,
            entry: None,
            sl: None,
            size: None,
            notes: String::new(),
            indicators: IndicatorTriple::default(),
            bias: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyReport {
    pub action: ApplyAction,
    pub record: Option<DecisionRecord>,
    pub state: AccountState,
}

fn positive(field: &'static str, value: Option<f64>, action: ApplyAction) -> Result<f64, ApplyError> {
    let value = value.ok_or(ApplyError::Missing { action, field })?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ApplyError::NotPositive { field, value })
    }
}

/// The state after applying `req` to `state`, plus the journal row for
/// OPEN and CLOSE. Does no I/O.
pub fn transition(
    state: &AccountState,
    req: &ApplyRequest,
    symbol: &str,
    trigger: Timeframe,
    rules_hash: &str,
    now: DateTime<Utc>,
) -> Result<(AccountState, Option<DecisionRecord>), ApplyError> {
    let (action, candle_ts) = (req.action, req.candle_ts);
    let mut next = state.clone();
    next.last_processed_candle = Some(
        state
            .last_processed_candle
            .map_or(candle_ts, |last| last.max(candle_ts)),
    );
    let timeframe = req.timeframe.unwrap_or(trigger);

    let record = |action: Action| {
        let mut row = DecisionRecord::new(action, symbol, timeframe, candle_ts, state, now)
            .with_indicators(&req.indicators)
            .with_rules_hash(rules_hash)
            .with_notes(req.notes.clone());
        row.bias_15m = req.bias;
        row
    };

    match action {
        ApplyAction::Noop => Ok((next, None)),
        ApplyAction::Open => {
            if let Some(open) = &state.position {
                return Err(ApplyError::AlreadyInPosition(open.side));
            }
            let side = req.side.ok_or(ApplyError::Missing { action, field: "side" })?;
            let entry = positive("entry", req.entry, action)?;
            let sl = positive("sl", req.sl, action)?;
            let size = positive("size", req.size, action)?;
            let stop_ok = match side {
                Side::Short => sl > entry,
                Side::Long => sl < entry,
            };
            if !stop_ok {
                return Err(ApplyError::StopSide { side, entry, sl });
            }

            next.position = Some(Position {
                side,
                timeframe,
                entry_price: entry,
                stop_loss: sl,
                size_in_base: size,
                opened_at: now,
                anchor: None,
            });
            Ok((next, Some(record(Action::Open).with_trade(side, entry, sl, size))))
        }
        ApplyAction::Close => {
            let open = state.position.as_ref().ok_or(ApplyError::NotInPosition)?;
            if let Some(requested) = req.side.filter(|&s| s != open.side) {
                return Err(ApplyError::SideMismatch {
                    requested,
                    open: open.side,
                });
            }
            let row = record(Action::Close).with_trade(
                open.side,
                req.entry.unwrap_or(open.entry_price),
                req.sl.unwrap_or(open.stop_loss),
                req.size.unwrap_or(open.size_in_base),
            );
            next.position = None;
            Ok((next, Some(row)))
        }
    }
}

/// Apply `req` to the configured state file and journal.
pub fn apply(config: &BotConfig, req: &ApplyRequest, now: DateTime<Utc>) -> Result<ApplyReport> {
    let rules_hash = config
        .strategy()
        .rules_hash()
        .context("failed to fingerprint the rule set")?;

    let store = StateStore::new(&config.paths.state, config.account.initial_state());
    let journal = Journal::new(&config.paths.journal);
    let _lock = store.lock().context("failed to lock state")?;
    let loaded = store.load();

    let (next, record) = transition(
        &loaded,
        req,
        &config.market.symbol,
        config.decision.trigger,
        rules_hash.short(),
        now,
    )?;

    if let Some(record) = &record {
        journal
            .append(record)
            .with_context(|| format!("failed to append {} to journal", record.event_id))?;
    }
    store.commit(&loaded, &next).context("failed to save state")?;
    info!(action = %req.action, candle = %req.candle_ts, "applied external decision");

    Ok(ApplyReport {
        action: req.action,
        record,
        state: next,
    })
}
