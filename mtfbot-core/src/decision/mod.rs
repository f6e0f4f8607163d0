//! Decision State Machine: FLAT / LONG / SHORT driven by trend labels, zones
//! and the persisted account.
//!
//! `DecisionEngine::decide` is a pure function of its inputs: state comes in
//! by reference and the updated copy goes out in the outcome. Loading and
//! saving belong to the caller.

pub mod record;

pub use record::{event_id, Action, DecisionRecord};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{AccountState, AnchorRef, Candle, Position, Side, Timeframe};
use crate::indicators::IndicatorTriple;
use crate::pivots::{detect_pivots, PivotWindow};
use crate::trend::{BandTrend, TrendReport};
use crate::zones::ZoneReport;

/// Where the stop-loss is anchored on entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopAnchor {
    /// Nearest trigger-frame pivot beyond price.
    #[default]
    Pivot,
    /// Near edge of the nearest zone beyond price from the zone report.
    ZoneEdge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Frame whose candles drive evaluation and whose bias manages positions.
    pub trigger: Timeframe,
    /// Frames that must all agree with the trigger for an entry.
    pub higher: Vec<Timeframe>,
    pub pivot_window: PivotWindow,
    /// Absolute price distance added beyond the stop anchor.
    pub stop_buffer: f64,
    pub short_entries: bool,
    /// Mirror of the short rule on STRONG_UP; off in the reference rule set.
    pub long_entries: bool,
    pub stop_anchor: StopAnchor,
    pub balance_low: f64,
    pub balance_high: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            trigger: Timeframe::M15,
            higher: vec![Timeframe::D1, Timeframe::H4],
            pivot_window: PivotWindow::symmetric(2),
            stop_buffer: 20.0,
            short_entries: true,
            long_entries: false,
            stop_anchor: StopAnchor::Pivot,
            balance_low: 40.0,
            balance_high: 60.0,
        }
    }
}

/// Everything one evaluation looks at besides the account.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub symbol: &'a str,
    /// Timestamp of the latest trigger-frame candle.
    pub candle_ts: DateTime<Utc>,
    /// Close of that candle.
    pub price: f64,
    pub trend: &'a TrendReport,
    pub trigger_indicators: IndicatorTriple,
    pub trigger_candles: &'a [Candle],
    pub zones: Option<&'a ZoneReport>,
    pub rules_hash: &'a str,
    /// Wall-clock time of the evaluation, recorded on positions and rows.
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoopReason {
    /// Candle at or before the last processed one.
    AlreadyProcessed,
    /// The trigger frame has no candles to evaluate.
    NoTriggerData,
    /// Flat and the entry rule did not fire.
    NoEntrySignal,
    /// Entry fired but nothing to anchor the stop on.
    NoStopAnchor,
    NonPositiveStopDistance,
    InvalidSize,
    /// In position, no flip and RSI outside the balance zone.
    NoExitSignal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Noop { reason: NoopReason },
    Open { position: Position, notes: String },
    Close { position: Position, notes: String },
    Hold { side: Side, warning: String },
}

impl Decision {
    pub fn is_noop(&self) -> bool {
        matches!(self, Decision::Noop { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decision::Noop { .. } => "NOOP",
            Decision::Open { .. } => "OPEN",
            Decision::Close { .. } => "CLOSE",
            Decision::Hold { .. } => "HOLD",
        }
    }
}

/// Result of one evaluation: the decision, the state to persist, and the
/// journal row to append (OPEN and CLOSE only).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionOutcome {
    pub decision: Decision,
    pub state: AccountState,
    pub record: Option<DecisionRecord>,
}

impl DecisionOutcome {
    pub fn noop(reason: NoopReason, state: AccountState) -> Self {
        Self {
            decision: Decision::Noop { reason },
            state,
            record: None,
        }
    }
}

struct StopLevel {
    anchor: AnchorRef,
    stop: f64,
    source: String,
}

#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    config: DecisionConfig,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Evaluate one trigger-frame candle against `state`.
    ///
    /// A candle that is not newer than the last processed one yields NOOP with
    /// the state returned unchanged. Otherwise the last processed timestamp
    /// advances, even when the decision is NOOP.
    pub fn decide(&self, ctx: &DecisionContext<'_>, state: &AccountState) -> DecisionOutcome {
        if state.has_processed(ctx.candle_ts) {
            debug!(candle = %ctx.candle_ts, "candle already processed");
            return DecisionOutcome::noop(NoopReason::AlreadyProcessed, state.clone());
        }

        let mut next = state.clone();
        next.last_processed_candle = Some(ctx.candle_ts);

        match state.position.as_ref() {
            Some(position) => self.manage(ctx, position, next),
            None => self.enter(ctx, next),
        }
    }

    fn in_balance_zone(&self, rsi: f64) -> bool {
        (self.config.balance_low..=self.config.balance_high).contains(&rsi)
    }

    fn manage(&self, ctx: &DecisionContext<'_>, position: &Position, mut next: AccountState) -> DecisionOutcome {
        let trigger = self.config.trigger;
        let bias = ctx.trend.bias(trigger);
        let mut notes = Vec::new();

        let balanced = ctx
            .trigger_indicators
            .rsi
            .is_some_and(|rsi| self.in_balance_zone(rsi));
        if balanced {
            notes.push(format!(
                "RSI {trigger} in {:.0}-{:.0} balance zone (warning)",
                self.config.balance_low, self.config.balance_high
            ));
        }

        let flipped = match position.side {
            Side::Short => bias.is_buy(),
            Side::Long => bias.is_sell(),
        };
        if flipped {
            notes.push(format!("{trigger} bias flipped to {bias}"));
        }
        let notes = notes.join("; ");

        if flipped {
            next.position = None;
            let record = DecisionRecord::new(Action::Close, ctx.symbol, trigger, ctx.candle_ts, &next, ctx.now)
                .with_trade(position.side, position.entry_price, position.stop_loss, position.size_in_base)
                .with_indicators(&ctx.trigger_indicators)
                .with_biases(ctx.trend)
                .with_rules_hash(ctx.rules_hash)
                .with_notes(notes.clone());
            info!(side = %position.side, price = ctx.price, %notes, "close");
            return DecisionOutcome {
                decision: Decision::Close {
                    position: position.clone(),
                    notes,
                },
                state: next,
                record: Some(record),
            };
        }

        if balanced {
            info!(side = %position.side, price = ctx.price, warning = %notes, "hold");
            return DecisionOutcome {
                decision: Decision::Hold {
                    side: position.side,
                    warning: notes,
                },
                state: next,
                record: None,
            };
        }

        DecisionOutcome::noop(NoopReason::NoExitSignal, next)
    }

    /// Side whose entry rule fires: trigger and every higher frame share the
    /// same strong band reading.
    fn entry_side(&self, trend: &TrendReport) -> Option<Side> {
        let all_frames = || {
            self.config
                .higher
                .iter()
                .copied()
                .chain(std::iter::once(self.config.trigger))
        };
        let all_in = |band: BandTrend| all_frames().all(|tf| trend.band(tf) == band);

        if self.config.short_entries && all_in(BandTrend::StrongDown) {
            Some(Side::Short)
        } else if self.config.long_entries && all_in(BandTrend::StrongUp) {
            Some(Side::Long)
        } else {
            None
        }
    }

    fn stop_level(&self, ctx: &DecisionContext<'_>, side: Side) -> Option<StopLevel> {
        let buffer = self.config.stop_buffer;
        let sign = match side {
            Side::Short => 1.0,
            Side::Long => -1.0,
        };
        let trigger = self.config.trigger;

        let (anchor, source) = match self.config.stop_anchor {
            StopAnchor::Pivot => {
                let pivots = detect_pivots(ctx.trigger_candles, self.config.pivot_window);
                let (pivot, kind) = match side {
                    Side::Short => (pivots.nearest_high_above(ctx.price)?, "high"),
                    Side::Long => (pivots.nearest_low_below(ctx.price)?, "low"),
                };
                (
                    AnchorRef {
                        price: pivot.price,
                        timestamp: pivot.timestamp,
                    },
                    format!("nearest {trigger} pivot {kind} {:.2}", pivot.price),
                )
            }
            StopAnchor::ZoneEdge => {
                let report = ctx.zones?;
                let (zone, price, label) = match side {
                    Side::Short => {
                        let z = report.nearest_resistance.as_ref()?;
                        (z, z.hi, "resistance hi")
                    }
                    Side::Long => {
                        let z = report.nearest_support.as_ref()?;
                        (z, z.lo, "support lo")
                    }
                };
                (
                    AnchorRef {
                        price,
                        timestamp: zone.last_touch,
                    },
                    format!("nearest {} {label} {price:.2}", zone.timeframe),
                )
            }
        };

        Some(StopLevel {
            stop: anchor.price + sign * buffer,
            anchor,
            source,
        })
    }

    fn enter(&self, ctx: &DecisionContext<'_>, mut next: AccountState) -> DecisionOutcome {
        let Some(side) = self.entry_side(ctx.trend) else {
            return DecisionOutcome::noop(NoopReason::NoEntrySignal, next);
        };
        let Some(level) = self.stop_level(ctx, side) else {
            debug!(%side, "entry signal without stop anchor");
            return DecisionOutcome::noop(NoopReason::NoStopAnchor, next);
        };

        let entry = ctx.price;
        let stop_distance = match side {
            Side::Short => level.stop - entry,
            Side::Long => entry - level.stop,
        };
        if stop_distance.is_nan() || stop_distance <= 0.0 {
            return DecisionOutcome::noop(NoopReason::NonPositiveStopDistance, next);
        }

        let size = next.risk_amount() / stop_distance;
        if !size.is_finite() || size <= 0.0 {
            return DecisionOutcome::noop(NoopReason::InvalidSize, next);
        }

        let trigger = self.config.trigger;
        let band = match side {
            Side::Short => BandTrend::StrongDown,
            Side::Long => BandTrend::StrongUp,
        }
        .as_str();
        let sign = match side {
            Side::Short => '+',
            Side::Long => '-',
        };
        let notes = format!(
            "HTF {band} + {trigger} {band}; SL from {} ({sign}{:.0}).",
            level.source, self.config.stop_buffer,
        );

        let position = Position {
            side,
            timeframe: trigger,
            entry_price: entry,
            stop_loss: level.stop,
            size_in_base: size,
            opened_at: ctx.now,
            anchor: Some(level.anchor),
        };
        next.position = Some(position.clone());

        let record = DecisionRecord::new(Action::Open, ctx.symbol, trigger, ctx.candle_ts, &next, ctx.now)
            .with_trade(side, entry, level.stop, size)
            .with_indicators(&ctx.trigger_indicators)
            .with_biases(ctx.trend)
            .with_rules_hash(ctx.rules_hash)
            .with_notes(notes.clone());
        info!(%side, entry, stop = level.stop, size, "open");

        DecisionOutcome {
            decision: Decision::Open { position, notes },
            state: next,
            record: Some(record),
        }
    }
}
