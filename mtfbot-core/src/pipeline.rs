//! In-process composition of the analysis stages.
//!
//! snapshot → indicators → trend labels, snapshot → pivots → zones, then
//! {labels, zones, price, account} → decision. Each stage is a plain function
//! call; nothing here touches the file system.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::decision::{DecisionContext, DecisionEngine, DecisionOutcome, NoopReason};
use crate::domain::{AccountState, Timeframe};
use crate::fingerprint::{RulesHash, StrategyConfig};
use crate::indicators::{IndicatorChain, IndicatorTriple};
use crate::snapshot::MarketSnapshot;
use crate::trend::{TrendClassifier, TrendReport};
use crate::zones::{ReferencePoint, ZoneDetector, ZoneReport};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no candles in any timeframe; cannot determine a reference price")]
    NoReferencePrice,

    #[error("failed to fingerprint the rule set: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Output of the read-only stages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub reference: ReferencePoint,
    /// Timeframe the reference was taken from.
    pub reference_timeframe: Timeframe,
    pub indicators: BTreeMap<Timeframe, IndicatorTriple>,
    pub trend: TrendReport,
    pub zones: ZoneReport,
}

/// One full decision cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cycle {
    pub analysis: Analysis,
    pub outcome: DecisionOutcome,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    strategy: StrategyConfig,
    chain: IndicatorChain,
    classifier: TrendClassifier,
    detector: ZoneDetector,
    engine: DecisionEngine,
    rules_hash: RulesHash,
}

impl Pipeline {
    pub fn new(strategy: StrategyConfig) -> Result<Self, PipelineError> {
        let rules_hash = strategy.rules_hash()?;
        Ok(Self {
            chain: IndicatorChain::new(strategy.indicators),
            classifier: TrendClassifier::new(strategy.trend.clone(), strategy.indicators),
            detector: ZoneDetector::new(strategy.zones.clone()),
            engine: DecisionEngine::new(strategy.decision.clone()),
            rules_hash,
            strategy,
        })
    }

    pub fn strategy(&self) -> &StrategyConfig {
        &self.strategy
    }

    pub fn chain(&self) -> &IndicatorChain {
        &self.chain
    }

    pub fn rules_hash(&self) -> &RulesHash {
        &self.rules_hash
    }

    pub fn trigger(&self) -> Timeframe {
        self.strategy.decision.trigger
    }

    /// Last candle of the trigger frame, else of the lowest frame present.
    pub fn reference_point(
        &self,
        snapshot: &MarketSnapshot,
    ) -> Result<(Timeframe, ReferencePoint), PipelineError> {
        let trigger = self.trigger();
        let from_trigger = snapshot
            .frame(trigger)
            .and_then(|f| f.last())
            .map(|c| (trigger, c));
        let from_lowest = || {
            snapshot
                .frames
                .iter()
                .rev()
                .find_map(|(&tf, f)| f.last().map(|c| (tf, c)))
        };

        let (timeframe, candle) = from_trigger
            .or_else(from_lowest)
            .ok_or(PipelineError::NoReferencePrice)?;
        if timeframe != trigger {
            warn!(%trigger, fallback = %timeframe, "trigger frame empty; using lowest frame for reference");
        }
        Ok((
            timeframe,
            ReferencePoint {
                price: candle.close,
                timestamp: Some(candle.timestamp),
            },
        ))
    }

    /// Indicators, trend labels and zones. Fails only when no frame has a
    /// candle. Frames shorter than `zones.min_bars` get empty indicators,
    /// even when the snapshot carries precomputed values.
    pub fn analyze(&self, snapshot: &MarketSnapshot) -> Result<Analysis, PipelineError> {
        let (reference_timeframe, reference) = self.reference_point(snapshot)?;

        let min_bars = self.strategy.zones.min_bars;
        let indicators: BTreeMap<Timeframe, IndicatorTriple> = snapshot
            .frames
            .iter()
            .map(|(&tf, frame)| {
                let bars = frame.candles.len();
                if bars < min_bars {
                    debug!(%tf, bars, min_bars, "too few candles; indicators withheld");
                    return (tf, IndicatorTriple::default());
                }
                (tf, frame.latest_indicators(&self.chain))
            })
            .collect();

        let mut trend = self.classifier.report(&indicators);
        for tf in snapshot.dropped_timeframes() {
            if !trend.missing.contains(&tf) {
                trend.missing.push(tf);
            }
        }
        trend.errors.extend(
            snapshot
                .dropped
                .iter()
                .map(|d| format!("{}: dropped ({})", d.key, d.reason)),
        );

        let zones = self.detector.report(
            &snapshot.exchange,
            &snapshot.symbol,
            &snapshot.candle_map(),
            reference,
        );
        debug!(
            zones = zones.zones.len(),
            overall = %trend.overall_bias,
            price = reference.price,
            "analysis complete"
        );

        Ok(Analysis {
            reference,
            reference_timeframe,
            indicators,
            trend,
            zones,
        })
    }

    /// Evaluate the latest trigger candle against `state`.
    pub fn decide(
        &self,
        snapshot: &MarketSnapshot,
        analysis: &Analysis,
        state: &AccountState,
        now: DateTime<Utc>,
    ) -> DecisionOutcome {
        let trigger = self.trigger();
        let candles = snapshot.candles(trigger);
        let Some(last) = candles.last() else {
            warn!(%trigger, "no trigger candles; state left untouched");
            return DecisionOutcome::noop(NoopReason::NoTriggerData, state.clone());
        };

        let ctx = DecisionContext {
            symbol: &snapshot.symbol,
            candle_ts: last.timestamp,
            price: last.close,
            trend: &analysis.trend,
            trigger_indicators: analysis.indicators.get(&trigger).copied().unwrap_or_default(),
            trigger_candles: candles,
            zones: Some(&analysis.zones),
            rules_hash: self.rules_hash.short(),
            now,
        };
        self.engine.decide(&ctx, state)
    }

    /// `analyze` followed by `decide`.
    pub fn run_cycle(
        &self,
        snapshot: &MarketSnapshot,
        state: &AccountState,
        now: DateTime<Utc>,
    ) -> Result<Cycle, PipelineError> {
        let analysis = self.analyze(snapshot)?;
        let outcome = self.decide(snapshot, &analysis, state, now);
        Ok(Cycle { analysis, outcome })
    }
}
