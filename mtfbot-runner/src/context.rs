//! Read-only context bundle for an operator or an external decision maker.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use mtfbot_core::domain::{candle, AccountState, Candle, Timeframe};
use mtfbot_core::indicators::{IndicatorChain, IndicatorTriple};
use mtfbot_core::pipeline::Pipeline;
use mtfbot_core::snapshot::MarketSnapshot;
use mtfbot_core::trend::TrendReport;
use mtfbot_core::zones::{level_candidates, LevelCandidates, ZoneReport};

use crate::config::{BotConfig, HistoryLimit};
use crate::state_store::StateStore;

/// One candle with the indicator values at its close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    #[serde(flatten)]
    pub candle: Candle,
    #[serde(flatten)]
    pub indicators: IndicatorTriple,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextReport {
    pub generated_at_utc: DateTime<Utc>,
    pub symbol: String,
    pub trigger: Timeframe,
    pub candle_ts_utc: Option<DateTime<Utc>>,
    pub price_close: f64,
    pub trend: TrendReport,
    pub zones: ZoneReport,
    pub trigger_indicators: IndicatorTriple,
    pub history: BTreeMap<Timeframe, Vec<HistoryRow>>,
    pub levels: LevelCandidates,
    pub state: AccountState,
}

/// The last `limit` candles of each configured frame. Indicators are
/// computed over the whole series first so the window starts warmed up.
pub fn indicator_history(
    snapshot: &MarketSnapshot,
    chain: &IndicatorChain,
    limits: &[HistoryLimit],
) -> BTreeMap<Timeframe, Vec<HistoryRow>> {
    limits
        .iter()
        .filter_map(|limit| {
            let candles = snapshot.candles(limit.timeframe);
            if candles.is_empty() {
                return None;
            }
            let triples = chain.compute(&candle::closes(candles));
            let skip = candles.len().saturating_sub(limit.candles);
            let rows = candles
                .iter()
                .zip(triples)
                .skip(skip)
                .map(|(candle, indicators)| HistoryRow {
                    candle: candle.clone(),
                    indicators,
                })
                .collect();
            Some((limit.timeframe, rows))
        })
        .collect()
}

/// Build the report without taking the state lock or writing anything.
pub fn build_context(
    config: &BotConfig,
    snapshot: &MarketSnapshot,
    now: DateTime<Utc>,
) -> Result<ContextReport> {
    let pipeline = Pipeline::new(config.strategy()).context("failed to build pipeline")?;
    let analysis = pipeline.analyze(snapshot).context("analysis failed")?;
    let state = StateStore::new(&config.paths.state, config.account.initial_state()).load();

    let trigger = pipeline.trigger();
    let price = analysis.reference.price;
    let levels = level_candidates(
        &analysis.zones.zones,
        price,
        config.context.level_timeframes.iter().copied(),
    );

    Ok(ContextReport {
        generated_at_utc: now,
        symbol: snapshot.symbol.clone(),
        trigger,
        candle_ts_utc: analysis.reference.timestamp,
        price_close: price,
        trigger_indicators: analysis.indicators.get(&trigger).copied().unwrap_or_default(),
        history: indicator_history(snapshot, pipeline.chain(), &config.context.history),
        levels,
        trend: analysis.trend,
        zones: analysis.zones,
        state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn series(n: usize) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + (i % 7) as f64 - (i % 3) as f64;
                Candle {
                    timestamp: start + Duration::minutes(15 * i as i64),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1.0,
                }
            })
            .collect()
    }

    #[test]
    fn history_is_bounded_and_warmed_up() {
        let mut snap = MarketSnapshot::default();
        snap.insert(Timeframe::M15, series(260));
        let limits = [
            HistoryLimit {
                timeframe: Timeframe::M15,
                candles: 200,
            },
            HistoryLimit {
                timeframe: Timeframe::H1,
                candles: 120,
            },
        ];
        let history = indicator_history(&snap, &IndicatorChain::default(), &limits);

        assert_eq!(history.len(), 1);
        let rows = &history[&Timeframe::M15];
        assert_eq!(rows.len(), 200);
        assert_eq!(rows[0].candle.timestamp, snap.candles(Timeframe::M15)[60].timestamp);
        assert!(rows.iter().all(|r| r.indicators.is_complete()));
    }

    #[test]
    fn short_series_is_returned_whole() {
        let mut snap = MarketSnapshot::default();
        snap.insert(Timeframe::M15, series(10));
        let limits = [HistoryLimit {
            timeframe: Timeframe::M15,
            candles: 200,
        }];
        let history = indicator_history(&snap, &IndicatorChain::default(), &limits);
        let rows = &history[&Timeframe::M15];
        assert_eq!(rows.len(), 10);
        assert!(rows[0].indicators.rsi.is_none());
    }

    #[test]
    fn history_row_is_flat_json() {
        let row = HistoryRow {
            candle: series(1).remove(0),
            indicators: IndicatorTriple::new(55.0, 52.0, 50.0),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["close"], 100.0);
        assert_eq!(json["ema_rsi"], 52.0);
        assert!(json.get("ts_utc").is_some());
    }
}
