//! One scheduled decision cycle: lock, load state, evaluate the latest
//! trigger candle, journal, then commit state.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use mtfbot_core::decision::{Decision, DecisionRecord, NoopReason};
use mtfbot_core::domain::AccountState;
use mtfbot_core::pipeline::Pipeline;
use mtfbot_core::snapshot::MarketSnapshot;
use mtfbot_core::trend::Bias;

use crate::config::BotConfig;
use crate::journal::Journal;
use crate::state_store::StateStore;

/// What `run` prints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub symbol: String,
    pub rules_hash: String,
    pub candle_ts_utc: Option<DateTime<Utc>>,
    pub price: f64,
    pub overall_bias: Bias,
    pub decision: Decision,
    pub record: Option<DecisionRecord>,
    pub state: AccountState,
    pub state_saved: bool,
}

fn leaves_state_untouched(decision: &Decision) -> bool {
    matches!(
        decision,
        Decision::Noop {
            reason: NoopReason::AlreadyProcessed | NoopReason::NoTriggerData
        }
    )
}

/// Run one cycle against the configured state and journal files.
///
/// The journal row is appended before state is committed. When the commit
/// fails the candle is replayed next time, and the journal skips the row it
/// already holds.
pub fn run_once(config: &BotConfig, snapshot: &MarketSnapshot, now: DateTime<Utc>) -> Result<CycleReport> {
    let pipeline = Pipeline::new(config.strategy()).context("failed to build pipeline")?;
    let store = StateStore::new(&config.paths.state, config.account.initial_state());
    let journal = Journal::new(&config.paths.journal);

    let _lock = store.lock().context("failed to lock state")?;
    let loaded = store.load();

    let cycle = pipeline
        .run_cycle(snapshot, &loaded, now)
        .context("analysis failed")?;
    let outcome = cycle.outcome;

    info!(
        decision = outcome.decision.label(),
        overall = %cycle.analysis.trend.overall_bias,
        price = cycle.analysis.reference.price,
        "cycle evaluated"
    );

    if let Some(record) = &outcome.record {
        journal
            .append(record)
            .with_context(|| format!("failed to append {} to journal", record.event_id))?;
    }

    let state_saved = !leaves_state_untouched(&outcome.decision);
    if state_saved {
        store
            .commit(&loaded, &outcome.state)
            .context("failed to save state")?;
    }

    let trigger = snapshot.frame(pipeline.trigger()).and_then(|f| f.last());
    Ok(CycleReport {
        symbol: snapshot.symbol.clone(),
        rules_hash: pipeline.rules_hash().short().to_string(),
        candle_ts_utc: trigger.map(|c| c.timestamp),
        price: cycle.analysis.reference.price,
        overall_bias: cycle.analysis.trend.overall_bias,
        decision: outcome.decision,
        record: outcome.record,
        state: outcome.state,
        state_saved,
    })
}
