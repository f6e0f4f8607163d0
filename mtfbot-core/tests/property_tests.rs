//! Property tests for analysis invariants.
//!
//! Uses proptest to verify:
//! 1. RSI bounds: every present RSI value lies in [0, 100]
//! 2. Warm-up presence: EMA/WMA are absent exactly before warm-up
//! 3. Clustering closure: reclustering a clustered set changes nothing
//! 4. Nearest-zone side: supports sit below price, resistances above
//! 5. Decision determinism and idempotency

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::BTreeMap;

use mtfbot_core::decision::{Decision, DecisionContext, DecisionEngine, NoopReason};
use mtfbot_core::domain::{AccountState, Candle, Timeframe};
use mtfbot_core::indicators::{Ema, Indicator, IndicatorLengths, IndicatorTriple, Rsi, Wma};
use mtfbot_core::trend::{TrendClassifier, TrendRules};
use mtfbot_core::zones::{
    cluster_zones, nearest_resistance, nearest_support, ClusterScope, Zone, ZoneKind,
};

fn base_ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_closes(min: usize, max: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0..1000.0_f64, min..max)
}

fn arb_zone() -> impl Strategy<Value = Zone> {
    (0..Timeframe::ALL.len(), any::<bool>(), 100.0..200.0_f64, 0.0..5.0_f64, 0..500_i64).prop_map(
        |(tf, support, lo, width, minute)| {
            let timeframe = Timeframe::ALL[tf];
            Zone {
                timeframe,
                kind: if support {
                    ZoneKind::Support
                } else {
                    ZoneKind::Resistance
                },
                lo,
                hi: lo + width,
                strength: timeframe.weight(),
                touches: 1,
                last_touch: base_ts() + Duration::minutes(minute),
            }
        },
    )
}

fn arb_scope() -> impl Strategy<Value = ClusterScope> {
    prop_oneof![
        Just(ClusterScope::CrossTimeframe),
        Just(ClusterScope::PerTimeframe)
    ]
}

// ── 1. RSI Bounds ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rsi_stays_in_bounds(closes in arb_closes(15, 200)) {
        for value in Rsi::new(14).compute(&closes).into_iter().flatten() {
            prop_assert!((0.0..=100.0).contains(&value), "RSI out of range: {}", value);
        }
    }
}

// ── 2. Warm-up Presence ──────────────────────────────────────────────

proptest! {
    #[test]
    fn ema_and_wma_present_exactly_after_warmup(
        closes in arb_closes(1, 120),
        period in 1..50_usize,
    ) {
        let ema = Ema::new(period).compute(&closes);
        let wma = Wma::new(period).compute(&closes);
        for i in 0..closes.len() {
            let ready = i + 1 >= period;
            prop_assert_eq!(ema[i].is_some(), ready);
            prop_assert_eq!(wma[i].is_some(), ready);
            if ready {
                prop_assert!(ema[i].unwrap().is_finite());
                prop_assert!(wma[i].unwrap().is_finite());
            }
        }
    }
}

// ── 3. Clustering Closure ────────────────────────────────────────────

proptest! {
    #[test]
    fn clustering_is_a_closure(
        zones in prop::collection::vec(arb_zone(), 0..40),
        scope in arb_scope(),
    ) {
        let once = cluster_zones(zones, scope);
        let twice = cluster_zones(once.clone(), scope);
        prop_assert_eq!(&once, &twice);

        for z in &once {
            prop_assert!(z.lo <= z.hi);
            prop_assert!(z.touches >= 1);
        }
    }

    #[test]
    fn clustered_zones_of_one_group_never_overlap(
        zones in prop::collection::vec(arb_zone(), 0..40),
    ) {
        let out = cluster_zones(zones, ClusterScope::CrossTimeframe);
        for (i, a) in out.iter().enumerate() {
            for b in &out[i + 1..] {
                if a.kind == b.kind {
                    prop_assert!(a.hi < b.lo || b.hi < a.lo, "overlap: {:?} {:?}", a, b);
                }
            }
        }
    }
}

// ── 4. Nearest-Zone Side ─────────────────────────────────────────────

proptest! {
    #[test]
    fn nearest_zones_are_on_the_correct_side(
        zones in prop::collection::vec(arb_zone(), 0..40),
        price in 90.0..210.0_f64,
    ) {
        if let Some(s) = nearest_support(&zones, price) {
            prop_assert!(s.hi <= price);
            prop_assert_eq!(s.kind, ZoneKind::Support);
        }
        if let Some(r) = nearest_resistance(&zones, price) {
            prop_assert!(r.lo >= price);
            prop_assert_eq!(r.kind, ZoneKind::Resistance);
        }
    }
}

// ── 5. Decision Determinism ──────────────────────────────────────────

fn candles_from_hl(hl: &[(f64, f64)]) -> Vec<Candle> {
    hl.iter()
        .enumerate()
        .map(|(i, &(high, low))| Candle {
            timestamp: base_ts() + Duration::minutes(15 * i as i64),
            open: (high + low) / 2.0,
            high,
            low,
            close: (high + low) / 2.0,
            volume: 1.0,
        })
        .collect()
}

proptest! {
    #[test]
    fn decisions_are_pure_and_idempotent(
        highs in prop::collection::vec(100.0..120.0_f64, 5..40),
        price in 95.0..125.0_f64,
        rsi in 0.0..100.0_f64,
        ema in 0.0..100.0_f64,
        wma in 0.0..100.0_f64,
        balance in 0.0..10_000.0_f64,
    ) {
        let hl: Vec<(f64, f64)> = highs.iter().map(|&h| (h, h - 3.0)).collect();
        let candles = candles_from_hl(&hl);
        let triple = IndicatorTriple::new(rsi, ema, wma);

        let mut triples = BTreeMap::new();
        for tf in [Timeframe::D1, Timeframe::H4, Timeframe::M15] {
            triples.insert(tf, triple);
        }
        let trend = TrendClassifier::new(TrendRules::default(), IndicatorLengths::default())
            .report(&triples);

        let ctx = DecisionContext {
            symbol: "BTCUSDT",
            candle_ts: candles[candles.len() - 1].timestamp,
            price,
            trend: &trend,
            trigger_indicators: triple,
            trigger_candles: &candles,
            zones: None,
            rules_hash: "prop",
            now: base_ts(),
        };
        let engine = DecisionEngine::default();
        let state = AccountState::with_balance(balance, 1.0);

        let first = engine.decide(&ctx, &state);
        prop_assert_eq!(&first, &engine.decide(&ctx, &state));
        prop_assert_eq!(first.state.last_processed_candle, Some(ctx.candle_ts));
        prop_assert_eq!(first.record.is_some(), matches!(first.decision, Decision::Open { .. }));

        if let Decision::Open { position, .. } = &first.decision {
            prop_assert!(position.stop_loss > position.entry_price);
            prop_assert!(position.size_in_base.is_finite() && position.size_in_base > 0.0);
        }

        let again = engine.decide(&ctx, &first.state);
        prop_assert_eq!(again.decision, Decision::Noop { reason: NoopReason::AlreadyProcessed });
        prop_assert_eq!(again.state, first.state);
    }
}
