//! Per-timeframe stop-loss and take-profit levels taken from zone edges.

use serde::{Deserialize, Serialize};

use super::{Zone, ZoneKind};
use crate::domain::{Side, Timeframe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelRole {
    StopLoss,
    TakeProfit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneEdge {
    Lo,
    Hi,
}

impl ZoneEdge {
    pub fn of(self, zone: &Zone) -> f64 {
        match self {
            ZoneEdge::Lo => zone.lo,
            ZoneEdge::Hi => zone.hi,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelCandidate {
    pub role: LevelRole,
    pub side: Side,
    #[serde(rename = "tf")]
    pub timeframe: Timeframe,
    pub level: f64,
    pub edge: ZoneEdge,
    pub strength: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideLevels {
    pub short: Vec<LevelCandidate>,
    pub long: Vec<LevelCandidate>,
}

/// Both lists are ordered from the highest timeframe down.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelCandidates {
    pub stop_loss: SideLevels,
    pub take_profit: SideLevels,
}

/// Closest zone of `kind` on `timeframe` strictly beyond `price`: the lowest
/// resistance with `lo > price`, or the highest support with `hi < price`.
pub fn nearest_zone_for<'a>(
    zones: &'a [Zone],
    timeframe: Timeframe,
    kind: ZoneKind,
    price: f64,
) -> Option<&'a Zone> {
    let candidates = zones
        .iter()
        .filter(move |z| z.timeframe == timeframe && z.kind == kind);
    match kind {
        ZoneKind::Resistance => candidates
            .filter(|z| z.lo > price)
            .min_by(|a, b| a.lo.total_cmp(&b.lo)),
        ZoneKind::Support => candidates
            .filter(|z| z.hi < price)
            .max_by(|a, b| a.hi.total_cmp(&b.hi)),
    }
}

fn candidate(role: LevelRole, side: Side, zone: &Zone, edge: ZoneEdge) -> LevelCandidate {
    LevelCandidate {
        role,
        side,
        timeframe: zone.timeframe,
        level: edge.of(zone),
        edge,
        strength: zone.strength,
    }
}

/// SHORT stops sit on resistance `hi` and target support `hi`; LONG stops sit
/// on support `lo` and target resistance `lo`.
pub fn level_candidates(
    zones: &[Zone],
    price: f64,
    timeframes: impl IntoIterator<Item = Timeframe>,
) -> LevelCandidates {
    let mut frames: Vec<Timeframe> = timeframes.into_iter().collect();
    frames.sort();
    frames.dedup();

    let mut out = LevelCandidates::default();
    for tf in frames {
        if let Some(res) = nearest_zone_for(zones, tf, ZoneKind::Resistance, price) {
            out.stop_loss
                .short
                .push(candidate(LevelRole::StopLoss, Side::Short, res, ZoneEdge::Hi));
            out.take_profit
                .long
                .push(candidate(LevelRole::TakeProfit, Side::Long, res, ZoneEdge::Lo));
        }
        if let Some(sup) = nearest_zone_for(zones, tf, ZoneKind::Support, price) {
            out.stop_loss
                .long
                .push(candidate(LevelRole::StopLoss, Side::Long, sup, ZoneEdge::Lo));
            out.take_profit
                .short
                .push(candidate(LevelRole::TakeProfit, Side::Short, sup, ZoneEdge::Hi));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ts;

    fn zone(tf: Timeframe, kind: ZoneKind, lo: f64, hi: f64) -> Zone {
        Zone {
            timeframe: tf,
            kind,
            lo,
            hi,
            strength: tf.weight(),
            touches: 1,
            last_touch: ts(0),
        }
    }

    fn fixture() -> Vec<Zone> {
        vec![
            zone(Timeframe::M15, ZoneKind::Resistance, 105.0, 106.0),
            zone(Timeframe::M15, ZoneKind::Resistance, 102.0, 103.0),
            zone(Timeframe::M15, ZoneKind::Support, 95.0, 96.0),
            zone(Timeframe::M15, ZoneKind::Support, 97.0, 98.0),
            zone(Timeframe::D1, ZoneKind::Resistance, 120.0, 125.0),
            zone(Timeframe::H1, ZoneKind::Support, 99.0, 101.0),
        ]
    }

    #[test]
    fn picks_closest_zone_per_frame() {
        let zones = fixture();
        let res = nearest_zone_for(&zones, Timeframe::M15, ZoneKind::Resistance, 100.0).unwrap();
        assert_eq!(res.lo, 102.0);
        let sup = nearest_zone_for(&zones, Timeframe::M15, ZoneKind::Support, 100.0).unwrap();
        assert_eq!(sup.hi, 98.0);
        // hi above price is not strictly below
        assert!(nearest_zone_for(&zones, Timeframe::H1, ZoneKind::Support, 100.0).is_none());
    }

    #[test]
    fn candidates_follow_edges_and_frame_order() {
        let zones = fixture();
        let levels = level_candidates(&zones, 100.0, [Timeframe::M15, Timeframe::H1, Timeframe::D1]);

        let sl_short: Vec<(Timeframe, f64)> = levels
            .stop_loss
            .short
            .iter()
            .map(|c| (c.timeframe, c.level))
            .collect();
        assert_eq!(sl_short, vec![(Timeframe::D1, 125.0), (Timeframe::M15, 103.0)]);

        assert_eq!(levels.stop_loss.long.len(), 1);
        assert_eq!(levels.stop_loss.long[0].level, 97.0);
        assert_eq!(levels.take_profit.short[0].level, 98.0);
        assert_eq!(levels.take_profit.long[0].level, 120.0);
        assert_eq!(levels.take_profit.long[0].edge, ZoneEdge::Lo);
    }
}
