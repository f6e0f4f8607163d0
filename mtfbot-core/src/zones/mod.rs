//! Zone Clusterer: pivots → percentage bands → merged, scored S/R zones.
//!
//! Clustering is a single pass over zones sorted by (kind, lo, hi). Because the
//! pass is monotonic in `lo`, a zone only ever needs comparing against the
//! cluster currently being built.

pub mod levels;
pub mod report;

pub use levels::{
    level_candidates, nearest_zone_for, LevelCandidate, LevelCandidates, LevelRole, SideLevels,
    ZoneEdge,
};
pub use report::{ReferencePoint, TimeframeZoneParams, ZoneConfig, ZoneDetector, ZoneReport};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::domain::Timeframe;
use crate::pivots::{PivotKind, Pivots};

/// Strength bonus per touch beyond the first.
pub const TOUCH_BONUS: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Resistance,
    Support,
}

impl From<PivotKind> for ZoneKind {
    fn from(kind: PivotKind) -> Self {
        match kind {
            PivotKind::High => ZoneKind::Resistance,
            PivotKind::Low => ZoneKind::Support,
        }
    }
}

/// Which zones may merge with each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterScope {
    /// Same kind, any timeframe.
    #[default]
    CrossTimeframe,
    /// Same kind and same timeframe.
    PerTimeframe,
}

/// A support or resistance band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    #[serde(rename = "tf")]
    pub timeframe: Timeframe,
    pub kind: ZoneKind,
    pub lo: f64,
    pub hi: f64,
    pub strength: f64,
    pub touches: u32,
    #[serde(rename = "last_touch_utc")]
    pub last_touch: DateTime<Utc>,
}

/// `[price * (1 - pct/100), price * (1 + pct/100)]`
pub fn pct_band(price: f64, pct: f64) -> (f64, f64) {
    let w = price * (pct / 100.0);
    (price - w, price + w)
}

impl Zone {
    /// Single-touch zone around a pivot price, weighted by its timeframe.
    pub fn from_pivot(
        timeframe: Timeframe,
        kind: ZoneKind,
        price: f64,
        touched_at: DateTime<Utc>,
        width_pct: f64,
    ) -> Self {
        let (lo, hi) = pct_band(price, width_pct);
        Self {
            timeframe,
            kind,
            lo: lo.min(hi),
            hi: lo.max(hi),
            strength: timeframe.weight(),
            touches: 1,
            last_touch: touched_at,
        }
    }

    pub fn contains(&self, price: f64) -> bool {
        (self.lo..=self.hi).contains(&price)
    }

    /// Distance from `price` to the edge facing it.
    pub fn near_edge_distance(&self, price: f64) -> f64 {
        match self.kind {
            ZoneKind::Support => (price - self.hi).abs(),
            ZoneKind::Resistance => (self.lo - price).abs(),
        }
    }

    fn can_absorb(&self, other: &Zone, scope: ClusterScope) -> bool {
        let same_group = match scope {
            ClusterScope::CrossTimeframe => true,
            ClusterScope::PerTimeframe => self.timeframe == other.timeframe,
        };
        same_group && self.kind == other.kind && other.lo <= self.hi
    }

    /// Union bounds, sum strength and touches, keep the later touch and the
    /// heavier timeframe label (ties keep `self`).
    fn absorb(&mut self, other: Zone) {
        if other.timeframe.weight() > self.timeframe.weight() {
            self.timeframe = other.timeframe;
        }
        self.lo = self.lo.min(other.lo);
        self.hi = self.hi.max(other.hi);
        self.strength += other.strength;
        self.touches += other.touches;
        self.last_touch = self.last_touch.max(other.last_touch);
    }
}

/// One zone per pivot of both kinds.
pub fn zones_from_pivots(timeframe: Timeframe, pivots: &Pivots, width_pct: f64) -> Vec<Zone> {
    [PivotKind::High, PivotKind::Low]
        .into_iter()
        .flat_map(|kind| {
            pivots.of_kind(kind).iter().map(move |p| {
                Zone::from_pivot(timeframe, kind.into(), p.price, p.timestamp, width_pct)
            })
        })
        .collect()
}

fn cluster_order(a: &Zone, b: &Zone, scope: ClusterScope) -> Ordering {
    let group = match scope {
        ClusterScope::CrossTimeframe => Ordering::Equal,
        ClusterScope::PerTimeframe => a.timeframe.cmp(&b.timeframe),
    };
    a.kind
        .cmp(&b.kind)
        .then(group)
        .then(a.lo.total_cmp(&b.lo))
        .then(a.hi.total_cmp(&b.hi))
}

/// Merge touching or overlapping zones of the same kind (and timeframe, for
/// `PerTimeframe`).
///
/// Closure property: clustering the output again changes nothing.
pub fn cluster_zones(mut zones: Vec<Zone>, scope: ClusterScope) -> Vec<Zone> {
    zones.sort_by(|a, b| cluster_order(a, b, scope));

    let mut out: Vec<Zone> = Vec::with_capacity(zones.len());
    for zone in zones {
        match out.last_mut() {
            Some(current) if current.can_absorb(&zone, scope) => current.absorb(zone),
            _ => out.push(zone),
        }
    }
    out
}

/// Reward confluence: `strength += 0.5 * max(0, touches - 1)`.
pub fn apply_touch_bonus(zones: &mut [Zone]) {
    for zone in zones {
        zone.strength += TOUCH_BONUS * zone.touches.saturating_sub(1) as f64;
    }
}

fn rank_candidates<'a>(candidates: impl Iterator<Item = &'a Zone>, price: f64) -> Vec<&'a Zone> {
    let mut ranked: Vec<&Zone> = candidates.collect();
    // Stable: equal keys keep input order
    ranked.sort_by(|a, b| {
        b.strength
            .total_cmp(&a.strength)
            .then(a.near_edge_distance(price).total_cmp(&b.near_edge_distance(price)))
    });
    ranked
}

/// Supports entirely at or below `price`, strongest first, then closest.
pub fn ranked_supports(zones: &[Zone], price: f64) -> Vec<&Zone> {
    rank_candidates(
        zones
            .iter()
            .filter(|z| z.kind == ZoneKind::Support && z.hi <= price),
        price,
    )
}

/// Resistances entirely at or above `price`, strongest first, then closest.
pub fn ranked_resistances(zones: &[Zone], price: f64) -> Vec<&Zone> {
    rank_candidates(
        zones
            .iter()
            .filter(|z| z.kind == ZoneKind::Resistance && z.lo >= price),
        price,
    )
}

pub fn nearest_support(zones: &[Zone], price: f64) -> Option<&Zone> {
    ranked_supports(zones, price).into_iter().next()
}

pub fn nearest_resistance(zones: &[Zone], price: f64) -> Option<&Zone> {
    ranked_resistances(zones, price).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ts;

    fn zone(tf: Timeframe, kind: ZoneKind, lo: f64, hi: f64, at: usize) -> Zone {
        Zone {
            timeframe: tf,
            kind,
            lo,
            hi,
            strength: tf.weight(),
            touches: 1,
            last_touch: ts(at),
        }
    }

    #[test]
    fn band_is_symmetric_percentage() {
        let (lo, hi) = pct_band(1000.0, 0.2);
        assert!((lo - 998.0).abs() < 1e-9);
        assert!((hi - 1002.0).abs() < 1e-9);
    }

    #[test]
    fn overlapping_same_kind_merge() {
        let zones = vec![
            zone(Timeframe::M15, ZoneKind::Support, 100.0, 102.0, 5),
            zone(Timeframe::H4, ZoneKind::Support, 101.0, 103.0, 2),
            zone(Timeframe::H1, ZoneKind::Support, 110.0, 111.0, 1),
        ];
        let out = cluster_zones(zones, ClusterScope::CrossTimeframe);
        assert_eq!(out.len(), 2);
        let merged = &out[0];
        assert_eq!(merged.timeframe, Timeframe::H4);
        assert_eq!((merged.lo, merged.hi), (100.0, 103.0));
        assert_eq!(merged.strength, 4.0);
        assert_eq!(merged.touches, 2);
        assert_eq!(merged.last_touch, ts(5));
    }

    #[test]
    fn touching_edges_merge() {
        let zones = vec![
            zone(Timeframe::H1, ZoneKind::Resistance, 100.0, 101.0, 0),
            zone(Timeframe::H1, ZoneKind::Resistance, 101.0, 102.0, 1),
        ];
        assert_eq!(cluster_zones(zones, ClusterScope::CrossTimeframe).len(), 1);
    }

    #[test]
    fn different_kinds_never_merge() {
        let zones = vec![
            zone(Timeframe::H1, ZoneKind::Resistance, 100.0, 102.0, 0),
            zone(Timeframe::H1, ZoneKind::Support, 101.0, 103.0, 1),
        ];
        assert_eq!(cluster_zones(zones, ClusterScope::CrossTimeframe).len(), 2);
    }

    #[test]
    fn tie_on_weight_keeps_existing_label() {
        let zones = vec![
            zone(Timeframe::M15, ZoneKind::Support, 100.0, 102.0, 0),
            zone(Timeframe::M5, ZoneKind::Support, 101.0, 103.0, 1),
        ];
        let out = cluster_zones(zones, ClusterScope::CrossTimeframe);
        assert_eq!(out[0].timeframe, Timeframe::M15);
    }

    #[test]
    fn per_timeframe_scope_keeps_frames_apart() {
        let zones = vec![
            zone(Timeframe::M15, ZoneKind::Support, 100.0, 102.0, 0),
            zone(Timeframe::D1, ZoneKind::Support, 101.0, 103.0, 1),
            zone(Timeframe::M15, ZoneKind::Support, 101.5, 104.0, 2),
        ];
        let out = cluster_zones(zones, ClusterScope::PerTimeframe);
        assert_eq!(out.len(), 2);
        let m15 = out.iter().find(|z| z.timeframe == Timeframe::M15).unwrap();
        assert_eq!((m15.lo, m15.hi, m15.touches), (100.0, 104.0, 2));
    }

    #[test]
    fn reclustering_is_a_no_op() {
        let zones = vec![
            zone(Timeframe::M15, ZoneKind::Support, 100.0, 102.0, 0),
            zone(Timeframe::H4, ZoneKind::Support, 101.0, 103.0, 1),
            zone(Timeframe::H1, ZoneKind::Resistance, 120.0, 121.0, 2),
            zone(Timeframe::D1, ZoneKind::Resistance, 120.5, 122.0, 3),
        ];
        let once = cluster_zones(zones, ClusterScope::CrossTimeframe);
        let twice = cluster_zones(once.clone(), ClusterScope::CrossTimeframe);
        assert_eq!(once, twice);
    }

    #[test]
    fn touch_bonus_rewards_confluence() {
        let mut zones = vec![zone(Timeframe::M15, ZoneKind::Support, 1.0, 2.0, 0)];
        zones[0].touches = 3;
        zones[0].strength = 3.0;
        apply_touch_bonus(&mut zones);
        assert_eq!(zones[0].strength, 4.0);
    }

    #[test]
    fn nearest_prefers_strength_then_distance() {
        let zones = vec![
            zone(Timeframe::M15, ZoneKind::Support, 98.0, 99.0, 0),
            zone(Timeframe::D1, ZoneKind::Support, 90.0, 91.0, 1),
            zone(Timeframe::D1, ZoneKind::Support, 94.0, 95.0, 2),
            zone(Timeframe::D1, ZoneKind::Support, 99.5, 100.5, 3),
            zone(Timeframe::H1, ZoneKind::Resistance, 101.0, 102.0, 4),
        ];
        let support = nearest_support(&zones, 100.0).unwrap();
        assert_eq!(support.lo, 94.0);
        let resistance = nearest_resistance(&zones, 100.0).unwrap();
        assert_eq!(resistance.lo, 101.0);
        assert!(nearest_resistance(&zones, 101.5).is_none());
    }
}
