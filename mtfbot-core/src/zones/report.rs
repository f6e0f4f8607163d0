//! Multi-timeframe zone detection and the ranked zone report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::{
    apply_touch_bonus, cluster_zones, nearest_resistance, nearest_support, zones_from_pivots,
    ClusterScope, Zone,
};
use crate::domain::{Candle, Timeframe};
use crate::pivots::{detect_pivots, PivotWindow};

const REPORT_REASONS: [&str; 2] = [
    "skeleton pivot+clustering; HTF weighted",
    "zones are approximate bands around pivots",
];

/// Pivot window and band width for one timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeframeZoneParams {
    pub timeframe: Timeframe,
    pub left: usize,
    pub right: usize,
    pub width_pct: f64,
}

impl TimeframeZoneParams {
    const fn new(timeframe: Timeframe, k: usize, width_pct: f64) -> Self {
        Self {
            timeframe,
            left: k,
            right: k,
            width_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Timeframes with fewer candles contribute no zones and get an UNKNOWN
    /// trend label.
    pub min_bars: usize,
    /// Maximum zones listed in a report.
    pub report_limit: usize,
    pub confidence: f64,
    pub cluster_scope: ClusterScope,
    pub fallback_window: PivotWindow,
    pub fallback_width_pct: f64,
    pub timeframes: Vec<TimeframeZoneParams>,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            min_bars: 20,
            report_limit: 50,
            confidence: 0.3,
            cluster_scope: ClusterScope::CrossTimeframe,
            fallback_window: PivotWindow::symmetric(4),
            fallback_width_pct: 0.2,
            timeframes: vec![
                TimeframeZoneParams::new(Timeframe::D1, 3, 0.30),
                TimeframeZoneParams::new(Timeframe::H4, 3, 0.25),
                TimeframeZoneParams::new(Timeframe::H1, 4, 0.20),
                TimeframeZoneParams::new(Timeframe::M15, 5, 0.15),
            ],
        }
    }
}

impl ZoneConfig {
    /// Window and width for `timeframe`, falling back when it has no entry.
    pub fn params_for(&self, timeframe: Timeframe) -> (PivotWindow, f64) {
        self.timeframes
            .iter()
            .find(|p| p.timeframe == timeframe)
            .map(|p| {
                (
                    PivotWindow {
                        left: p.left,
                        right: p.right,
                    },
                    p.width_pct,
                )
            })
            .unwrap_or((self.fallback_window, self.fallback_width_pct))
    }
}

/// Price and candle time the report is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub price: f64,
    #[serde(rename = "ts_utc")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneReport {
    pub exchange: String,
    pub symbol: String,
    #[serde(rename = "ref")]
    pub reference: ReferencePoint,
    /// Strongest first, then by `lo`; at most `report_limit` entries.
    pub zones: Vec<Zone>,
    pub nearest_support: Option<Zone>,
    pub nearest_resistance: Option<Zone>,
    pub confidence: f64,
    pub reasons: Vec<String>,
}

/// Turns candle series of several timeframes into one scored zone set.
#[derive(Debug, Clone, Default)]
pub struct ZoneDetector {
    config: ZoneConfig,
}

impl ZoneDetector {
    pub fn new(config: ZoneConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Clustered, bonus-scored zones across all frames with enough history.
    pub fn detect_zones(&self, frames: &BTreeMap<Timeframe, Vec<Candle>>) -> Vec<Zone> {
        let mut raw = Vec::new();
        for (&timeframe, candles) in frames {
            if candles.len() < self.config.min_bars {
                debug!(%timeframe, bars = candles.len(), "too few bars for zones");
                continue;
            }
            let (window, width_pct) = self.config.params_for(timeframe);
            let pivots = detect_pivots(candles, window);
            raw.extend(zones_from_pivots(timeframe, &pivots, width_pct));
        }

        let mut zones = cluster_zones(raw, self.config.cluster_scope);
        apply_touch_bonus(&mut zones);
        zones
    }

    pub fn report(
        &self,
        exchange: &str,
        symbol: &str,
        frames: &BTreeMap<Timeframe, Vec<Candle>>,
        reference: ReferencePoint,
    ) -> ZoneReport {
        let mut zones = self.detect_zones(frames);
        let nearest_support = nearest_support(&zones, reference.price).cloned();
        let nearest_resistance = nearest_resistance(&zones, reference.price).cloned();

        zones.sort_by(|a, b| b.strength.total_cmp(&a.strength).then(a.lo.total_cmp(&b.lo)));
        zones.truncate(self.config.report_limit);

        ZoneReport {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            reference,
            zones,
            nearest_support,
            nearest_resistance,
            confidence: self.config.confidence,
            reasons: REPORT_REASONS.iter().map(|r| r.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::candles_from_hl;
    use crate::zones::ZoneKind;

    /// Sawtooth with a peak every 12 bars and a trough 6 bars later.
    fn sawtooth(bars: usize, base: f64) -> Vec<Candle> {
        let hl: Vec<(f64, f64)> = (0..bars)
            .map(|i| {
                let phase = (i % 12) as f64;
                let lift = if phase <= 6.0 { phase } else { 12.0 - phase };
                let mid = base + lift * 10.0;
                (mid + 2.0, mid - 2.0)
            })
            .collect();
        candles_from_hl(&hl)
    }

    #[test]
    fn params_fall_back_for_unlisted_frames() {
        let cfg = ZoneConfig::default();
        assert_eq!(cfg.params_for(Timeframe::H1), (PivotWindow::symmetric(4), 0.20));
        assert_eq!(cfg.params_for(Timeframe::M5), (PivotWindow::symmetric(4), 0.2));
    }

    #[test]
    fn short_frames_are_skipped() {
        let mut frames = BTreeMap::new();
        frames.insert(Timeframe::H1, sawtooth(19, 1000.0));
        let detector = ZoneDetector::default();
        assert!(detector.detect_zones(&frames).is_empty());
    }

    #[test]
    fn repeated_peaks_cluster_into_one_zone() {
        let mut frames = BTreeMap::new();
        frames.insert(Timeframe::H1, sawtooth(60, 1000.0));
        let zones = ZoneDetector::default().detect_zones(&frames);

        let resistances: Vec<&Zone> = zones
            .iter()
            .filter(|z| z.kind == ZoneKind::Resistance)
            .collect();
        assert_eq!(resistances.len(), 1);
        let r = resistances[0];
        assert!(r.touches >= 4);
        // weight 2 per touch plus 0.5 per extra touch
        let expected = 2.0 * r.touches as f64 + 0.5 * (r.touches - 1) as f64;
        assert!((r.strength - expected).abs() < 1e-9);
        assert!(r.contains(1062.0));
    }

    #[test]
    fn report_is_ranked_bounded_and_sided() {
        let mut frames = BTreeMap::new();
        frames.insert(Timeframe::H1, sawtooth(60, 1000.0));
        frames.insert(Timeframe::D1, sawtooth(40, 1200.0));
        let detector = ZoneDetector::new(ZoneConfig {
            report_limit: 2,
            ..ZoneConfig::default()
        });
        let reference = ReferencePoint {
            price: 1100.0,
            timestamp: None,
        };
        let report = detector.report("binance", "BTCUSDT", &frames, reference);

        assert!(report.zones.len() <= 2);
        assert!(report
            .zones
            .windows(2)
            .all(|w| w[0].strength >= w[1].strength));
        let support = report.nearest_support.as_ref().unwrap();
        assert!(support.hi <= 1100.0);
        let resistance = report.nearest_resistance.as_ref().unwrap();
        assert!(resistance.lo >= 1100.0);
        assert_eq!(resistance.timeframe, Timeframe::D1);
        assert_eq!(report.confidence, 0.3);
        assert_eq!(report.reasons.len(), 2);
    }
}
