//! Trend Classifier: two rule sets over (RSI, EMA(RSI), WMA(RSI)) per timeframe.
//!
//! Rule A splits at the RSI midline, rule B at the 40/60 band. The bias prefers
//! a strong band reading, then the midline reading, else WAIT.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::domain::Timeframe;
use crate::indicators::{IndicatorLengths, IndicatorTriple};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MidlineTrend {
    Up,
    Down,
    Range,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BandTrend {
    StrongUp,
    StrongDown,
    Neutral,
    Unknown,
}

impl BandTrend {
    pub fn as_str(self) -> &'static str {
        match self {
            BandTrend::StrongUp => "STRONG_UP",
            BandTrend::StrongDown => "STRONG_DOWN",
            BandTrend::Neutral => "NEUTRAL",
            BandTrend::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bias {
    BuyBias,
    BuyBiasWeak,
    SellBias,
    SellBiasWeak,
    Wait,
}

impl Bias {
    pub fn as_str(self) -> &'static str {
        match self {
            Bias::BuyBias => "BUY_BIAS",
            Bias::BuyBiasWeak => "BUY_BIAS_WEAK",
            Bias::SellBias => "SELL_BIAS",
            Bias::SellBiasWeak => "SELL_BIAS_WEAK",
            Bias::Wait => "WAIT",
        }
    }

    /// Either buy variant.
    pub fn is_buy(self) -> bool {
        matches!(self, Bias::BuyBias | Bias::BuyBiasWeak)
    }

    /// Either sell variant.
    pub fn is_sell(self) -> bool {
        matches!(self, Bias::SellBias | Bias::SellBiasWeak)
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bias {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [Bias; 5] = [
            Bias::BuyBias,
            Bias::BuyBiasWeak,
            Bias::SellBias,
            Bias::SellBiasWeak,
            Bias::Wait,
        ];
        ALL.into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown bias '{s}'"))
    }
}

/// Thresholds for both rule sets and the frames scanned for overall bias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendRules {
    pub midline: f64,
    pub band_low: f64,
    pub band_high: f64,
    /// Highest first; the first non-WAIT bias wins.
    pub bias_timeframes: Vec<Timeframe>,
}

impl Default for TrendRules {
    fn default() -> Self {
        Self {
            midline: 50.0,
            band_low: 40.0,
            band_high: 60.0,
            bias_timeframes: vec![Timeframe::D1, Timeframe::H4, Timeframe::H1, Timeframe::M15],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendLabel {
    #[serde(rename = "A")]
    pub midline: MidlineTrend,
    #[serde(rename = "B")]
    pub band: BandTrend,
    pub bias: Bias,
    pub reasons: Vec<String>,
}

impl TrendLabel {
    pub fn unknown() -> Self {
        Self {
            midline: MidlineTrend::Unknown,
            band: BandTrend::Unknown,
            bias: Bias::Wait,
            reasons: Vec::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.band == BandTrend::Unknown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub labels: BTreeMap<Timeframe, TrendLabel>,
    pub overall_bias: Bias,
    /// Frames without usable indicator values or without data at all.
    pub missing: Vec<Timeframe>,
    pub errors: Vec<String>,
}

impl TrendReport {
    pub fn label(&self, timeframe: Timeframe) -> Option<&TrendLabel> {
        self.labels.get(&timeframe)
    }

    /// Bias of `timeframe`, WAIT when it has no label.
    pub fn bias(&self, timeframe: Timeframe) -> Bias {
        self.label(timeframe).map_or(Bias::Wait, |l| l.bias)
    }

    pub fn band(&self, timeframe: Timeframe) -> BandTrend {
        self.label(timeframe).map_or(BandTrend::Unknown, |l| l.band)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrendClassifier {
    rules: TrendRules,
    lengths: IndicatorLengths,
}

impl TrendClassifier {
    pub fn new(rules: TrendRules, lengths: IndicatorLengths) -> Self {
        Self { rules, lengths }
    }

    pub fn rules(&self) -> &TrendRules {
        &self.rules
    }

    /// UNKNOWN/WAIT unless all three inputs are present.
    pub fn classify(&self, triple: &IndicatorTriple) -> TrendLabel {
        let Some((rsi, ema, wma)) = triple.values() else {
            return TrendLabel::unknown();
        };
        let rules = &self.rules;
        let rising = ema > wma;
        let falling = ema < wma;

        let midline = if rsi > rules.midline && rising {
            MidlineTrend::Up
        } else if rsi < rules.midline && falling {
            MidlineTrend::Down
        } else {
            MidlineTrend::Range
        };

        let band = if rsi > rules.band_high && rising {
            BandTrend::StrongUp
        } else if rsi < rules.band_low && falling {
            BandTrend::StrongDown
        } else {
            BandTrend::Neutral
        };

        let bias = match (band, midline) {
            (BandTrend::StrongUp, _) => Bias::BuyBias,
            (BandTrend::StrongDown, _) => Bias::SellBias,
            (_, MidlineTrend::Up) => Bias::BuyBiasWeak,
            (_, MidlineTrend::Down) => Bias::SellBiasWeak,
            _ => Bias::Wait,
        };

        let l = &self.lengths;
        TrendLabel {
            midline,
            band,
            bias,
            reasons: vec![
                format!("RSI{}={:.2}", l.rsi, rsi),
                format!("EMA{}(RSI)={:.2} vs WMA{}(RSI)={:.2}", l.ema, ema, l.wma, wma),
            ],
        }
    }

    /// First non-WAIT bias over `bias_timeframes`, else WAIT.
    pub fn overall_bias(&self, labels: &BTreeMap<Timeframe, TrendLabel>) -> Bias {
        self.rules
            .bias_timeframes
            .iter()
            .filter_map(|tf| labels.get(tf))
            .map(|label| label.bias)
            .find(|&bias| bias != Bias::Wait)
            .unwrap_or(Bias::Wait)
    }

    /// Label every frame; incomplete triples become UNKNOWN and are reported.
    pub fn report(&self, triples: &BTreeMap<Timeframe, IndicatorTriple>) -> TrendReport {
        let mut labels = BTreeMap::new();
        let mut missing = Vec::new();
        let mut errors = Vec::new();

        for (&timeframe, triple) in triples {
            let label = self.classify(triple);
            if label.is_unknown() {
                missing.push(timeframe);
                errors.push(format!("{timeframe}: missing indicator values"));
            } else {
                debug!(%timeframe, bias = %label.bias, ?triple, "classified");
            }
            labels.insert(timeframe, label);
        }

        let overall_bias = self.overall_bias(&labels);
        TrendReport {
            labels,
            overall_bias,
            missing,
            errors,
        }
    }
}
