//! Candle timeframes and their relative weights.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Supported candle intervals.
///
/// Variant order is highest to lowest, so `Ord` and any `BTreeMap<Timeframe, _>`
/// iterate higher timeframes first. The cross-timeframe bias scan relies on this.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Timeframe {
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "5m")]
    M5,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown timeframe '{0}'")]
pub struct TimeframeParseError(pub String);

impl Timeframe {
    pub const ALL: [Timeframe; 6] = [
        Timeframe::D1,
        Timeframe::H4,
        Timeframe::H1,
        Timeframe::M30,
        Timeframe::M15,
        Timeframe::M5,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::D1 => "1d",
            Timeframe::H4 => "4h",
            Timeframe::H1 => "1h",
            Timeframe::M30 => "30m",
            Timeframe::M15 => "15m",
            Timeframe::M5 => "5m",
        }
    }

    pub fn minutes(self) -> u32 {
        match self {
            Timeframe::D1 => 1440,
            Timeframe::H4 => 240,
            Timeframe::H1 => 60,
            Timeframe::M30 => 30,
            Timeframe::M15 => 15,
            Timeframe::M5 => 5,
        }
    }

    /// Zone strength contributed by a single pivot on this timeframe.
    pub fn weight(self) -> f64 {
        match self {
            Timeframe::D1 => 4.0,
            Timeframe::H4 => 3.0,
            Timeframe::H1 => 2.0,
            Timeframe::M30 | Timeframe::M15 | Timeframe::M5 => 1.0,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TimeframeParseError(s.to_string()))
    }
}
