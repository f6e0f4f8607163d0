use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Timeframe;

/// Direction of a tracked position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LONG" => Ok(Side::Long),
            "SHORT" => Ok(Side::Short),
            _ => Err(format!("unknown side '{s}' (expected LONG or SHORT)")),
        }
    }
}

/// The price level the stop-loss was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorRef {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Hypothetical position tracked by the decision state machine.
///
/// Alert-only: nothing here was ever sent to an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    #[serde(rename = "tf", default = "default_timeframe")]
    pub timeframe: Timeframe,
    #[serde(rename = "entry")]
    pub entry_price: f64,
    #[serde(rename = "sl")]
    pub stop_loss: f64,
    #[serde(rename = "size", alias = "size_btc")]
    pub size_in_base: f64,
    #[serde(rename = "opened_ts_utc")]
    pub opened_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<AnchorRef>,
}

fn default_timeframe() -> Timeframe {
    Timeframe::M15
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn short() -> Position {
        Position {
            side: Side::Short,
            timeframe: Timeframe::M15,
            entry_price: 100.0,
            stop_loss: 104.0,
            size_in_base: 2.5,
            opened_at: Utc.with_ymd_and_hms(2026, 1, 31, 6, 0, 0).unwrap(),
            anchor: None,
        }
    }

    #[test]
    fn serializes_with_state_file_names() {
        let json = serde_json::to_value(short()).unwrap();
        assert_eq!(json["side"], "SHORT");
        assert_eq!(json["tf"], "15m");
        assert_eq!(json["sl"], 104.0);
        assert!(json.get("anchor").is_none());
    }

    #[test]
    fn side_parses_case_insensitively() {
        assert_eq!("short".parse::<Side>(), Ok(Side::Short));
        assert_eq!("LONG".parse::<Side>(), Ok(Side::Long));
        assert!("flat".parse::<Side>().is_err());
    }

    #[test]
    fn accepts_legacy_size_field() {
        let json = r#"{"side":"LONG","tf":"15m","entry":10.0,"sl":9.0,"size_btc":0.5,"opened_ts_utc":"2026-01-31T06:00:00Z"}"#;
        let pos: Position = serde_json::from_str(json).unwrap();
        assert_eq!(pos.side, Side::Long);
        assert_eq!(pos.size_in_base, 0.5);
    }
}
