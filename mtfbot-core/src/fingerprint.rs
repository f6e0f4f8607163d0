//! Rule-set fingerprinting.
//!
//! Every journal row carries the hash of the rules that produced it, so rows
//! written under different thresholds or windows can be told apart later.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decision::DecisionConfig;
use crate::indicators::IndicatorLengths;
use crate::trend::TrendRules;
use crate::zones::ZoneConfig;

/// BLAKE3 of the canonical JSON of a [`StrategyConfig`], hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RulesHash(String);

impl RulesHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 16 hex digits, enough to tell rule sets apart in a journal.
    pub fn short(&self) -> &str {
        &self.0[..16.min(self.0.len())]
    }
}

impl fmt::Display for RulesHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Every parameter that influences a decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub indicators: IndicatorLengths,
    pub trend: TrendRules,
    pub zones: ZoneConfig,
    pub decision: DecisionConfig,
}

impl StrategyConfig {
    /// Struct fields serialize in declaration order and there are no maps, so
    /// the JSON is deterministic.
    pub fn rules_hash(&self) -> Result<RulesHash, serde_json::Error> {
        let json = serde_json::to_vec(self)?;
        Ok(RulesHash::from_bytes(&json))
    }
}
