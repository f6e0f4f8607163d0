//! Where a market snapshot comes from: a JSON file or stdin (`-`).

use anyhow::{Context, Result};
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use mtfbot_core::snapshot::MarketSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    File(PathBuf),
    Stdin,
}

impl FromStr for SnapshotSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s == "-" {
            SnapshotSource::Stdin
        } else {
            SnapshotSource::File(PathBuf::from(s))
        })
    }
}

impl fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotSource::File(path) => write!(f, "{}", path.display()),
            SnapshotSource::Stdin => f.write_str("<stdin>"),
        }
    }
}

impl SnapshotSource {
    fn read_to_string(&self) -> Result<String> {
        match self {
            SnapshotSource::File(path) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read snapshot {}", path.display())),
            SnapshotSource::Stdin => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("failed to read snapshot from stdin")?;
                Ok(buf)
            }
        }
    }

    /// Read and parse the snapshot. Frames that fail validation are dropped
    /// by the parser and listed on the result.
    pub fn load(&self) -> Result<MarketSnapshot> {
        let json = self.read_to_string()?;
        let snapshot = MarketSnapshot::from_json(&json)
            .with_context(|| format!("invalid snapshot from {self}"))?;

        info!(
            source = %self,
            symbol = %snapshot.symbol,
            frames = snapshot.frames.len(),
            dropped = snapshot.dropped.len(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }
}
