//! mtfbot runner: the collaborators around the pure core.
//!
//! This crate builds on `mtfbot-core` to provide:
//! - TOML configuration with reference defaults
//! - Snapshot loading from a file or stdin
//! - State store with atomic writes, an advisory lock and corrupt-file fallback
//! - Append-only CSV decision journal
//! - One-cycle orchestration, external-decision apply, and the context report

pub mod apply;
pub mod config;
pub mod context;
pub mod cycle;
pub mod journal;
pub mod source;
pub mod state_store;

pub use apply::{apply, ApplyAction, ApplyError, ApplyReport, ApplyRequest};
pub use config::{BotConfig, ConfigError};
pub use context::{build_context, ContextReport, HistoryRow};
pub use cycle::{run_once, CycleReport};
pub use journal::{Journal, JournalError};
pub use source::SnapshotSource;
pub use state_store::{StateError, StateLock, StateStore};
