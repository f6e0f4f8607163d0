//! mtfbot CLI: one-shot commands around the multi-timeframe decision bot.
//!
//! Commands:
//! - `run`: evaluate the latest trigger candle, journal and persist state
//! - `analyze`: trend and zone reports only, no state access
//! - `context`: read-only context bundle for an external decision maker
//! - `apply`: record an externally decided OPEN / CLOSE / NOOP
//! - `signal`: EMA/WMA crossover alert on one timeframe
//! - `state show`: print the persisted account state
//!
//! Reports go to stdout as JSON; logs go to stderr (`RUST_LOG` filters them).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use mtfbot_core::crossover::crossover_signal;
use mtfbot_core::domain::{Side, Timeframe};
use mtfbot_core::indicators::IndicatorTriple;
use mtfbot_core::pipeline::Pipeline;
use mtfbot_core::trend::Bias;
use mtfbot_runner::{
    apply, build_context, run_once, ApplyAction, ApplyRequest, BotConfig, SnapshotSource,
    StateStore,
};

#[derive(Parser)]
#[command(
    name = "mtfbot",
    about = "Multi-timeframe RSI trend bot: zones, trend labels and alert-only position decisions"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to the built-in rule set.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one decision cycle on the latest trigger candle.
    Run {
        /// Snapshot JSON file, or `-` for stdin.
        #[arg(long)]
        snapshot: SnapshotSource,
    },
    /// Print trend and zone reports without touching state.
    Analyze {
        /// Snapshot JSON file, or `-` for stdin.
        #[arg(long)]
        snapshot: SnapshotSource,
    },
    /// Print the context report (trend, zones, history, levels, state).
    Context {
        /// Snapshot JSON file, or `-` for stdin.
        #[arg(long)]
        snapshot: SnapshotSource,
    },
    /// Record an externally decided action.
    Apply {
        /// OPEN, CLOSE or NOOP.
        #[arg(long)]
        action: ApplyAction,

        /// Timestamp of the candle the decision was made on (RFC 3339).
        #[arg(long)]
        candle_ts: DateTime<Utc>,

        /// LONG or SHORT (required for OPEN).
        #[arg(long)]
        side: Option<Side>,

        /// Managed timeframe. Defaults to the trigger timeframe.
        #[arg(long = "tf")]
        timeframe: Option<Timeframe>,

        #[arg(long)]
        entry: Option<f64>,

        #[arg(long)]
        sl: Option<f64>,

        /// Position size in the base asset.
        #[arg(long)]
        size: Option<f64>,

        #[arg(long, default_value = "")]
        notes: String,

        /// Trigger-timeframe RSI at decision time.
        #[arg(long)]
        rsi: Option<f64>,

        #[arg(long)]
        ema_rsi: Option<f64>,

        #[arg(long)]
        wma_rsi: Option<f64>,

        /// Trigger-timeframe bias at decision time, e.g. SELL_BIAS.
        #[arg(long)]
        bias: Option<Bias>,
    },
    /// Evaluate the EMA/WMA crossover alert.
    Signal {
        /// Snapshot JSON file, or `-` for stdin.
        #[arg(long)]
        snapshot: SnapshotSource,

        /// Timeframe to evaluate. Defaults to the configured signal timeframe.
        #[arg(long)]
        timeframe: Option<Timeframe>,
    },
    /// Persisted state commands.
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Print the persisted account state (defaults when none exists).
    Show,
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("mtfbot=info".parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize report")?;
    println!("{json}");
    Ok(())
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();
    let config = BotConfig::load(cli.config.as_deref())
        .with_context(|| match &cli.config {
            Some(path) => format!("failed to load config {}", path.display()),
            None => "invalid built-in config".to_string(),
        })?;
    debug!(config = ?cli.config, symbol = %config.market.symbol, "config loaded");
    let now = Utc::now();

    match cli.command {
        Commands::Run { snapshot } => {
            let snapshot = snapshot.load()?;
            print_json(&run_once(&config, &snapshot, now)?)
        }
        Commands::Analyze { snapshot } => {
            let snapshot = snapshot.load()?;
            let pipeline = Pipeline::new(config.strategy())?;
            print_json(&pipeline.analyze(&snapshot)?)
        }
        Commands::Context { snapshot } => {
            let snapshot = snapshot.load()?;
            print_json(&build_context(&config, &snapshot, now)?)
        }
        Commands::Apply {
            action,
            candle_ts,
            side,
            timeframe,
            entry,
            sl,
            size,
            notes,
            rsi,
            ema_rsi,
            wma_rsi,
            bias,
        } => {
            let req = ApplyRequest {
                side,
                timeframe,
                entry,
                sl,
                size,
                notes,
                indicators: IndicatorTriple {
                    rsi,
                    ema_of_rsi: ema_rsi,
                    wma_of_rsi: wma_rsi,
                },
                bias,
                ..ApplyRequest::new(action, candle_ts)
            };
            print_json(&apply(&config, &req, now)?)
        }
        Commands::Signal {
            snapshot,
            timeframe,
        } => {
            let snapshot = snapshot.load()?;
            let mut signal_config = config.signal.clone();
            if let Some(tf) = timeframe {
                signal_config.timeframe = tf;
            }
            let candles = snapshot.candles(signal_config.timeframe);
            print_json(&crossover_signal(candles, &signal_config))
        }
        Commands::State {
            action: StateAction::Show,
        } => {
            let store = StateStore::new(&config.paths.state, config.account.initial_state());
            print_json(&store.load())
        }
    }
}
