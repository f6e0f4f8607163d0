//! Persisted `AccountState`: atomic JSON writes, an advisory lock file, and a
//! compare-and-swap on the last processed candle before committing.
//!
//! A missing or unreadable state file is a first run, not an error.

use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, warn};

use mtfbot_core::domain::AccountState;

/// Locks older than this are assumed to belong to a crashed run.
pub const STALE_LOCK_AFTER: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("state is locked by another run ({0})")]
    Locked(PathBuf),

    #[error("state changed on disk since it was loaded (expected last candle {expected:?}, found {found:?})")]
    Conflict {
        expected: Option<DateTime<Utc>>,
        found: Option<DateTime<Utc>>,
    },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StateError + '_ {
    move |source| StateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Held for the duration of a cycle; removes the lock file on drop.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove state lock");
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    initial: AccountState,
}

impl StateStore {
    /// `initial` is returned by `load` when there is no usable state file.
    pub fn new(path: impl Into<PathBuf>, initial: AccountState) -> Self {
        Self {
            path: path.into(),
            initial,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    fn ensure_parent(&self) -> Result<(), StateError> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                fs::create_dir_all(dir).map_err(io_err(dir))
            }
            _ => Ok(()),
        }
    }

    /// Read the state file, or `None` when it is absent or corrupt.
    fn read(&self) -> Option<AccountState> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state unreadable; using defaults");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state corrupt; using defaults");
                None
            }
        }
    }

    /// Current state, falling back to the initial state.
    pub fn load(&self) -> AccountState {
        self.read().unwrap_or_else(|| {
            debug!(path = %self.path.display(), "no state file; first run");
            self.initial.clone()
        })
    }

    /// Write the whole state to a temp file, then rename it into place.
    pub fn save(&self, state: &AccountState) -> Result<(), StateError> {
        self.ensure_parent()?;
        let mut json = serde_json::to_string_pretty(state)?;
        json.push('\n');

        let tmp = self.tmp_path();
        fs::write(&tmp, json).map_err(io_err(&tmp))?;
        fs::rename(&tmp, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            StateError::Io {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// Save `next` only if the file still holds the last processed candle
    /// that `loaded` had.
    pub fn commit(&self, loaded: &AccountState, next: &AccountState) -> Result<(), StateError> {
        let found = self.read().and_then(|s| s.last_processed_candle);
        if found != loaded.last_processed_candle {
            return Err(StateError::Conflict {
                expected: loaded.last_processed_candle,
                found,
            });
        }
        self.save(next)
    }

    /// Take the advisory lock. A lock older than [`STALE_LOCK_AFTER`] is
    /// taken over with a warning.
    pub fn lock(&self) -> Result<StateLock, StateError> {
        self.ensure_parent()?;
        let path = self.lock_path();
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "pid={} at={}", std::process::id(), Utc::now().to_rfc3339());
                    return Ok(StateLock { path });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if !is_stale(&path) {
                        return Err(StateError::Locked(path));
                    }
                    warn!(path = %path.display(), "removing stale state lock");
                    fs::remove_file(&path).map_err(io_err(&path))?;
                }
                Err(e) => return Err(io_err(&path)(e)),
            }
        }
        Err(StateError::Locked(path))
    }
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AFTER)
}
