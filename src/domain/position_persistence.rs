//! Position Persistence
//!
//! Crash recovery for the position state machine. The record is written
//! after every committed transition and read once before the first cycle,
//! so a restart never resumes with a stale default state.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use super::position::{PositionRecord, PositionState};
use crate::ports::state_store::StateStore;

/// Default position file name
pub const DEFAULT_STATE_FILE: &str = "position_state.json";

const FORMAT_VERSION: u32 = 1;

#[derive(Error, Debug, Clone)]
pub enum PersistError {
    #[error("Failed to serialize position: {0}")]
    SerializationError(String),

    #[error("Failed to deserialize position: {0}")]
    DeserializationError(String),

    #[error("Failed to write position file: {0}")]
    WriteError(String),

    #[error("Failed to read position file: {0}")]
    ReadError(String),

    #[error("Position file is corrupted: {0}")]
    CorruptedFile(String),

    #[error("Failed to create directory: {0}")]
    DirectoryError(String),

    #[error("Position file belongs to pair {found}, expected {expected}")]
    PairMismatch { expected: String, found: String },
}

/// On-disk envelope around the position record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    /// "SYMBOL_A/SYMBOL_B" the record was written for
    pub pair: String,
    pub record: PositionRecord,
}

impl PersistedState {
    pub fn new(pair: String, record: PositionRecord) -> Self {
        Self {
            version: FORMAT_VERSION,
            pair,
            record,
        }
    }

    /// Save to disk via a temp file and rename, so a crash mid-write leaves
    /// the previous file intact
    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| PersistError::DirectoryError(e.to_string()))?;
            }
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| PersistError::SerializationError(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        let mut file = File::create(&tmp).map_err(|e| PersistError::WriteError(e.to_string()))?;
        file.write_all(content.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| PersistError::WriteError(e.to_string()))?;
        drop(file);
        fs::rename(&tmp, path).map_err(|e| PersistError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Load from disk. A missing file is `Ok(None)`; an empty one is corrupt.
    pub fn load(path: &Path) -> Result<Option<Self>, PersistError> {
        if !path.exists() {
            return Ok(None);
        }

        let content =
            fs::read_to_string(path).map_err(|e| PersistError::ReadError(e.to_string()))?;

        if content.trim().is_empty() {
            return Err(PersistError::CorruptedFile("empty position file".to_string()));
        }

        let state: Self = serde_json::from_str(&content)
            .map_err(|e| PersistError::DeserializationError(e.to_string()))?;

        state.validate()?;
        Ok(Some(state))
    }

    fn validate(&self) -> Result<(), PersistError> {
        if self.version != FORMAT_VERSION {
            return Err(PersistError::CorruptedFile(format!(
                "unsupported format version {}",
                self.version
            )));
        }
        match self.record.state {
            PositionState::None => {
                if self.record.entry_zscore.is_some() {
                    return Err(PersistError::CorruptedFile(
                        "flat record carries an entry z-score".to_string(),
                    ));
                }
            }
            PositionState::HoldingA | PositionState::HoldingB => {
                if let Some(z) = self.record.entry_zscore {
                    if !z.is_finite() {
                        return Err(PersistError::CorruptedFile(
                            "non-finite entry z-score".to_string(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// JSON file backed state store
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
    pair: String,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>, pair: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            pair: pair.into(),
        }
    }

    /// Store at the default file name inside `data_dir`
    pub fn in_dir(data_dir: &Path, pair: impl Into<String>) -> Self {
        Self::new(data_dir.join(DEFAULT_STATE_FILE), pair)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load_state(&self) -> Result<PositionRecord, PersistError> {
        match PersistedState::load(&self.path)? {
            Some(state) => {
                if state.pair != self.pair {
                    return Err(PersistError::PairMismatch {
                        expected: self.pair.clone(),
                        found: state.pair,
                    });
                }
                tracing::info!(
                    "Position state loaded: {} (entry z: {:?})",
                    state.record.state,
                    state.record.entry_zscore
                );
                Ok(state.record)
            }
            None => {
                tracing::info!(
                    "No persisted state at {}, starting flat",
                    self.path.display()
                );
                Ok(PositionRecord::flat())
            }
        }
    }

    fn save_state(&self, record: &PositionRecord) -> Result<(), PersistError> {
        let mut record = *record;
        if record.updated_at.is_none() {
            record.updated_at = Some(Utc::now());
        }
        PersistedState::new(self.pair.clone(), record).save(&self.path)?;
        tracing::debug!("Position state saved: {} -> {}", record.state, self.path.display());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State store held in memory, for backtests and tests.
///
/// Clones share the same record, so a handle kept outside the decision loop
/// sees every save.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    record: Arc<Mutex<PositionRecord>>,
    saves: Arc<Mutex<Vec<PositionRecord>>>,
    fail_saves: Arc<Mutex<bool>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a record, as if written by an earlier run
    pub fn with_record(record: PositionRecord) -> Self {
        let store = Self::default();
        *lock(&store.record) = record;
        store
    }

    /// Toggle failure of subsequent saves
    pub fn set_fail_saves(&self, fail: bool) {
        *lock(&self.fail_saves) = fail;
    }

    /// Last successfully saved record
    pub fn current(&self) -> PositionRecord {
        *lock(&self.record)
    }

    /// Every successfully saved record, in order
    pub fn saves(&self) -> Vec<PositionRecord> {
        lock(&self.saves).clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load_state(&self) -> Result<PositionRecord, PersistError> {
        Ok(*lock(&self.record))
    }

    fn save_state(&self, record: &PositionRecord) -> Result<(), PersistError> {
        if *lock(&self.fail_saves) {
            return Err(PersistError::WriteError("simulated write failure".to_string()));
        }
        *lock(&self.record) = *record;
        lock(&self.saves).push(*record);
        Ok(())
    }
}
