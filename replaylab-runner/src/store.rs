//! Result stores: where finished backtests are kept.
//!
//! Ids are content hashes of the serialized result, so saving the same result
//! twice yields the same id and stores it once.
//!
//! Two implementations:
//! - `InMemoryResultStore`: process-local, for tests and batch sessions.
//! - `JsonlResultStore`: append-only JSON-lines file, one result per line.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runner::BacktestResult;

/// Content hash of a stored result (hex-encoded blake3).
pub type ResultId = String;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Persistence for finished runs.
pub trait ResultStore: Send + Sync {
    /// Persist a result and return its id.
    fn save(&self, result: &BacktestResult) -> Result<ResultId, StoreError>;

    fn find_by_id(&self, id: &str) -> Result<Option<BacktestResult>, StoreError>;

    /// Results whose run timestamp lies in `[start, end]`, most recent first.
    fn find_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BacktestResult>, StoreError>;
}

/// Compute the content id of a result.
pub fn result_id(result: &BacktestResult) -> Result<ResultId, StoreError> {
    let json = serde_json::to_string(result)?;
    Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
}

/// Filter to `[start, end]` and order most recent first. Ties keep insertion
/// order.
fn select_range(
    entries: impl IntoIterator<Item = BacktestResult>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<BacktestResult> {
    let mut out: Vec<BacktestResult> = entries
        .into_iter()
        .filter(|r| r.run_timestamp >= start && r.run_timestamp <= end)
        .collect();
    out.sort_by(|a, b| b.run_timestamp.cmp(&a.run_timestamp));
    out
}

// ─── In-memory ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    entries: RwLock<Vec<(ResultId, BacktestResult)>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entries.read().map_err(|_| StoreError::Poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl ResultStore for InMemoryResultStore {
    fn save(&self, result: &BacktestResult) -> Result<ResultId, StoreError> {
        let id = result_id(result)?;
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        if !entries.iter().any(|(existing, _)| *existing == id) {
            entries.push((id.clone(), result.clone()));
        }
        Ok(id)
    }

    fn find_by_id(&self, id: &str) -> Result<Option<BacktestResult>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, r)| r.clone()))
    }

    fn find_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BacktestResult>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(select_range(
            entries.iter().map(|(_, r)| r.clone()),
            start,
            end,
        ))
    }
}

// ─── JSONL file ─────────────────────────────────────────────────────

/// One line of the store file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResult {
    pub id: ResultId,
    pub result: BacktestResult,
}

/// Append-only JSON-lines result file.
///
/// Each line is an independent JSON object, so a partial write only loses the
/// last line. Malformed lines are skipped on read.
pub struct JsonlResultStore {
    path: PathBuf,
    write_lock: RwLock<()>,
}

impl JsonlResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every well-formed entry, in file order.
    pub fn read_all(&self) -> Result<Vec<StoredResult>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path)?;
        let reader = io::BufReader::new(file);
        let mut entries = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredResult>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = line_no + 1,
                        error = %e,
                        "skipping malformed store line"
                    );
                }
            }
        }

        Ok(entries)
    }
}

impl ResultStore for JsonlResultStore {
    fn save(&self, result: &BacktestResult) -> Result<ResultId, StoreError> {
        let _guard = self.write_lock.write().map_err(|_| StoreError::Poisoned)?;
        let id = result_id(result)?;
        if self.read_all()?.iter().any(|e| e.id == id) {
            return Ok(id);
        }

        let line = serde_json::to_string(&StoredResult {
            id: id.clone(),
            result: result.clone(),
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        file.flush()?;

        tracing::debug!(id = %id, path = %self.path.display(), "saved result");
        Ok(id)
    }

    fn find_by_id(&self, id: &str) -> Result<Option<BacktestResult>, StoreError> {
        let _guard = self.write_lock.read().map_err(|_| StoreError::Poisoned)?;
        Ok(self
            .read_all()?
            .into_iter()
            .find(|e| e.id == id)
            .map(|e| e.result))
    }

    fn find_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BacktestResult>, StoreError> {
        let _guard = self.write_lock.read().map_err(|_| StoreError::Poisoned)?;
        Ok(select_range(
            self.read_all()?.into_iter().map(|e| e.result),
            start,
            end,
        ))
    }
}
