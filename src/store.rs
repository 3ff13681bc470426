use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::model::FailureRecord;

/// Which file of a run a store operation addresses. Each run has one
/// primary file and at most one sidecar ledger per failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Records,
    ScrapeFails,
    CmsFails,
}

impl Stage {
    fn suffix(self) -> &'static str {
        match self {
            Stage::Records => "",
            Stage::ScrapeFails => "-SCRAPE-FAILS",
            Stage::CmsFails => "-CMS-FAILS",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no data file at {0}")]
    NotFound(PathBuf),
    #[error("data file {path} is corrupt: {detail}")]
    Corrupt { path: PathBuf, detail: String },
    #[error("another writer holds the lock for {0}")]
    Locked(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// JSON-array file store for one (company, run) pair.
///
/// Files live under `{data_dir}/{company}/json_data/` and are always a
/// single top-level JSON array. Appends are whole-file read-modify-write,
/// so the file is valid JSON at rest after every operation. One store
/// instance per run name at a time; a lock file makes a second
/// concurrent writer fail fast instead of interleaving rewrites.
pub struct RecordStore {
    company_dir: PathBuf,
    run_name: String,
}

impl RecordStore {
    pub fn new(data_dir: impl AsRef<Path>, company: &str, run_name: &str) -> Self {
        Self {
            company_dir: data_dir.as_ref().join(company),
            run_name: run_name.to_string(),
        }
    }

    pub fn path(&self, stage: Stage) -> PathBuf {
        self.company_dir
            .join("json_data")
            .join(format!("{}{}.json", self.run_name, stage.suffix()))
    }

    /// Reset the file for a stage to an empty array, creating parent
    /// directories as needed. Destructive: existing content is gone.
    /// Callers run this only at the start of a fresh pass.
    pub fn create(&self, stage: Stage) -> Result<(), StoreError> {
        let path = self.path(stage);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, "[]")?;
        debug!(path = %path.display(), "initialized data file");
        Ok(())
    }

    /// Append one element to the stage's array. The file must already
    /// exist (see [`create`](Self::create)); the whole array is decoded,
    /// extended and rewritten under the run's lock.
    pub fn append<T: Serialize>(&self, stage: Stage, value: &T) -> Result<(), StoreError> {
        let path = self.path(stage);
        let _lock = LockFile::acquire(&path)?;
        let mut items = read_array(&path)?;
        items.push(
            serde_json::to_value(value).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                detail: e.to_string(),
            })?,
        );
        let encoded = serde_json::to_string(&items).map_err(|e| StoreError::Corrupt {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        fs::write(&path, encoded)?;
        Ok(())
    }

    /// Decode the stage's full array. A missing file is reported as
    /// [`StoreError::NotFound`], the signal that no data (or no
    /// failures) of this kind exists yet. Anything unparseable is
    /// [`StoreError::Corrupt`] and must abort the pass.
    pub fn read_all<T: DeserializeOwned>(&self, stage: Stage) -> Result<Vec<T>, StoreError> {
        let path = self.path(stage);
        let items = read_array(&path)?;
        items
            .into_iter()
            .map(|v| {
                serde_json::from_value(v).map_err(|e| StoreError::Corrupt {
                    path: path.clone(),
                    detail: e.to_string(),
                })
            })
            .collect()
    }

    /// Does a failure ledger exist for this run? Missing file means no
    /// failures; any other error (corrupt file, I/O) propagates.
    pub fn has_failures(&self, stage: Stage) -> Result<bool, StoreError> {
        match self.read_all::<serde_json::Value>(stage) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Record one failure in the stage's ledger, creating the ledger
    /// file on first use.
    pub fn record_failure(&self, stage: Stage, failure: &FailureRecord) -> Result<(), StoreError> {
        match self.read_all::<serde_json::Value>(stage) {
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => self.create(stage)?,
            Err(e) => return Err(e),
        }
        self.append(stage, failure)
    }

    /// Seed URLs for this company: `{company}/urls.csv`, one URL per
    /// line, no header. Blank lines are skipped.
    pub fn url_list(&self) -> Result<Vec<String>, StoreError> {
        let path = self.company_dir.join("urls.csv");
        let text = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StoreError::NotFound(path.clone())
            } else {
                StoreError::Io(e)
            }
        })?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

fn read_array(path: &Path) -> Result<Vec<serde_json::Value>, StoreError> {
    let text = fs::read_to_string(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            StoreError::NotFound(path.to_path_buf())
        } else {
            StoreError::Io(e)
        }
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    match value {
        serde_json::Value::Array(items) => Ok(items),
        other => Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            detail: format!("expected a JSON array, found {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Exclusive marker for one data file's read-modify-write cycle.
/// Created with `create_new` so a second writer errors instead of
/// silently interleaving, and removed when the guard drops.
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    fn acquire(data_path: &Path) -> Result<Self, StoreError> {
        let path = data_path.with_extension("json.lock");
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::Locked(data_path.to_path_buf()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
