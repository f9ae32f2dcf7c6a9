//! Append-only measurement log
//!
//! The file uses the TinyDB document layout so that existing history
//! stays readable:
//!
//! ```json
//! {"_default": {"1": {"data": {...}, "tweeted": false, "timestamp": 1700000000.0}}}
//! ```
//!
//! Document ids ascend; a new record gets the largest id plus one. The
//! whole file is rewritten on every insert. Tables other than `_default`
//! are carried through untouched.

use crate::{
    error::{AppError, ErrorContext, Result},
    models::MeasurementRecord,
    stats,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    /// Keyed by the decimal document id
    #[serde(rename = "_default", default)]
    documents: BTreeMap<String, serde_json::Value>,

    #[serde(flatten)]
    other_tables: BTreeMap<String, serde_json::Value>,
}

/// Measurement log backed by one JSON file
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    file: StoreFile,
    records: Vec<MeasurementRecord>,
    malformed: usize,
}

impl RecordStore {
    /// Open the log at `path`. A missing or empty file is an empty log.
    pub fn open(path: &Path) -> Result<Self> {
        let file = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read measurement log '{}'", path.display()))?;

            if content.trim().is_empty() {
                StoreFile::default()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    AppError::store(format!("Measurement log '{}' is not valid: {}", path.display(), e))
                })?
            }
        } else {
            StoreFile::default()
        };

        let mut numbered = Vec::with_capacity(file.documents.len());
        let mut malformed = 0;
        for (key, document) in &file.documents {
            let id = key.parse::<u64>().ok();
            match (id, serde_json::from_value::<MeasurementRecord>(document.clone())) {
                (Some(id), Ok(record)) => numbered.push((id, record)),
                _ => malformed += 1,
            }
        }
        numbered.sort_by_key(|(id, _)| *id);
        let records = numbered.into_iter().map(|(_, record)| record).collect();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            records,
            malformed,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Documents that could not be read as records; they are kept on disk
    pub fn malformed_count(&self) -> usize {
        self.malformed
    }

    /// All readable records in id order
    pub fn records(&self) -> &[MeasurementRecord] {
        &self.records
    }

    /// Records newer than `now - window`
    pub fn recent(&self, now: f64, window: Duration) -> Vec<MeasurementRecord> {
        stats::within_window(&self.records, now, window)
    }

    /// Append a record and rewrite the file; returns the new document id
    pub fn insert(&mut self, record: MeasurementRecord) -> Result<u64> {
        let id = self.next_id();
        let key = id.to_string();
        let document = serde_json::to_value(&record)?;

        self.file.documents.insert(key.clone(), document);
        if let Err(e) = self.flush() {
            self.file.documents.remove(&key);
            return Err(e);
        }

        self.records.push(record);
        Ok(id)
    }

    fn next_id(&self) -> u64 {
        self.file
            .documents
            .keys()
            .filter_map(|key| key.parse::<u64>().ok())
            .max()
            .map_or(1, |last| last + 1)
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory '{}'", parent.display()))?;
        }

        let json = serde_json::to_string(&self.file)?;

        // Write beside the log, then rename over it
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write measurement log '{}'", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace measurement log '{}'", self.path.display()))
    }
}
