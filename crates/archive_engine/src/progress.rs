use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use archive_core::{HarvestOutcome, JobKey, ProgressRecord};
use archive_logging::{harvest_debug, harvest_info, harvest_warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("failed to read progress file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("progress path {0} has no file name")]
    InvalidPath(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PersistedMonth {
    year: u32,
    month: String,
    has_text: bool,
    has_scan: bool,
    text_source: Option<String>,
    scan_source: Option<String>,
}

impl From<&ProgressRecord> for PersistedMonth {
    fn from(record: &ProgressRecord) -> Self {
        Self {
            year: record.key.year,
            month: record.key.month.clone(),
            has_text: record.has_text,
            has_scan: record.has_scan,
            text_source: record.text_source.clone(),
            scan_source: record.scan_source.clone(),
        }
    }
}

impl From<&PersistedMonth> for ProgressRecord {
    fn from(month: &PersistedMonth) -> Self {
        Self {
            key: JobKey::new(month.year, month.month.clone()),
            has_text: month.has_text,
            has_scan: month.has_scan,
            text_source: month.text_source.clone(),
            scan_source: month.scan_source.clone(),
        }
    }
}

/// `"<year>" -> "<month>" -> record`, matching the JSON layout on disk.
type Document = BTreeMap<String, BTreeMap<String, PersistedMonth>>;

/// Durable record of which issues have been harvested.
///
/// The whole document is rewritten on every `record`; a failed write leaves
/// both the file and the in-memory view as they were.
#[derive(Debug)]
pub struct ProgressStore {
    writer: AtomicFileWriter,
    filename: String,
    path: PathBuf,
    document: Document,
}

impl ProgressStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ProgressError> {
        let path = path.into();
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| ProgressError::InvalidPath(path.clone()))?;
        let dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let document = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Document>(&raw) {
                Ok(document) => {
                    harvest_info!(
                        "Loaded progress for {} issues from {}",
                        document.values().map(BTreeMap::len).sum::<usize>(),
                        path.display()
                    );
                    document
                }
                Err(err) => {
                    harvest_warn!(
                        "Progress file {} is unreadable ({}); starting from scratch",
                        path.display(),
                        err
                    );
                    Document::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                harvest_debug!("No progress file at {}", path.display());
                Document::new()
            }
            Err(source) => return Err(ProgressError::Read { path, source }),
        };

        Ok(Self {
            writer: AtomicFileWriter::new(dir),
            filename,
            path,
            document,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &JobKey) -> Option<ProgressRecord> {
        self.document
            .get(&key.year.to_string())
            .and_then(|months| months.get(&key.month))
            .map(ProgressRecord::from)
    }

    pub fn len(&self) -> usize {
        self.document.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the record for the outcome's issue and flushes the store.
    pub fn record(&mut self, outcome: &HarvestOutcome) -> Result<(), PersistError> {
        let record = ProgressRecord::from(outcome);
        let year = record.key.year.to_string();
        let month = record.key.month.clone();

        let previous = self
            .document
            .entry(year.clone())
            .or_default()
            .insert(month.clone(), PersistedMonth::from(&record));

        if let Err(err) = self.flush() {
            self.rollback(&year, &month, previous);
            return Err(err);
        }
        harvest_debug!("Progress saved for {}", record.key);
        Ok(())
    }

    fn flush(&self) -> Result<(), PersistError> {
        let json = serde_json::to_string_pretty(&self.document)?;
        self.writer.write(&self.filename, &json)?;
        Ok(())
    }

    fn rollback(&mut self, year: &str, month: &str, previous: Option<PersistedMonth>) {
        let Some(months) = self.document.get_mut(year) else {
            return;
        };
        match previous {
            Some(previous) => {
                months.insert(month.to_string(), previous);
            }
            None => {
                months.remove(month);
                if months.is_empty() {
                    self.document.remove(year);
                }
            }
        }
    }
}
