//! Issue manifest: the list of `(year, month)` issues with their text and
//! scan entry points.
//!
//! ```ron
//! (issues: [
//!     (year: 1950, month: "January", text: Some("http://…/v10"), scan: None),
//! ])
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use archive_core::{IssueJob, IssueSources, JobKey};
use archive_engine::JobSource;
use archive_logging::harvest_warn;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

#[derive(Debug, Deserialize)]
struct ManifestDocument {
    issues: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    year: u32,
    month: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    scan: Option<String>,
}

/// Issues read from a manifest, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestJobSource {
    issues: Vec<IssueJob>,
}

impl ManifestJobSource {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let document: ManifestDocument = ron::from_str(content)?;
        let mut issues: Vec<IssueJob> = Vec::with_capacity(document.issues.len());
        for entry in document.issues {
            let key = JobKey::new(entry.year, entry.month.trim());
            if issues.iter().any(|issue| issue.key == key) {
                harvest_warn!("Ignoring duplicate manifest entry for {}", key);
                continue;
            }
            let sources = IssueSources {
                text_url: non_blank(entry.text),
                scan_url: non_blank(entry.scan),
            };
            issues.push(IssueJob::new(key, sources));
        }
        Ok(Self { issues })
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }
}

impl JobSource for ManifestJobSource {
    fn issues(&self) -> Vec<IssueJob> {
        self.issues.clone()
    }
}

fn non_blank(url: Option<String>) -> Option<String> {
    url.map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
}
