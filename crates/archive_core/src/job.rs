use std::fmt;

/// Identifies one issue: a year plus the month label used by the archive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobKey {
    pub year: u32,
    pub month: String,
}

impl JobKey {
    pub fn new(year: u32, month: impl Into<String>) -> Self {
        Self {
            year,
            month: month.into(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.month, self.year)
    }
}

/// The alternative entry points for one issue.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IssueSources {
    pub text_url: Option<String>,
    pub scan_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueJob {
    pub key: JobKey,
    pub sources: IssueSources,
}

impl IssueJob {
    pub fn new(key: JobKey, sources: IssueSources) -> Self {
        Self { key, sources }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestMode {
    Text,
    Scan,
    None,
}

/// Final result for one issue. Supersedes any earlier outcome for the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestOutcome {
    pub key: JobKey,
    pub mode: HarvestMode,
    pub source_url: Option<String>,
    pub success: bool,
}

impl HarvestOutcome {
    pub fn text(key: JobKey, url: impl Into<String>, success: bool) -> Self {
        Self {
            key,
            mode: HarvestMode::Text,
            source_url: Some(url.into()),
            success,
        }
    }

    pub fn scan(key: JobKey, url: impl Into<String>, success: bool) -> Self {
        Self {
            key,
            mode: HarvestMode::Scan,
            source_url: Some(url.into()),
            success,
        }
    }

    pub fn none(key: JobKey) -> Self {
        Self {
            key,
            mode: HarvestMode::None,
            source_url: None,
            success: false,
        }
    }
}

/// What the progress store keeps per issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub key: JobKey,
    pub has_text: bool,
    pub has_scan: bool,
    pub text_source: Option<String>,
    pub scan_source: Option<String>,
}

impl ProgressRecord {
    pub fn empty(key: JobKey) -> Self {
        Self {
            key,
            has_text: false,
            has_scan: false,
            text_source: None,
            scan_source: None,
        }
    }
}

impl From<&HarvestOutcome> for ProgressRecord {
    fn from(outcome: &HarvestOutcome) -> Self {
        let mut record = ProgressRecord::empty(outcome.key.clone());
        if !outcome.success {
            return record;
        }
        match outcome.mode {
            HarvestMode::Text => {
                record.has_text = true;
                record.text_source = outcome.source_url.clone();
            }
            HarvestMode::Scan => {
                record.has_scan = true;
                record.scan_source = outcome.source_url.clone();
            }
            HarvestMode::None => {}
        }
        record
    }
}
