use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use archive_core::{update, Effect, HarvestMode, HarvestOutcome, IssueJob, IssueState, JobKey, Msg};
use archive_logging::{harvest_error, harvest_info, harvest_warn};

use crate::filename::{sanitize_component, text_output_filename};
use crate::pipeline::HarvestPipeline;
use crate::progress::ProgressStore;

pub const PROGRESS_FILENAME: &str = "metadata.json";
pub const SCAN_DIRNAME: &str = "scanned_pages";

/// Supplies the issues of a run, in the order they should be processed.
pub trait JobSource: Send + Sync {
    fn issues(&self) -> Vec<IssueJob>;
}

impl JobSource for Vec<IssueJob> {
    fn issues(&self) -> Vec<IssueJob> {
        self.clone()
    }
}

/// Where outputs of an issue go below the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<year>/<month>`
    pub fn issue_dir(&self, key: &JobKey) -> PathBuf {
        self.root
            .join(key.year.to_string())
            .join(sanitize_component(&key.month))
    }

    pub fn text_file(&self, key: &JobKey) -> PathBuf {
        self.issue_dir(key).join(text_output_filename(key))
    }

    pub fn scan_dir(&self, key: &JobKey) -> PathBuf {
        self.issue_dir(key).join(SCAN_DIRNAME)
    }

    pub fn progress_file(&self) -> PathBuf {
        self.root.join(PROGRESS_FILENAME)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub issues: usize,
    pub with_text: usize,
    pub with_scan: usize,
    /// Text output was already on disk; nothing was fetched.
    pub already_present: usize,
    pub failed: usize,
}

/// Walks the issues of a run one after another, applying the text → scan
/// fallback from `archive_core::update` and recording every outcome.
pub struct HarvestDriver {
    pipeline: HarvestPipeline,
    layout: OutputLayout,
    store: ProgressStore,
}

impl HarvestDriver {
    pub fn new(pipeline: HarvestPipeline, layout: OutputLayout, store: ProgressStore) -> Self {
        Self {
            pipeline,
            layout,
            store,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    pub async fn run(&mut self, source: &dyn JobSource) -> RunSummary {
        let issues = source.issues();
        harvest_info!("Starting harvest of {} issues", issues.len());

        let mut summary = RunSummary::default();
        for job in issues {
            summary.issues += 1;
            let (outcome, already_present) = self.harvest_issue(job).await;

            match (outcome.success, outcome.mode) {
                (true, HarvestMode::Text) if already_present => summary.already_present += 1,
                (true, HarvestMode::Text) => summary.with_text += 1,
                (true, HarvestMode::Scan) => summary.with_scan += 1,
                _ => summary.failed += 1,
            }
        }

        harvest_info!(
            "Harvest finished: {} issues, {} text, {} scans, {} already present, {} failed",
            summary.issues,
            summary.with_text,
            summary.with_scan,
            summary.already_present,
            summary.failed
        );
        summary
    }

    /// Harvests a single issue and records its outcome in the progress store.
    pub async fn run_issue(&mut self, job: IssueJob) -> HarvestOutcome {
        self.harvest_issue(job).await.0
    }

    /// Also reports whether the text output was already on disk beforehand.
    async fn harvest_issue(&mut self, job: IssueJob) -> (HarvestOutcome, bool) {
        let key = job.key.clone();
        let text_output_present = self.text_output_present(&job);
        harvest_info!("Processing {}", key);

        let mut state = IssueState::new();
        let mut inbox = VecDeque::from([Msg::IssueReady {
            job,
            text_output_present,
        }]);
        let mut recorded: Option<HarvestOutcome> = None;

        while let Some(msg) = inbox.pop_front() {
            let (next, effects) = update(state, msg);
            state = next;
            for effect in effects {
                match effect {
                    Effect::RunTextJob { key, url } => {
                        let output = self.layout.text_file(&key);
                        let report = self.pipeline.run_text_job(&url, &output).await;
                        if !report.success {
                            harvest_warn!("Text version of {} yielded nothing", key);
                        }
                        inbox.push_back(Msg::TextJobFinished {
                            success: report.success,
                        });
                    }
                    Effect::RunScanJob { key, url } => {
                        let output = self.layout.scan_dir(&key);
                        let report = self.pipeline.run_image_job(&url, &output).await;
                        inbox.push_back(Msg::ScanJobFinished {
                            downloaded: report.images_downloaded,
                        });
                    }
                    Effect::Record(outcome) => {
                        if let Err(err) = self.store.record(&outcome) {
                            harvest_error!("Could not save progress for {}: {}", outcome.key, err);
                        }
                        recorded = Some(outcome);
                    }
                }
            }
        }

        let outcome = recorded.unwrap_or_else(|| HarvestOutcome::none(key));
        if outcome.success {
            harvest_info!("Finished {} ({:?})", outcome.key, outcome.mode);
        } else {
            harvest_warn!("No content harvested for {}", outcome.key);
        }
        (outcome, text_output_present)
    }

    fn text_output_present(&self, job: &IssueJob) -> bool {
        job.sources.text_url.is_some() && self.layout.text_file(&job.key).is_file()
    }
}
