use crate::{HarvestOutcome, IssueJob};

/// Where the current issue stands in the text → scan fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    AwaitingText,
    AwaitingScan,
}

/// State for the issue currently being harvested. Issues are processed one
/// at a time, so a single slot is enough.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IssueState {
    current: Option<IssueJob>,
    phase: Phase,
    last_outcome: Option<HarvestOutcome>,
}

impl IssueState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current(&self) -> Option<&IssueJob> {
        self.current.as_ref()
    }

    /// Outcome recorded for the most recently finished issue.
    pub fn last_outcome(&self) -> Option<&HarvestOutcome> {
        self.last_outcome.as_ref()
    }

    pub(crate) fn begin(&mut self, job: IssueJob) {
        self.current = Some(job);
        self.phase = Phase::Idle;
    }

    pub(crate) fn await_text(&mut self) {
        self.phase = Phase::AwaitingText;
    }

    pub(crate) fn await_scan(&mut self) {
        self.phase = Phase::AwaitingScan;
    }

    pub(crate) fn finish(&mut self, outcome: HarvestOutcome) {
        self.current = None;
        self.phase = Phase::Idle;
        self.last_outcome = Some(outcome);
    }
}
