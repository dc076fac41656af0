use crate::{HarvestOutcome, JobKey};

/// Work the driver has to perform on behalf of the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    RunTextJob { key: JobKey, url: String },
    RunScanJob { key: JobKey, url: String },
    /// Persist the final outcome of the issue; always the last effect for an issue.
    Record(HarvestOutcome),
}
