#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// The job source produced an issue to harvest.
    IssueReady {
        job: crate::IssueJob,
        /// A text output file for this issue already exists on disk.
        text_output_present: bool,
    },
    /// The text job for the current issue finished.
    TextJobFinished { success: bool },
    /// The scan job for the current issue finished.
    ScanJobFinished { downloaded: usize },
}
