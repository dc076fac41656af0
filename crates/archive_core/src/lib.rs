//! Archive core: pure domain types, ordered text assembly and the per-issue
//! fallback state machine. Nothing in here touches the network or the disk.
mod assemble;
mod effect;
mod job;
mod msg;
mod page;
mod state;
mod update;

pub use assemble::{assemble_issue_text, page_marker};
pub use effect::Effect;
pub use job::{HarvestMode, HarvestOutcome, IssueJob, IssueSources, JobKey, ProgressRecord};
pub use msg::Msg;
pub use page::{ContentCandidate, PageJob};
pub use state::{IssueState, Phase};
pub use update::update;
