use crate::{Effect, HarvestOutcome, IssueState, Msg, Phase};

/// Pure update function: applies a message to state and returns any effects.
///
/// Text is preferred; the scan version is only harvested when there is no
/// text version or the text job produced nothing. Every issue ends with
/// exactly one `Effect::Record`.
pub fn update(mut state: IssueState, msg: Msg) -> (IssueState, Vec<Effect>) {
    let effects = match msg {
        Msg::IssueReady {
            job,
            text_output_present,
        } => {
            if state.phase() != Phase::Idle {
                return (state, Vec::new());
            }
            let key = job.key.clone();
            let sources = job.sources.clone();
            state.begin(job);

            match (sources.text_url, sources.scan_url) {
                (Some(url), _) if text_output_present => {
                    let outcome = HarvestOutcome::text(key, url, true);
                    state.finish(outcome.clone());
                    vec![Effect::Record(outcome)]
                }
                (Some(url), _) => {
                    state.await_text();
                    vec![Effect::RunTextJob { key, url }]
                }
                (None, Some(url)) => {
                    state.await_scan();
                    vec![Effect::RunScanJob { key, url }]
                }
                (None, None) => {
                    let outcome = HarvestOutcome::none(key);
                    state.finish(outcome.clone());
                    vec![Effect::Record(outcome)]
                }
            }
        }
        Msg::TextJobFinished { success } => {
            if state.phase() != Phase::AwaitingText {
                return (state, Vec::new());
            }
            let Some(job) = state.current().cloned() else {
                return (state, Vec::new());
            };
            let text_url = job.sources.text_url.clone().unwrap_or_default();

            if success {
                let outcome = HarvestOutcome::text(job.key, text_url, true);
                state.finish(outcome.clone());
                vec![Effect::Record(outcome)]
            } else if let Some(url) = job.sources.scan_url {
                state.await_scan();
                vec![Effect::RunScanJob { key: job.key, url }]
            } else {
                let outcome = HarvestOutcome::text(job.key, text_url, false);
                state.finish(outcome.clone());
                vec![Effect::Record(outcome)]
            }
        }
        Msg::ScanJobFinished { downloaded } => {
            if state.phase() != Phase::AwaitingScan {
                return (state, Vec::new());
            }
            let Some(job) = state.current().cloned() else {
                return (state, Vec::new());
            };
            let scan_url = job.sources.scan_url.unwrap_or_default();
            let outcome = HarvestOutcome::scan(job.key, scan_url, downloaded > 0);
            state.finish(outcome.clone());
            vec![Effect::Record(outcome)]
        }
    };

    (state, effects)
}
