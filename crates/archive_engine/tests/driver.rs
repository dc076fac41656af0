mod common;

use std::fs;

use archive_core::{HarvestMode, IssueJob, IssueSources, JobKey};
use archive_engine::{
    HarvestDriver, HarvestPipeline, OutputLayout, PipelineSettings, ProgressStore, RunSummary,
};
use common::{client_with, filler, html_page, quick_settings};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn driver_for(root: &std::path::Path) -> HarvestDriver {
    let (client, _sleeper) = client_with(quick_settings());
    let settings = PipelineSettings {
        text_max_pages: 2,
        scan_max_pages: 2,
        detect_page_count: false,
        ..PipelineSettings::default()
    };
    let layout = OutputLayout::new(root);
    let store = ProgressStore::open(layout.progress_file()).unwrap();
    HarvestDriver::new(HarvestPipeline::new(client, settings), layout, store)
}

fn issue(year: u32, month: &str, text: Option<String>, scan: Option<String>) -> IssueJob {
    IssueJob::new(
        JobKey::new(year, month),
        IssueSources {
            text_url: text,
            scan_url: scan,
        },
    )
}

#[tokio::test]
async fn second_run_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            html_page(&format!("<article><p>{}</p></article>", filler('t', 300))),
            "text/html",
        ))
        .mount(&server)
        .await;

    let out = TempDir::new().unwrap();
    let jobs = vec![issue(
        1950,
        "January",
        Some(format!("{}/text/v1", server.uri())),
        None,
    )];

    let mut driver = driver_for(out.path());
    let first = driver.run(&jobs).await;
    assert_eq!(
        first,
        RunSummary {
            issues: 1,
            with_text: 1,
            ..RunSummary::default()
        }
    );
    let text_file = out.path().join("1950/January/January_1950_text.txt");
    assert!(text_file.is_file());
    let requests_after_first = server.received_requests().await.unwrap().len();
    assert_eq!(requests_after_first, 2);

    let mut driver = driver_for(out.path());
    let second = driver.run(&jobs).await;
    assert_eq!(
        second,
        RunSummary {
            issues: 1,
            already_present: 1,
            ..RunSummary::default()
        }
    );
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        requests_after_first
    );
    assert!(driver.store().get(&JobKey::new(1950, "January")).unwrap().has_text);
}

#[tokio::test]
async fn empty_text_version_falls_back_to_scans() {
    let server = MockServer::start().await;
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path("/text/v4"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            html_page("<div><p>Contents coming soon</p></div>"),
            "text/html",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/scan/v4"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            html_page(r#"<img src="/pages/1.jpg" width="1000" height="1400">"#),
            "text/html",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pages/1.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0xFFu8, 0xD8, 0xFF], "image/jpeg"))
        .expect(1)
        .mount(&server)
        .await;

    let out = TempDir::new().unwrap();
    let key = JobKey::new(1962, "April");
    let mut driver = driver_for(out.path());

    let outcome = driver
        .run_issue(issue(
            1962,
            "April",
            Some(format!("{uri}/text/v4")),
            Some(format!("{uri}/scan/v4")),
        ))
        .await;

    assert_eq!(outcome.mode, HarvestMode::Scan);
    assert!(outcome.success);
    assert!(!out.path().join("1962/April/April_1962_text.txt").exists());
    assert_eq!(
        fs::read_dir(out.path().join("1962/April/scanned_pages"))
            .unwrap()
            .count(),
        1
    );

    let record = driver.store().get(&key).unwrap();
    assert!(!record.has_text);
    assert!(record.has_scan);
    assert_eq!(record.scan_source, Some(format!("{uri}/scan/v4")));

    let reopened = ProgressStore::open(out.path().join("metadata.json")).unwrap();
    assert_eq!(reopened.get(&key), Some(record));
}

#[tokio::test]
async fn issue_without_sources_is_recorded_as_failed() {
    let out = TempDir::new().unwrap();
    let mut driver = driver_for(out.path());
    let jobs = vec![issue(1975, "June", None, None)];

    let summary = driver.run(&jobs).await;

    assert_eq!(summary.failed, 1);
    let record = driver.store().get(&JobKey::new(1975, "June")).unwrap();
    assert!(!record.has_text && !record.has_scan);
}

#[tokio::test]
async fn failed_text_without_scan_is_recorded_as_text_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let out = TempDir::new().unwrap();
    let mut driver = driver_for(out.path());
    let outcome = driver
        .run_issue(issue(
            1980,
            "July",
            Some(format!("{}/text/v9", server.uri())),
            None,
        ))
        .await;

    assert_eq!(outcome.mode, HarvestMode::Text);
    assert!(!outcome.success);
}
