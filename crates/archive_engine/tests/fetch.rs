mod common;

use std::time::Duration;

use archive_engine::{FailureKind, FetchResult, FetchSettings, Fetcher};
use common::{client_with, quick_settings};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn returns_html_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html; charset=utf-8"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, sleeper) = client_with(quick_settings());
    let url = format!("{}/doc", server.uri());

    let response = client.fetch(&url).await.into_response().expect("fetch ok");
    assert_eq!(response.status, 200);
    assert_eq!(response.final_url, url);
    assert!(response.content_type.unwrap().starts_with("text/html"));
    assert_eq!(&response.body[..], b"<html>ok</html>");
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn server_error_is_retried_with_growing_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let (client, sleeper) = client_with(quick_settings());
    let result = client.fetch(&format!("{}/broken", server.uri())).await;

    match result {
        FetchResult::Transient(err) => assert_eq!(err.kind, FailureKind::HttpStatus(500)),
        other => panic!("expected transient failure, got {other:?}"),
    }
    let delays = sleeper.delays();
    assert_eq!(delays, vec![Duration::from_secs(1), Duration::from_secs(2)]);
    assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn rate_limit_wait_does_not_use_a_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "5"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>ok</p>", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let (client, sleeper) = client_with(quick_settings());
    let result = client.fetch(&format!("{}/busy", server.uri())).await;

    // 429 + two 500s + success: four requests inside a three-attempt budget.
    assert!(result.is_ok());
    assert_eq!(
        sleeper.delays(),
        vec![
            Duration::from_secs(5),
            Duration::from_secs(1),
            Duration::from_secs(2)
        ]
    );
}

#[tokio::test]
async fn rate_limit_without_retry_after_uses_default_wait() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_rate_limit_waits: 2,
        ..quick_settings()
    };
    let (client, sleeper) = client_with(settings);
    let result = client.fetch(&format!("{}/busy", server.uri())).await;

    match result {
        FetchResult::Transient(err) => assert_eq!(err.kind, FailureKind::RateLimited),
        other => panic!("expected rate-limit failure, got {other:?}"),
    }
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_secs(30), Duration::from_secs(30)]
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn not_found_is_fatal_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let (client, sleeper) = client_with(quick_settings());
    let result = client.fetch(&format!("{}/missing", server.uri())).await;

    assert!(result.is_not_found());
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn slow_server_times_out_on_every_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("late", "text/html")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(100),
        ..quick_settings()
    };
    let (client, _sleeper) = client_with(settings);
    let result = client.fetch(&format!("{}/slow", server.uri())).await;

    match result {
        FetchResult::Transient(err) => assert_eq!(err.kind, FailureKind::Timeout),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn oversized_page_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/huge"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("x".repeat(64), "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_page_bytes: 16,
        ..quick_settings()
    };
    let (client, _sleeper) = client_with(settings);
    let result = client.fetch(&format!("{}/huge", server.uri())).await;

    match result {
        FetchResult::Fatal(err) => assert!(matches!(err.kind, FailureKind::TooLarge { .. })),
        other => panic!("expected too-large failure, got {other:?}"),
    }
}

#[tokio::test]
async fn pages_must_be_html_but_binaries_need_not() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/scan.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0xFF, 0xD8, 0xFF], "image/jpeg"))
        .mount(&server)
        .await;

    let (client, _sleeper) = client_with(quick_settings());
    let url = format!("{}/scan.jpg", server.uri());

    match client.fetch(&url).await {
        FetchResult::Fatal(err) => assert!(matches!(
            err.kind,
            FailureKind::UnsupportedContentType { .. }
        )),
        other => panic!("expected content-type rejection, got {other:?}"),
    }
    let image = client.fetch_binary(&url).await.into_response().expect("binary");
    assert_eq!(&image.body[..], &[0xFF, 0xD8, 0xFF]);
}

#[tokio::test]
async fn invalid_url_never_hits_the_network() {
    let (client, sleeper) = client_with(quick_settings());
    match client.fetch("not a url").await {
        FetchResult::Fatal(err) => assert_eq!(err.kind, FailureKind::InvalidUrl),
        other => panic!("expected invalid url, got {other:?}"),
    }
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn session_rotates_after_request_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>ok</p>", "text/html"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        session_requests: 2,
        ..quick_settings()
    };
    let (client, _sleeper) = client_with(settings);
    let url = format!("{}/page", server.uri());

    for _ in 0..2 {
        assert!(client.fetch(&url).await.is_ok());
    }
    assert_eq!(client.rotations(), 0);

    assert!(client.fetch(&url).await.is_ok());
    assert_eq!(client.rotations(), 1);
}

#[tokio::test]
async fn failed_requests_do_not_use_session_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>ok</p>", "text/html"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        session_requests: 2,
        ..quick_settings()
    };
    let (client, _sleeper) = client_with(settings);

    for _ in 0..3 {
        assert!(client.fetch(&format!("{}/gone", server.uri())).await.is_not_found());
    }
    for _ in 0..2 {
        assert!(client.fetch(&format!("{}/page", server.uri())).await.is_ok());
    }
    assert_eq!(client.rotations(), 0);
}

#[tokio::test]
async fn consecutive_requests_are_spaced_by_min_delay() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>ok</p>", "text/html"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        min_delay: Duration::from_secs(60),
        ..quick_settings()
    };
    let (client, sleeper) = client_with(settings);
    let url = format!("{}/page", server.uri());

    assert!(client.fetch(&url).await.is_ok());
    assert!(client.fetch(&url).await.is_ok());

    let delays = sleeper.delays();
    assert_eq!(delays.len(), 1);
    assert!(delays[0] > Duration::from_secs(59));
}

#[tokio::test]
async fn configured_referer_and_dnt_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>ok</p>", "text/html"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        referer: Some("http://archive.example/".to_string()),
        user_agents: vec!["archive-test-agent".to_string()],
        ..quick_settings()
    };
    let (client, _sleeper) = client_with(settings);
    assert!(client.fetch(&format!("{}/page", server.uri())).await.is_ok());

    let requests = server.received_requests().await.unwrap();
    let headers = &requests[0].headers;
    assert_eq!(headers.get("referer").unwrap(), "http://archive.example/");
    assert_eq!(headers.get("dnt").unwrap(), "1");
    assert_eq!(headers.get("user-agent").unwrap(), "archive-test-agent");
    assert_eq!(client.current_user_agent().await, "archive-test-agent");
}
