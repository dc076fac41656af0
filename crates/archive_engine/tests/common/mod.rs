#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use archive_engine::{FetchClient, FetchSettings, Sleeper};

/// Records requested delays instead of waiting them out.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// Settings without throttling so recorded delays are only backoff and
/// rate-limit waits.
pub fn quick_settings() -> FetchSettings {
    FetchSettings {
        min_delay: Duration::ZERO,
        request_timeout: Duration::from_secs(5),
        ..FetchSettings::default()
    }
}

pub fn client_with(settings: FetchSettings) -> (Arc<FetchClient>, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let client = FetchClient::with_sleeper(settings, sleeper.clone()).expect("client");
    (Arc::new(client), sleeper)
}

pub fn html_page(body: &str) -> String {
    format!("<html><head><title>Issue</title></head><body>{body}</body></html>")
}

/// Filler text of exactly `len` characters, no whitespace.
pub fn filler(ch: char, len: usize) -> String {
    std::iter::repeat(ch).take(len).collect()
}
