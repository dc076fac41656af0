//! Optional RON configuration file. Every field has a default, so an empty
//! `()` document is a valid config.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use archive_engine::{FetchSettings, PipelineSettings};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub output_dir: PathBuf,
    pub concurrency: usize,
    pub text_max_pages: usize,
    pub scan_max_pages: usize,
    pub detect_page_count: bool,
    pub min_delay_ms: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub default_retry_after_secs: u64,
    pub max_rate_limit_waits: u32,
    pub session_duration_secs: u64,
    pub session_requests: u32,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub redirect_limit: usize,
    pub max_page_bytes: u64,
    pub max_binary_bytes: u64,
    /// Empty keeps the built-in pool.
    pub user_agents: Vec<String>,
    pub referer: Option<String>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        let fetch = FetchSettings::default();
        let pipeline = PipelineSettings::default();
        Self {
            output_dir: PathBuf::from("archive"),
            concurrency: pipeline.concurrency,
            text_max_pages: pipeline.text_max_pages,
            scan_max_pages: pipeline.scan_max_pages,
            detect_page_count: pipeline.detect_page_count,
            min_delay_ms: fetch.min_delay.as_millis() as u64,
            max_retries: fetch.max_retries,
            backoff_base_ms: fetch.backoff_base.as_millis() as u64,
            default_retry_after_secs: fetch.default_retry_after.as_secs(),
            max_rate_limit_waits: fetch.max_rate_limit_waits,
            session_duration_secs: fetch.session_duration.as_secs(),
            session_requests: fetch.session_requests,
            connect_timeout_secs: fetch.connect_timeout.as_secs(),
            request_timeout_secs: fetch.request_timeout.as_secs(),
            redirect_limit: fetch.redirect_limit,
            max_page_bytes: fetch.max_page_bytes,
            max_binary_bytes: fetch.max_binary_bytes,
            user_agents: Vec::new(),
            referer: None,
        }
    }
}

impl HarvestConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        let defaults = FetchSettings::default();
        FetchSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            redirect_limit: self.redirect_limit,
            max_page_bytes: self.max_page_bytes,
            max_binary_bytes: self.max_binary_bytes,
            min_delay: Duration::from_millis(self.min_delay_ms),
            max_retries: self.max_retries,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            default_retry_after: Duration::from_secs(self.default_retry_after_secs),
            max_rate_limit_waits: self.max_rate_limit_waits,
            session_duration: Duration::from_secs(self.session_duration_secs),
            session_requests: self.session_requests,
            user_agents: if self.user_agents.is_empty() {
                defaults.user_agents.clone()
            } else {
                self.user_agents.clone()
            },
            referer: self.referer.clone(),
            ..defaults
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            concurrency: self.concurrency.max(1),
            text_max_pages: self.text_max_pages,
            scan_max_pages: self.scan_max_pages,
            detect_page_count: self.detect_page_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_gives_defaults() {
        let config: HarvestConfig = ron::from_str("()").unwrap();
        assert_eq!(config, HarvestConfig::default());
        assert_eq!(config.pipeline_settings(), PipelineSettings::default());
        assert_eq!(config.fetch_settings().min_delay, Duration::from_millis(500));
    }

    #[test]
    fn partial_document_overrides_named_fields() {
        let config: HarvestConfig = ron::from_str(
            r#"(output_dir: "out", concurrency: 2, min_delay_ms: 1500, referer: Some("http://archive.example/"))"#,
        )
        .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.pipeline_settings().concurrency, 2);

        let fetch = config.fetch_settings();
        assert_eq!(fetch.min_delay, Duration::from_millis(1500));
        assert_eq!(fetch.referer.as_deref(), Some("http://archive.example/"));
        assert!(!fetch.user_agents.is_empty());
        assert_eq!(fetch.allowed_content_types, FetchSettings::default().allowed_content_types);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = HarvestConfig::load(&dir.path().join("nope.ron")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
