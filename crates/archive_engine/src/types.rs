use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use reqwest::header::HeaderMap;

/// One attempt at fetching a URL. A fresh value is issued per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Outcome of a fetch after the client's own retries are spent.
///
/// Callers never retry: `Transient` means "unavailable right now", `Fatal`
/// means retrying would not help (bad URL, missing page, oversized body).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Ok(FetchResponse),
    Transient(FetchError),
    Fatal(FetchError),
}

impl FetchResult {
    pub fn into_response(self) -> Result<FetchResponse, FetchError> {
        match self {
            FetchResult::Ok(response) => Ok(response),
            FetchResult::Transient(err) | FetchResult::Fatal(err) => Err(err),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, FetchResult::Ok(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FetchResult::Fatal(FetchError {
                kind: FailureKind::NotFound(_),
                ..
            })
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    NotFound(u16),
    Timeout,
    RateLimited,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::NotFound(code) => write!(f, "not found (http {code})"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RateLimited => write!(f, "rate limited"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// Summary of one text or scan job over an issue.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobReport {
    pub pages_total: usize,
    pub pages_with_content: usize,
    pub images_downloaded: usize,
    pub output_path: Option<PathBuf>,
    pub success: bool,
}
