use std::sync::{Arc, LazyLock};

use archive_core::PageJob;
use archive_logging::{harvest_debug, harvest_info};
use regex::Regex;
use scraper::{Html, Selector};

use crate::decode::decode_page;
use crate::fetch::Fetcher;
use crate::FetchResult;

/// `…/v10` or `…/v10.3`; group 1 is the versioned base without page suffix.
static VERSIONED_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*/v\d+)(?:\.\d+)?/?$").expect("static pattern"));

/// Base path that page suffixes are appended to, if the URL has one.
pub fn versioned_base(issue_url: &str) -> Option<&str> {
    VERSIONED_PATH
        .captures(issue_url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Page 1 is the issue URL as given; pages 2..=count are `{base}.{n}`.
/// URLs without a versioned segment have a single page.
pub fn page_jobs(issue_url: &str, count: usize) -> Vec<PageJob> {
    let mut pages = vec![PageJob::new(1, issue_url)];
    let Some(base) = versioned_base(issue_url) else {
        return pages;
    };
    pages.extend((2..=count).map(|index| PageJob::new(index, format!("{base}.{index}"))));
    pages
}

/// Highest page number linked from a `.pagination` / `#pagination` block.
pub fn detect_page_count(html: &str) -> Option<usize> {
    let document = Html::parse_document(html);
    let container = Selector::parse(".pagination, #pagination").ok()?;
    let links = Selector::parse("a").ok()?;
    let pagination = document.select(&container).next()?;
    pagination
        .select(&links)
        .filter_map(|link| link.text().collect::<String>().trim().parse::<usize>().ok())
        .filter(|count| *count > 0)
        .max()
}

pub struct PaginationEnumerator {
    fetcher: Arc<dyn Fetcher>,
    detect_page_count: bool,
}

impl PaginationEnumerator {
    pub fn new(fetcher: Arc<dyn Fetcher>, detect_page_count: bool) -> Self {
        Self {
            fetcher,
            detect_page_count,
        }
    }

    /// Lists the pages of an issue, at most `max_pages` of them.
    pub async fn enumerate(&self, issue_url: &str, max_pages: usize) -> Vec<PageJob> {
        self.enumerate_with_first(issue_url, max_pages).await.0
    }

    /// Like `enumerate`, also handing back the outcome of fetching page 1
    /// when that was needed to read the pagination marker, so the caller
    /// neither fetches nor retries it a second time.
    pub(crate) async fn enumerate_with_first(
        &self,
        issue_url: &str,
        max_pages: usize,
    ) -> (Vec<PageJob>, Option<FetchResult>) {
        let mut count = max_pages.max(1);
        let mut first_page = None;
        if self.detect_page_count && count > 1 && versioned_base(issue_url).is_some() {
            let result = self.fetcher.fetch(issue_url).await;
            match &result {
                FetchResult::Ok(response) => {
                    let decoded = decode_page(&response.body, response.content_type.as_deref());
                    match detect_page_count(&decoded.text) {
                        Some(detected) if detected < count => {
                            harvest_info!(
                                "Pagination marker on {} limits the issue to {} pages",
                                issue_url,
                                detected
                            );
                            count = detected;
                        }
                        Some(_) | None => {
                            harvest_debug!("No usable pagination marker on {}", issue_url);
                        }
                    }
                }
                FetchResult::Transient(err) | FetchResult::Fatal(err) => {
                    harvest_debug!("Page count detection skipped for {}: {}", issue_url, err);
                }
            }
            first_page = Some(result);
        }

        let pages = page_jobs(issue_url, count);
        harvest_info!("Generated {} pages for {}", pages.len(), issue_url);
        (pages, first_page)
    }
}
