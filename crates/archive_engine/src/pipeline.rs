use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use archive_core::{assemble_issue_text, ContentCandidate, PageJob};
use archive_logging::{harvest_debug, harvest_error, harvest_info, harvest_warn};
use futures_util::stream::{self, StreamExt};

use crate::decode::decode_page;
use crate::extract::{ContentExtractor, Extractor};
use crate::fetch::Fetcher;
use crate::images::ImageHarvester;
use crate::paginate::PaginationEnumerator;
use crate::persist::AtomicFileWriter;
use crate::{FetchResponse, FetchResult, JobReport};

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const TEXT_MAX_PAGES: usize = 36;
pub const SCAN_MAX_PAGES: usize = 66;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Pages of one issue in flight at once.
    pub concurrency: usize,
    pub text_max_pages: usize,
    pub scan_max_pages: usize,
    /// Read the pagination marker on page 1 to lower the page ceiling.
    pub detect_page_count: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            text_max_pages: TEXT_MAX_PAGES,
            scan_max_pages: SCAN_MAX_PAGES,
            detect_page_count: true,
        }
    }
}

/// Lowest page index that answered "not found". Pages after it that have
/// not started yet are skipped; running pages are left alone.
#[derive(Debug)]
pub struct PageCutoff(AtomicUsize);

impl Default for PageCutoff {
    fn default() -> Self {
        Self(AtomicUsize::new(usize::MAX))
    }
}

impl PageCutoff {
    /// Page 1 missing says nothing about the page count, so it is ignored.
    pub fn observe(&self, page_index: usize) {
        if page_index >= 2 {
            self.0.fetch_min(page_index, Ordering::SeqCst);
        }
    }

    pub fn excludes(&self, page_index: usize) -> bool {
        page_index > self.0.load(Ordering::SeqCst)
    }
}

/// Runs text and scan jobs for a single issue over a bounded worker pool.
pub struct HarvestPipeline {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    harvester: ImageHarvester,
    enumerator: PaginationEnumerator,
    settings: PipelineSettings,
}

impl HarvestPipeline {
    pub fn new(fetcher: Arc<dyn Fetcher>, settings: PipelineSettings) -> Self {
        Self::with_extractor(fetcher, Arc::new(ContentExtractor::default()), settings)
    }

    pub fn with_extractor(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        settings: PipelineSettings,
    ) -> Self {
        let enumerator = PaginationEnumerator::new(fetcher.clone(), settings.detect_page_count);
        Self {
            fetcher,
            extractor,
            harvester: ImageHarvester::default(),
            enumerator,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Extracts the article text of every page and writes the combined
    /// document to `output_file`. Nothing is written when no page has text.
    pub async fn run_text_job(&self, issue_url: &str, output_file: &Path) -> JobReport {
        let (pages, first_page) = self
            .enumerator
            .enumerate_with_first(issue_url, self.settings.text_max_pages)
            .await;
        let pages_total = pages.len();
        let cutoff = PageCutoff::default();

        let candidates: Vec<Option<ContentCandidate>> = stream::iter(with_prefetched(pages, first_page))
            .map(|(page, prefetched)| {
                let cutoff = &cutoff;
                async move {
                    let response = self.load_page(&page, prefetched, cutoff).await?;
                    let decoded = decode_page(&response.body, response.content_type.as_deref());
                    if decoded.lossy {
                        harvest_debug!(
                            "Page {} decoded as {} with replacements",
                            page.index,
                            decoded.encoding_label
                        );
                    }
                    let candidate = self.extractor.extract(page.index, &decoded.text);
                    if candidate.is_none() {
                        harvest_info!("Page {}: no article content found", page.index);
                    }
                    candidate
                }
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let candidates: Vec<ContentCandidate> = candidates.into_iter().flatten().collect();
        let mut report = JobReport {
            pages_total,
            pages_with_content: candidates.len(),
            ..JobReport::default()
        };

        let Some(document) = assemble_issue_text(candidates) else {
            harvest_warn!("No text extracted from any page of {}", issue_url);
            return report;
        };

        let Some(filename) = output_file.file_name().and_then(|name| name.to_str()) else {
            harvest_error!("Unusable text output path {}", output_file.display());
            return report;
        };
        let dir = output_file.parent().unwrap_or_else(|| Path::new("."));
        match AtomicFileWriter::new(dir).write(filename, &document) {
            Ok(path) => {
                harvest_info!(
                    "Saved text from {}/{} pages to {}",
                    report.pages_with_content,
                    pages_total,
                    path.display()
                );
                report.output_path = Some(path);
                report.success = true;
            }
            Err(err) => {
                harvest_error!("Failed to write {}: {}", output_file.display(), err);
            }
        }
        report
    }

    /// Downloads the scanned page images of an issue into `output_dir`.
    pub async fn run_image_job(&self, issue_url: &str, output_dir: &Path) -> JobReport {
        let (pages, first_page) = self
            .enumerator
            .enumerate_with_first(issue_url, self.settings.scan_max_pages)
            .await;
        let pages_total = pages.len();
        let cutoff = PageCutoff::default();

        let per_page: Vec<usize> = stream::iter(with_prefetched(pages, first_page))
            .map(|(page, prefetched)| {
                let cutoff = &cutoff;
                async move {
                    match self.load_page(&page, prefetched, cutoff).await {
                        Some(response) => self.images_of_page(&page, response, output_dir).await,
                        None => 0,
                    }
                }
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let images_downloaded: usize = per_page.iter().sum();
        let report = JobReport {
            pages_total,
            pages_with_content: per_page.iter().filter(|count| **count > 0).count(),
            images_downloaded,
            output_path: (images_downloaded > 0).then(|| output_dir.to_path_buf()),
            success: images_downloaded > 0,
        };
        if report.success {
            harvest_info!(
                "Stored {} images from {}/{} pages in {}",
                images_downloaded,
                report.pages_with_content,
                pages_total,
                output_dir.display()
            );
        } else {
            harvest_warn!("No scanned pages found for {}", issue_url);
        }
        report
    }

    async fn images_of_page(&self, page: &PageJob, response: FetchResponse, output_dir: &Path) -> usize {
        let decoded = decode_page(&response.body, response.content_type.as_deref());
        let discovered = self
            .harvester
            .harvest(page.index, &decoded.text, &response.final_url);

        let images = if discovered.images.is_empty() && !discovered.frames.is_empty() {
            harvest_debug!(
                "Page {}: no direct images, checking {} frames",
                page.index,
                discovered.frames.len()
            );
            self.harvester
                .harvest_frames(self.fetcher.as_ref(), page.index, &discovered.frames)
                .await
        } else {
            discovered.images
        };

        let mut stored = 0;
        for image in &images {
            if self
                .harvester
                .materialize(self.fetcher.as_ref(), image, output_dir)
                .await
                .is_some()
            {
                stored += 1;
            }
        }
        if stored == 0 {
            harvest_info!("Page {}: no scanned images", page.index);
        }
        stored
    }

    /// Fetches one page unless the cutoff already rules it out. A page
    /// fetched earlier, successfully or not, is used as is.
    async fn load_page(
        &self,
        page: &PageJob,
        prefetched: Option<FetchResult>,
        cutoff: &PageCutoff,
    ) -> Option<FetchResponse> {
        let result = match prefetched {
            Some(result) => result,
            None if cutoff.excludes(page.index) => {
                harvest_debug!("Skipping page {}: past the last existing page", page.index);
                return None;
            }
            None => self.fetcher.fetch(&page.url).await,
        };
        match result {
            FetchResult::Ok(response) => Some(response),
            result if result.is_not_found() => {
                harvest_info!("Page {} does not exist ({})", page.index, page.url);
                cutoff.observe(page.index);
                None
            }
            FetchResult::Transient(err) | FetchResult::Fatal(err) => {
                harvest_warn!("Skipping page {} ({}): {}", page.index, page.url, err);
                None
            }
        }
    }
}

fn with_prefetched(
    pages: Vec<PageJob>,
    mut first_page: Option<FetchResult>,
) -> Vec<(PageJob, Option<FetchResult>)> {
    pages
        .into_iter()
        .map(|page| {
            let prefetched = if page.index == 1 { first_page.take() } else { None };
            (page, prefetched)
        })
        .collect()
}
