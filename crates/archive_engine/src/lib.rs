//! Archive engine: every piece of the harvester that touches the network or
//! the disk, from the rate-limited fetch client up to the issue driver.
mod decode;
mod driver;
mod extract;
mod fetch;
mod filename;
mod images;
mod paginate;
mod persist;
mod pipeline;
mod progress;
mod types;

pub use decode::{decode_page, DecodedPage};
pub use driver::{HarvestDriver, JobSource, OutputLayout, RunSummary, PROGRESS_FILENAME, SCAN_DIRNAME};
pub use extract::{
    collapse_blank_lines, render_text, visible_text_len, ContentExtractor, ExtractionStrategy,
    Extractor, LargestBlock, SelectorChain, ARTICLE_SELECTORS, BLOCK_MIN_CHARS, SELECTOR_MIN_CHARS,
};
pub use fetch::{parse_retry_after, FetchClient, FetchSettings, Fetcher, Sleeper, TokioSleeper};
pub use filename::{image_extension, image_file_stem, sanitize_component, text_output_filename};
pub use images::{
    parse_dimension, DiscoveredImages, ImageCandidate, ImageFilter, ImageHarvester, ImageRef,
    StoredImage, DECORATIVE_MARKERS, MIN_SCAN_DIMENSION,
};
pub use paginate::{detect_page_count, page_jobs, versioned_base, PaginationEnumerator};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use pipeline::{
    HarvestPipeline, PageCutoff, PipelineSettings, DEFAULT_CONCURRENCY, SCAN_MAX_PAGES,
    TEXT_MAX_PAGES,
};
pub use progress::{ProgressError, ProgressStore};
pub use types::{FailureKind, FetchError, FetchRequest, FetchResponse, FetchResult, JobReport};
