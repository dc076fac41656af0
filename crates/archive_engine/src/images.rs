use std::fs;
use std::path::{Path, PathBuf};

use archive_logging::{harvest_debug, harvest_error, harvest_warn};
use bytes::Bytes;
use scraper::{Html, Selector};
use url::Url;

use crate::decode::decode_page;
use crate::fetch::Fetcher;
use crate::filename::{image_extension, image_file_stem, IMAGE_EXTENSIONS};
use crate::persist::AtomicFileWriter;
use crate::FetchResult;

pub const MIN_SCAN_DIMENSION: u32 = 300;
pub const DECORATIVE_MARKERS: &[&str] = &["icon", "logo", "button", "nav"];

/// An accepted image that has not been downloaded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub page_index: usize,
    pub url: String,
}

/// A downloaded image, before it is written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub page_index: usize,
    pub url: String,
    pub raw_bytes: Bytes,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub path: PathBuf,
    pub byte_len: u64,
    /// The file was already on disk from an earlier run; nothing was fetched.
    pub reused: bool,
}

/// Result of scanning one document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoveredImages {
    pub images: Vec<ImageRef>,
    /// Resolved `frame`/`iframe` sources, for the one-level fallback.
    pub frames: Vec<String>,
}

/// Decides whether an `<img>` looks like a scanned page.
#[derive(Debug, Clone)]
pub struct ImageFilter {
    pub min_dimension: u32,
    pub denylist: Vec<String>,
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self {
            min_dimension: MIN_SCAN_DIMENSION,
            denylist: DECORATIVE_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl ImageFilter {
    /// Size is only judged when both width and height are declared and
    /// parse; anything less gets the benefit of the doubt.
    pub fn accepts(&self, src: Option<&str>, width: Option<&str>, height: Option<&str>) -> bool {
        let Some(src) = src.map(str::trim).filter(|s| !s.is_empty()) else {
            return false;
        };
        let lowered = src.to_ascii_lowercase();
        if self.denylist.iter().any(|marker| lowered.contains(marker.as_str())) {
            return false;
        }
        match (width.and_then(parse_dimension), height.and_then(parse_dimension)) {
            (Some(w), Some(h)) => w >= self.min_dimension && h >= self.min_dimension,
            _ => true,
        }
    }
}

/// `"400"`, `" 400px "` → 400. Percentages and garbage → `None`.
pub fn parse_dimension(value: &str) -> Option<u32> {
    let trimmed = value.trim();
    let number = trimmed
        .strip_suffix("px")
        .or_else(|| trimmed.strip_suffix("PX"))
        .unwrap_or(trimmed);
    number.trim().parse::<u32>().ok()
}

pub struct ImageHarvester {
    filter: ImageFilter,
    images: Selector,
    frames: Selector,
}

impl Default for ImageHarvester {
    fn default() -> Self {
        Self::new(ImageFilter::default())
    }
}

impl ImageHarvester {
    pub fn new(filter: ImageFilter) -> Self {
        Self {
            filter,
            images: Selector::parse("img").expect("static selector"),
            frames: Selector::parse("frame[src], iframe[src]").expect("static selector"),
        }
    }

    /// Finds the scan-like images of one document, resolved against `page_url`.
    pub fn harvest(&self, page_index: usize, page_body: &str, page_url: &str) -> DiscoveredImages {
        let document = Html::parse_document(page_body);
        let base = Url::parse(page_url).ok();

        let mut images: Vec<ImageRef> = Vec::new();
        for element in document.select(&self.images) {
            let attrs = element.value();
            let src = attrs.attr("src");
            if !self
                .filter
                .accepts(src, attrs.attr("width"), attrs.attr("height"))
            {
                continue;
            }
            let Some(url) = src.and_then(|src| resolve(src, base.as_ref())) else {
                continue;
            };
            if images.iter().any(|seen| seen.url == url) {
                continue;
            }
            images.push(ImageRef { page_index, url });
        }

        let frames = document
            .select(&self.frames)
            .filter_map(|frame| frame.value().attr("src"))
            .filter_map(|src| resolve(src, base.as_ref()))
            .collect();

        DiscoveredImages { images, frames }
    }

    /// Fallback for pages without direct images: looks one level into the
    /// given frame documents. Frames nested inside those are not followed.
    pub async fn harvest_frames(
        &self,
        fetcher: &dyn Fetcher,
        page_index: usize,
        frames: &[String],
    ) -> Vec<ImageRef> {
        let mut found: Vec<ImageRef> = Vec::new();
        for frame_url in frames {
            let response = match fetcher.fetch(frame_url).await {
                FetchResult::Ok(response) => response,
                FetchResult::Transient(err) | FetchResult::Fatal(err) => {
                    harvest_warn!("Skipping frame {} of page {}: {}", frame_url, page_index, err);
                    continue;
                }
            };
            let decoded = decode_page(&response.body, response.content_type.as_deref());
            let nested = self.harvest(page_index, &decoded.text, frame_url);
            for image in nested.images {
                if !found.iter().any(|seen| seen.url == image.url) {
                    found.push(image);
                }
            }
        }
        found
    }

    /// Downloads one image into `output_dir`, unless an earlier run already did.
    pub async fn materialize(
        &self,
        fetcher: &dyn Fetcher,
        image: &ImageRef,
        output_dir: &Path,
    ) -> Option<StoredImage> {
        let stem = image_file_stem(image.page_index, &image.url);
        if let Some(existing) = existing_image(output_dir, &stem) {
            harvest_debug!("Reusing {} for {}", existing.path.display(), image.url);
            return Some(existing);
        }

        let response = match fetcher.fetch_binary(&image.url).await {
            FetchResult::Ok(response) => response,
            FetchResult::Transient(err) | FetchResult::Fatal(err) => {
                harvest_warn!("Image {} unavailable: {}", image.url, err);
                return None;
            }
        };
        if response.body.is_empty() {
            harvest_warn!("Image {} came back empty", image.url);
            return None;
        }

        let candidate = ImageCandidate {
            page_index: image.page_index,
            url: image.url.clone(),
            raw_bytes: response.body,
            content_type: response.content_type,
        };
        let filename = format!(
            "{stem}.{}",
            image_extension(candidate.content_type.as_deref())
        );
        match AtomicFileWriter::new(output_dir).write_bytes(&filename, &candidate.raw_bytes) {
            Ok(path) => {
                harvest_debug!("Downloaded image {}", path.display());
                Some(StoredImage {
                    path,
                    byte_len: candidate.raw_bytes.len() as u64,
                    reused: false,
                })
            }
            Err(err) => {
                harvest_error!("Failed to store image {}: {}", candidate.url, err);
                None
            }
        }
    }
}

fn existing_image(dir: &Path, stem: &str) -> Option<StoredImage> {
    IMAGE_EXTENSIONS.iter().find_map(|ext| {
        let path = dir.join(format!("{stem}.{ext}"));
        let meta = fs::metadata(&path).ok().filter(|meta| meta.is_file())?;
        Some(StoredImage {
            path,
            byte_len: meta.len(),
            reused: true,
        })
    })
}

fn resolve(reference: &str, base: Option<&Url>) -> Option<String> {
    let trimmed = reference.trim();
    if trimmed.is_empty() || trimmed.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url.into());
    }
    base.and_then(|base| base.join(trimmed).ok()).map(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_tolerate_px_suffix() {
        assert_eq!(parse_dimension(" 450px "), Some(450));
        assert_eq!(parse_dimension("300"), Some(300));
        assert_eq!(parse_dimension("50%"), None);
    }

    #[test]
    fn sources_resolve_against_page_url() {
        let base = Url::parse("http://example.org/issue/v3.2").unwrap();
        assert_eq!(
            resolve("scans/p1.jpg", Some(&base)).as_deref(),
            Some("http://example.org/issue/scans/p1.jpg")
        );
        assert_eq!(resolve("javascript:void(0)", Some(&base)), None);
        assert_eq!(resolve("relative.jpg", None), None);
    }
}
