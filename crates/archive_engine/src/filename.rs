use sha2::{Digest, Sha256};

use archive_core::JobKey;

/// `page_{NNN}_{hash8}`: unique per page for distinct URLs and stable across
/// reruns, so an image already on disk can be recognised without fetching it.
pub fn image_file_stem(page_index: usize, url: &str) -> String {
    format!("page_{page_index:03}_{}", short_hash(url))
}

/// Extension for a downloaded image, from its declared content type.
pub fn image_extension(content_type: Option<&str>) -> &'static str {
    let ct = content_type.unwrap_or_default().to_ascii_lowercase();
    if ct.contains("png") {
        "png"
    } else if ct.contains("gif") {
        "gif"
    } else {
        "jpg"
    }
}

pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "png", "gif"];

/// `{month}_{year}_text.txt` with the month label made filesystem-safe.
pub fn text_output_filename(key: &JobKey) -> String {
    format!("{}_{}_text.txt", sanitize_component(&key.month), key.year)
}

/// Windows-safe single path component. Non-ASCII letters (Devanagari month
/// labels, for instance) are kept as they are.
pub fn sanitize_component(input: &str) -> String {
    let mut compacted = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }
    let mut cleaned = compacted.trim_matches(&['_', ' ', '.'][..]).to_string();
    if cleaned.is_empty() {
        cleaned = "unnamed".to_string();
    }
    if is_reserved_windows_name(&cleaned) {
        cleaned.push('_');
    }
    cleaned
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
