use crate::ContentCandidate;

pub fn page_marker(index: usize) -> String {
    format!("--- PAGE {index} ---")
}

/// Joins per-page text into the issue document.
///
/// Pages are sorted by index first, so the result does not depend on the
/// order in which workers finished. Returns `None` when no page has content.
pub fn assemble_issue_text(mut pages: Vec<ContentCandidate>) -> Option<String> {
    pages.retain(|page| !page.text.trim().is_empty());
    if pages.is_empty() {
        return None;
    }
    pages.sort_by_key(|page| page.page_index);

    let mut document = String::new();
    for page in &pages {
        if !document.is_empty() {
            document.push_str("\n\n");
        }
        document.push_str(&page_marker(page.page_index));
        document.push_str("\n\n");
        document.push_str(page.text.trim());
    }
    document.push('\n');
    Some(document)
}
