/// One paginated unit of an issue. `index` is 1-based and defines output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageJob {
    pub index: usize,
    pub url: String,
}

impl PageJob {
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
        }
    }
}

/// Normalized text extracted from one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentCandidate {
    pub page_index: usize,
    pub text: String,
}

impl ContentCandidate {
    /// Returns `None` when the text is blank; a candidate never carries empty text.
    pub fn new(page_index: usize, text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return None;
        }
        Some(Self { page_index, text })
    }
}
