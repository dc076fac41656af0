use archive_core::ContentCandidate;
use archive_logging::{harvest_debug, harvest_warn};
use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// Article containers used by the archive and by common CMS templates, most
/// specific first. `contentArtcile` is spelled the way the site spells it.
pub const ARTICLE_SELECTORS: &[&str] = &[
    "div#contentArtcile",
    "div.article-content",
    "div.content",
    "article",
    "main",
    "div.post-content",
    "div.entry-content",
];

pub const SELECTOR_MIN_CHARS: usize = 100;
pub const BLOCK_MIN_CHARS: usize = 500;

pub trait Extractor: Send + Sync {
    fn extract(&self, page_index: usize, html: &str) -> Option<ContentCandidate>;
}

/// One heuristic for locating the article container in a parsed page.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>>;
}

/// Accepts the first selector whose first match carries more than
/// `min_chars` characters of visible text.
pub struct SelectorChain {
    selectors: Vec<Selector>,
    min_chars: usize,
}

impl SelectorChain {
    pub fn new(selectors: &[&str], min_chars: usize) -> Self {
        let selectors = selectors
            .iter()
            .filter_map(|raw| match Selector::parse(raw) {
                Ok(selector) => Some(selector),
                Err(err) => {
                    harvest_warn!("Skipping invalid selector {:?}: {}", raw, err);
                    None
                }
            })
            .collect();
        Self {
            selectors,
            min_chars,
        }
    }
}

impl Default for SelectorChain {
    fn default() -> Self {
        Self::new(ARTICLE_SELECTORS, SELECTOR_MIN_CHARS)
    }
}

impl ExtractionStrategy for SelectorChain {
    fn name(&self) -> &'static str {
        "selector-chain"
    }

    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        self.selectors.iter().find_map(|selector| {
            document
                .select(selector)
                .next()
                .filter(|element| visible_text_len(*element) > self.min_chars)
        })
    }
}

/// Picks the longest `div`/`article`/`section` above `min_chars`; the first
/// one wins a tie.
pub struct LargestBlock {
    blocks: Selector,
    min_chars: usize,
}

impl LargestBlock {
    pub fn new(min_chars: usize) -> Self {
        Self {
            blocks: Selector::parse("div, article, section").expect("static selector"),
            min_chars,
        }
    }
}

impl Default for LargestBlock {
    fn default() -> Self {
        Self::new(BLOCK_MIN_CHARS)
    }
}

impl ExtractionStrategy for LargestBlock {
    fn name(&self) -> &'static str {
        "largest-block"
    }

    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let mut best: Option<(usize, ElementRef<'a>)> = None;
        for element in document.select(&self.blocks) {
            let len = visible_text_len(element);
            if len <= self.min_chars {
                continue;
            }
            if best.map_or(true, |(best_len, _)| len > best_len) {
                best = Some((len, element));
            }
        }
        best.map(|(_, element)| element)
    }
}

/// Runs its strategies in order and renders the first hit as plain text.
pub struct ContentExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl ContentExtractor {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(vec![
            Box::new(SelectorChain::default()),
            Box::new(LargestBlock::default()),
        ])
    }
}

impl Extractor for ContentExtractor {
    fn extract(&self, page_index: usize, html: &str) -> Option<ContentCandidate> {
        let document = Html::parse_document(html);
        for strategy in &self.strategies {
            if let Some(element) = strategy.locate(&document) {
                harvest_debug!("Page {}: content located by {}", page_index, strategy.name());
                return ContentCandidate::new(page_index, render_text(element));
            }
        }
        None
    }
}

fn is_hidden(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "noscript" | "template")
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div"
            | "section"
            | "article"
            | "main"
            | "header"
            | "footer"
            | "aside"
            | "nav"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "ul"
            | "ol"
            | "li"
            | "table"
            | "tr"
            | "blockquote"
            | "pre"
            | "figure"
            | "figcaption"
            | "address"
            | "center"
            | "hr"
    )
}

/// Characters of trimmed text nodes below `element`, ignoring script-like tags.
pub fn visible_text_len(element: ElementRef) -> usize {
    fn walk(node: NodeRef<'_, Node>, total: &mut usize) {
        match node.value() {
            Node::Text(text) => *total += text.trim().chars().count(),
            Node::Element(el) if is_hidden(el.name()) => {}
            _ => {
                for child in node.children() {
                    walk(child, total);
                }
            }
        }
    }

    let mut total = 0;
    walk(*element, &mut total);
    total
}

/// Renders an element as paragraphs separated by one blank line.
pub fn render_text(element: ElementRef) -> String {
    let mut builder = TextBuilder::default();
    for child in element.children() {
        builder.visit(child);
    }
    collapse_blank_lines(&builder.out)
}

/// Trims trailing whitespace per line and reduces every run of blank lines
/// to a single blank line.
pub fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            newlines += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if newlines == 0 { "\n" } else { "\n\n" });
        }
        out.push_str(line.trim_start_matches(' '));
        newlines = 0;
    }
    out
}

#[derive(Default)]
struct TextBuilder {
    out: String,
    last_char: Option<char>,
}

impl TextBuilder {
    fn visit(&mut self, node: NodeRef<'_, Node>) {
        match node.value() {
            Node::Text(text) => self.append_text(text),
            Node::Element(el) => {
                let tag = el.name();
                if is_hidden(tag) {
                    return;
                }
                if tag == "br" {
                    self.line_break();
                    return;
                }
                let block = is_block(tag);
                if block {
                    self.paragraph_break();
                }
                for child in node.children() {
                    self.visit(child);
                }
                if block {
                    self.paragraph_break();
                }
            }
            _ => {
                for child in node.children() {
                    self.visit(child);
                }
            }
        }
    }

    fn append_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                if self.last_char.is_none()
                    || self.last_char == Some(' ')
                    || self.last_char == Some('\n')
                {
                    continue;
                }
                self.push_char(' ');
            } else {
                self.push_char(ch);
            }
        }
    }

    fn line_break(&mut self) {
        self.trim_trailing_space();
        if self.out.is_empty() || self.last_char == Some('\n') {
            return;
        }
        self.push_char('\n');
    }

    fn paragraph_break(&mut self) {
        self.trim_trailing_space();
        if self.out.is_empty() || self.out.ends_with("\n\n") {
            return;
        }
        let missing = if self.last_char == Some('\n') { 1 } else { 2 };
        for _ in 0..missing {
            self.push_char('\n');
        }
    }

    fn trim_trailing_space(&mut self) {
        while self.out.ends_with(' ') {
            self.out.pop();
        }
        self.last_char = self.out.chars().next_back();
    }

    fn push_char(&mut self, ch: char) {
        self.out.push(ch);
        self.last_char = Some(ch);
    }
}
