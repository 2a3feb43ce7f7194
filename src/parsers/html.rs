use crate::results::PageSnapshot;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// Element categories scanned for text, highest priority first
pub const BLOCK_TAGS: [&str; 6] = ["button", "span", "a", "div", "p", "li"];

/// Elements whose text never reaches the screen
const HIDDEN_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Blocks must be longer than this many characters
const MIN_BLOCK_CHARS: usize = 5;

static BLOCK_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    BLOCK_TAGS
        .iter()
        .map(|tag| Selector::parse(tag).expect("block tag is a valid selector"))
        .collect()
});

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("title is a valid selector"));

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("a[href] is a valid selector"));

/// Build the text snapshot of a rendered document
///
/// Categories are scanned in [`BLOCK_TAGS`] order, elements within a
/// category in document order. Scanning stops as soon as `max_items`
/// blocks have been collected.
pub fn extract(doc: &Html, url: &str, max_items: usize) -> PageSnapshot {
    let mut blocks = Vec::new();

    'categories: for selector in BLOCK_SELECTORS.iter() {
        for element in doc.select(selector) {
            if blocks.len() >= max_items {
                break 'categories;
            }
            let text = visible_text(element);
            if text.chars().count() > MIN_BLOCK_CHARS {
                blocks.push(text);
            }
        }
    }

    ::log::debug!("Extracted {} text blocks from {}", blocks.len(), url);

    PageSnapshot::new(url.to_string(), title(doc), blocks)
}

/// Parse raw HTML and build its snapshot
pub fn parse(html: &str, url: &str, max_items: usize) -> PageSnapshot {
    let doc = Html::parse_document(html);
    extract(&doc, url, max_items)
}

/// Document title, trimmed, or `untitled`
pub fn title(doc: &Html) -> String {
    doc.select(&TITLE_SELECTOR)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| "untitled".to_string())
}

/// Visible text of an element
///
/// Every descendant text node is trimmed and the non-empty pieces are
/// concatenated without a separator.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            let piece = text.trim();
            if !piece.is_empty() {
                out.push_str(piece);
            }
        } else if let Some(child_element) = ElementRef::wrap(child) {
            if !HIDDEN_TAGS.contains(&child_element.value().name()) {
                collect_text(child_element, out);
            }
        }
    }
}

/// Extracts every `href` value of the document's anchors
pub fn parse_links(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let links = doc
        .select(&LINK_SELECTOR)
        .filter_map(|e| e.value().attr("href"))
        .map(|s| s.to_string())
        .collect::<Vec<String>>();

    ::log::debug!("HTML parser found {} links", links.len());
    if !links.is_empty() {
        ::log::trace!(
            "First few links: {:?}",
            links.iter().take(5).collect::<Vec<_>>()
        );
    }

    links
}
