pub mod html;


use crate::results::PageSnapshot;

/// Default number of text blocks kept per page
pub const DEFAULT_MAX_ITEMS: usize = 200;

/// Entry points used by the site walker
pub struct Parser;

impl Parser {
    /// Links found in raw page HTML, as written in the document
    pub fn links(html: &str) -> Vec<String> {
        html::parse_links(html)
    }

    /// Text snapshot of rendered page HTML
    pub fn snapshot(html: &str, url: &str, max_items: usize) -> PageSnapshot {
        html::parse(html, url, max_items)
    }
}
