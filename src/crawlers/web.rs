use crate::crawlers::crawler::{PageFetcher, PageRenderer};
use crate::error::Result;
use crate::filter::{UrlFilter, UrlFilterConfig};
use crate::parsers::{DEFAULT_MAX_ITEMS, Parser};
use crate::results::PageSnapshot;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// Breadth-first, same-origin site crawler
///
/// Pages are handled strictly one at a time. The raw page from the fetcher
/// supplies links, the rendered page from the renderer supplies the text.
pub struct SiteWalker<F, R> {
    fetcher: F,
    renderer: R,
    max_items: usize,
    exclude_patterns: Vec<String>,
}

impl<F: PageFetcher, R: PageRenderer> SiteWalker<F, R> {
    pub fn new(fetcher: F, renderer: R) -> Self {
        Self {
            fetcher,
            renderer,
            max_items: DEFAULT_MAX_ITEMS,
            exclude_patterns: Vec::new(),
        }
    }

    /// Set the number of text blocks kept per page
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Set regex patterns for links that must never be queued
    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    /// Crawl from `start_url`, visiting at most `max_pages` URLs
    ///
    /// Pages that fail to fetch are skipped without expanding their links;
    /// pages that fail to render keep their links but yield no snapshot.
    /// Snapshots come back in visiting order.
    pub async fn crawl(&self, start_url: &str, max_pages: usize) -> Result<Vec<PageSnapshot>> {
        ::log::info!("Starting crawl of {} (max {} pages)", start_url, max_pages);

        let root_url = Url::parse(start_url)?;
        let url_filter = self.create_url_filter(&root_url)?;

        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier: VecDeque<String> = VecDeque::from([start_url.to_string()]);
        let mut pages = Vec::new();

        while visited.len() < max_pages {
            let Some(url) = frontier.pop_front() else {
                break;
            };
            if !visited.insert(url.clone()) {
                ::log::trace!("Skipping already visited: {}", url);
                continue;
            }

            ::log::info!("Crawling {}", url);

            let html = match self.fetcher.fetch(&url).await {
                Ok(html) => html,
                Err(e) => {
                    ::log::warn!("Failed to fetch {}: {}", url, e);
                    continue;
                }
            };
            let base = match Url::parse(&url) {
                Ok(base) => base,
                Err(e) => {
                    ::log::warn!("Cannot resolve links of {}: {}", url, e);
                    continue;
                }
            };

            let queued = queue_links(&base, &html, &url_filter, &visited, &mut frontier);
            ::log::debug!("Queued {} links from {}", queued, url);

            match self.renderer.render(&url).await {
                Ok(rendered) => pages.push(Parser::snapshot(&rendered, &url, self.max_items)),
                Err(e) => ::log::warn!("Failed to render {}: {}", url, e),
            }
        }

        ::log::info!(
            "Crawl finished: {} pages visited, {} snapshots",
            visited.len(),
            pages.len()
        );
        Ok(pages)
    }

    /// Creates a URL filter based on the root URL and configured exclusions
    fn create_url_filter(&self, root_url: &Url) -> Result<UrlFilter> {
        let config = UrlFilterConfig {
            exclude_patterns: self.exclude_patterns.clone(),
            ..UrlFilterConfig::for_start_url(root_url)
        };
        Ok(UrlFilter::new(config)?)
    }
}

/// Resolve the page's links and queue the unvisited ones the filter accepts
fn queue_links(
    base: &Url,
    html: &str,
    url_filter: &UrlFilter,
    visited: &HashSet<String>,
    frontier: &mut VecDeque<String>,
) -> usize {
    let mut queued = 0;
    for link in Parser::links(html) {
        let Ok(resolved) = base.join(&link) else {
            ::log::trace!("Unresolvable link {:?} on {}", link, base);
            continue;
        };
        if !url_filter.should_crawl(&resolved) {
            ::log::debug!("URL filter rejected: {}", resolved);
            continue;
        }

        let resolved = resolved.to_string();
        if !visited.contains(&resolved) {
            frontier.push_back(resolved);
            queued += 1;
        }
    }
    queued
}
