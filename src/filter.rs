use crate::utils::netloc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for link filtering in the site walker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UrlFilterConfig {
    /// Network location links must share with the start URL
    pub required_netloc: String,

    /// Regex patterns for links to exclude
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl UrlFilterConfig {
    /// Restrict links to the network location of `start_url`
    pub fn for_start_url(start_url: &Url) -> Self {
        Self {
            required_netloc: netloc(start_url),
            exclude_patterns: Vec::new(),
        }
    }
}

/// Decides which discovered links may join the crawl frontier
#[derive(Debug)]
pub struct UrlFilter {
    config: UrlFilterConfig,
    exclude_regexes: Vec<Regex>,
}

impl UrlFilter {
    /// Create a new URL filter from configuration
    pub fn new(config: UrlFilterConfig) -> Result<Self, regex::Error> {
        let mut exclude_regexes = Vec::with_capacity(config.exclude_patterns.len());
        for pattern in &config.exclude_patterns {
            exclude_regexes.push(Regex::new(pattern)?);
        }

        Ok(Self {
            config,
            exclude_regexes,
        })
    }

    /// Determine if a resolved link should be queued
    pub fn should_crawl(&self, url: &Url) -> bool {
        if !self.is_same_origin(url) {
            return false;
        }

        let url_str = url.as_str();
        !self.exclude_regexes.iter().any(|regex| regex.is_match(url_str))
    }

    /// A link is same-origin when it has no network location or the start URL's one
    fn is_same_origin(&self, url: &Url) -> bool {
        let location = netloc(url);
        location.is_empty() || location == self.config.required_netloc
    }
}
