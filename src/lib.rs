// Re-export modules
pub mod archive;
pub mod compare;
pub mod config;
pub mod crawlers;
pub mod error;
pub mod filter;
pub mod llm;
pub mod parsers;
pub mod pipeline;
pub mod results;
pub mod urgency;
pub mod utils;

// Re-export commonly used types for convenience
pub use archive::{CrawlKey, CrawlRecord, DirArchive, MemoryArchive, SnapshotArchive};
pub use compare::{ComparisonOutcome, Report, ReportKind};
pub use config::{AnalyzerConfig, WatchConfig};
pub use error::{Error, Result};
pub use llm::{Analyzer, TextGenerator};
pub use pipeline::RunSummary;
pub use results::{PageSnapshot, RunStatus, StructuredReport};

use std::path::PathBuf;

/// Main builder for one watch run of a site
pub struct UrgencyWatch {
    config: WatchConfig,
    analyzer: Option<Analyzer>,
}

impl UrgencyWatch {
    /// Create a new watch of the given start URL with default settings
    pub fn new(start_url: &str) -> Self {
        Self {
            config: WatchConfig::new(start_url),
            analyzer: None,
        }
    }

    /// Set the maximum number of pages visited
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    /// Set the maximum number of text blocks kept per page
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.config.max_items = max_items;
        self
    }

    /// Set the directory holding archived crawls
    pub fn with_archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.archive_dir = dir.into();
        self
    }

    /// Set the directory receiving reports
    pub fn with_reports_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.reports_dir = dir.into();
        self
    }

    /// Replace the whole configuration except the start URL
    ///
    /// The URL given to [`UrgencyWatch::new`] always wins; the configuration's
    /// `start_url` is only used when the builder was created without one.
    pub fn with_config(mut self, mut config: WatchConfig) -> Self {
        if !self.config.start_url.trim().is_empty() {
            config.start_url = std::mem::take(&mut self.config.start_url);
        }
        self.config = config;
        self
    }

    /// Load configuration from a file
    pub fn with_config_file(self, path: impl AsRef<std::path::Path>) -> Result<Self> {
        let config = WatchConfig::from_file(path)?;
        Ok(self.with_config(config))
    }

    /// Load configuration from a string
    pub fn with_config_str(self, config_str: &str) -> Result<Self> {
        let config = WatchConfig::from_json(config_str)?;
        Ok(self.with_config(config))
    }

    /// Use this analyzer instead of the one named by the configuration
    pub fn with_analyzer(mut self, analyzer: Analyzer) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Crawl, archive, compare and write the reports
    pub async fn run(self) -> Result<RunSummary> {
        let mut config = self.config;

        // Override the WebDriver URL with an environment variable if provided
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                config.webdriver_url = webdriver_url;
            }
        }

        let analyzer = self
            .analyzer
            .unwrap_or_else(|| Analyzer::from_config(&config.analyzer));
        if let Analyzer::Unavailable { reason } = &analyzer {
            ::log::warn!("Comparisons will report errors: {}", reason);
        }

        pipeline::run(&config, &analyzer).await
    }
}
