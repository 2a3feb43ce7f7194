use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Configuration for one watch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// URL to start crawling from, usually supplied on the command line
    #[serde(default)]
    pub start_url: String,

    /// Maximum number of pages visited per crawl
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Maximum number of text blocks kept per page
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Timeout for the raw page fetch used for link discovery
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Settle period after navigation before the rendered source is read
    #[serde(default = "default_render_wait_ms")]
    pub render_wait_ms: u64,

    /// Upper bound for a complete crawl-and-compare run
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Regex patterns for links that must never be queued
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Directory holding archived crawl records
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// Directory receiving comparison reports
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    /// Curated CSV of labeled urgency examples
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    /// Language-model backend used for comparisons
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

/// Language-model backend selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum AnalyzerConfig {
    /// Google Gemini `generateContent`
    Gemini {
        #[serde(default = "default_gemini_model")]
        model: String,
        #[serde(default = "default_gemini_key_env")]
        api_key_env: String,
    },

    /// Any OpenAI-compatible chat completions endpoint
    #[serde(rename = "openai")]
    OpenAi {
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default = "default_openai_base_url")]
        base_url: String,
        #[serde(default = "default_openai_key_env")]
        api_key_env: String,
    },

    /// No backend; every comparison reports an error
    Disabled,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig::Gemini {
            model: default_gemini_model(),
            api_key_env: default_gemini_key_env(),
        }
    }
}

impl WatchConfig {
    /// Create a new configuration with default values
    pub fn new(start_url: &str) -> Self {
        Self {
            start_url: start_url.to_string(),
            max_pages: default_max_pages(),
            max_items: default_max_items(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            render_wait_ms: default_render_wait_ms(),
            run_timeout_secs: default_run_timeout_secs(),
            webdriver_url: default_webdriver_url(),
            exclude_patterns: Vec::new(),
            archive_dir: default_archive_dir(),
            reports_dir: default_reports_dir(),
            dataset_path: default_dataset_path(),
            analyzer: AnalyzerConfig::default(),
        }
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reject configurations no run could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.start_url.trim().is_empty() {
            return Err(Error::Config("start_url is required".to_string()));
        }
        if self.max_pages == 0 {
            return Err(Error::Config("max_pages must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn default_max_pages() -> usize {
    1
}

fn default_max_items() -> usize {
    200
}

fn default_fetch_timeout_secs() -> u64 {
    5
}

fn default_render_wait_ms() -> u64 {
    2000
}

fn default_run_timeout_secs() -> u64 {
    300
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("crawls")
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("cleaned_dataset.csv")
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
