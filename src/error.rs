use thiserror::Error;

/// Result type used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the watcher
///
/// Per-page crawl failures and language-model failures never surface here;
/// they are absorbed by the site walker and the comparison engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing configuration
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebDriver session could not be opened or a command failed
    #[error("WebDriver error: {0}")]
    WebDriver(String),

    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// The archive already holds a record under this key for the target
    #[error("crawl key {key} already exists for target {target}")]
    KeyCollision { target: String, key: String },

    /// The whole run exceeded its time budget
    #[error("run timed out after {0} seconds")]
    Timeout(u64),

    /// The language-model backend failed or returned nothing usable
    #[error("generation failed: {0}")]
    Generate(String),
}
