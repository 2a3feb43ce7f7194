use serde::{Deserialize, Serialize};

/// Width of the separator line written after each page of a crawl
const PAGE_SEPARATOR_WIDTH: usize = 80;

/// Text snapshot of one rendered page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// URL of the page
    pub url: String,

    /// Title of the page, `untitled` when the document has none
    pub title: String,

    /// Extracted text blocks in priority then document order
    pub blocks: Vec<String>,
}

impl PageSnapshot {
    /// Create a new page snapshot
    pub fn new(url: String, title: String, blocks: Vec<String>) -> Self {
        Self { url, title, blocks }
    }

    /// Render the snapshot as the title header followed by one `- ` line per block
    pub fn format(&self) -> String {
        let body = self
            .blocks
            .iter()
            .map(|block| format!("- {}", block))
            .collect::<Vec<_>>()
            .join("\n");
        format!("Title: {}\n\n{}", self.title, body)
    }

    /// Render the snapshot as one entry of a crawl record
    pub fn format_entry(&self) -> String {
        format!(
            "URL: {}\n{}\n{}\n",
            self.url,
            self.format(),
            "=".repeat(PAGE_SEPARATOR_WIDTH)
        )
    }
}

/// Concatenate the entries of every page of one crawl
pub fn format_crawl(pages: &[PageSnapshot]) -> String {
    pages.iter().map(PageSnapshot::format_entry).collect()
}

/// Status of a run as recorded in the structured report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The model reported at least one finding
    Findings,
    /// The model reported no dark patterns
    Clean,
    /// First crawl of the target, nothing to compare against
    NoBaseline,
    /// The comparison could not be performed
    Error,
}

/// A lexical rule hit inside the current crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexicalFinding {
    /// Text block that matched
    pub text: String,

    /// Category of the first matching rule
    pub category: String,

    /// Why the rule counts as urgency
    pub description: String,
}

/// Machine-readable companion of a comparison report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredReport {
    pub url: String,
    pub target: String,
    /// Crawl start time, `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    pub crawl_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_key: Option<String>,
    pub status: RunStatus,
    /// Report text, or the no-baseline message
    pub report: String,
    pub pages_crawled: usize,
    #[serde(default)]
    pub lexical_findings: Vec<LexicalFinding>,
}
