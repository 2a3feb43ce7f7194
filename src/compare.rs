//! Comparison of two crawls by a language model.

use crate::llm::Analyzer;
use crate::urgency::ExampleCorpus;
use serde::{Deserialize, Serialize};

/// Exact reply expected when the model finds nothing
pub const NO_PATTERNS_SENTINEL: &str = "No dark patterns detected.";

/// Prefix of every report produced from a failed comparison
pub const ERROR_MARKER: &str = "Error during analysis:";

/// Message used when a target has no earlier crawl
pub const NO_BASELINE_MESSAGE: &str = "No previous crawl available for comparison.";

const TASK_DESCRIPTION: &str = "\
You are an expert in detecting dark patterns in ecommerce websites. Find the words and phrases that indicate false urgency.
\"False Urgency\" means falsely stating or implying a sense of urgency or scarcity so as to mislead a user into making an immediate purchase or taking an immediate action which may lead to a purchase, including:
i. Showing false popularity of a product or service to manipulate user decisions;
ii. Stating that quantities of a particular product or service are more limited than they actually are.
For instance: i. Limited time deal, Limited availability
ii. Only a few left in stock";

const OUTPUT_INSTRUCTIONS: &str = "\
Analyze both versions and provide a detailed report on any dark patterns found, focusing on false urgency or scarcity tactics. For each finding, include:
Was there indicative dark pattern: Your response
Rationale: Your justification";

/// Classification of a report body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Findings,
    Clean,
    Error,
}

/// Normalized output of one comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub kind: ReportKind,
    pub body: String,
}

impl Report {
    /// Classify a model reply after trimming it
    ///
    /// A blank reply carries no verdict and is reported as an error.
    pub fn from_response(response: &str) -> Self {
        let body = response.trim().to_string();
        if body.is_empty() {
            return Self::error("empty response from analyzer");
        }
        let kind = if body == NO_PATTERNS_SENTINEL {
            ReportKind::Clean
        } else {
            ReportKind::Findings
        };
        Self { kind, body }
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            kind: ReportKind::Error,
            body: format!("{} {}", ERROR_MARKER, message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == ReportKind::Error
    }
}

/// Result of asking for a comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparisonOutcome {
    /// First crawl of the target; the model was not consulted
    NoBaseline,
    Compared(Report),
}

impl ComparisonOutcome {
    /// Text shown to the user for this outcome
    pub fn text(&self) -> &str {
        match self {
            ComparisonOutcome::NoBaseline => NO_BASELINE_MESSAGE,
            ComparisonOutcome::Compared(report) => &report.body,
        }
    }
}

/// Assemble the instruction payload sent to the model
pub fn build_prompt(corpus: &ExampleCorpus, baseline: &str, current: &str) -> String {
    let examples = corpus
        .prompt_examples()
        .iter()
        .map(|example| format!("\n- {}", example))
        .collect::<String>();

    format!(
        "{TASK_DESCRIPTION}\n\n\
         Examples of False Urgency:{examples}\n\n\
         These examples demonstrate common dark patterns that create false urgency or scarcity. \
         Look for similar patterns in the following website content.\n\n\
         Compare the following two versions of website content. The first is from a previous crawl, \
         and the second is from the current crawl.\n\n\
         --- PREVIOUS CRAWL ---\n{baseline}\n\n\
         --- CURRENT CRAWL ---\n{current}\n\n\
         {OUTPUT_INSTRUCTIONS}\n\n\
         If no dark patterns are found, simply state \"{NO_PATTERNS_SENTINEL}\"\n"
    )
}

/// Compare the current crawl against its baseline
///
/// Never fails: an unavailable analyzer or a failed call yields an error
/// report whose body starts with [`ERROR_MARKER`].
pub async fn compare(
    current: &str,
    baseline: Option<&str>,
    corpus: &ExampleCorpus,
    analyzer: &Analyzer,
) -> ComparisonOutcome {
    let Some(baseline) = baseline else {
        ::log::info!("No previous crawl found for comparison");
        return ComparisonOutcome::NoBaseline;
    };

    let generator = match analyzer {
        Analyzer::Available(generator) => generator,
        Analyzer::Unavailable { reason } => {
            ::log::error!("Analyzer unavailable: {}", reason);
            return ComparisonOutcome::Compared(Report::error(format!(
                "analyzer not initialized ({})",
                reason
            )));
        }
    };

    let prompt = build_prompt(corpus, baseline, current);
    ::log::debug!(
        "Sending {} byte prompt to {} analyzer",
        prompt.len(),
        generator.name()
    );

    match generator.generate(&prompt).await {
        Ok(response) => {
            let report = Report::from_response(&response);
            ::log::info!("Comparison finished: {:?}", report.kind);
            ComparisonOutcome::Compared(report)
        }
        Err(e) => {
            ::log::error!("Error during {} call: {}", generator.name(), e);
            ComparisonOutcome::Compared(Report::error(e))
        }
    }
}
