//! Lexical false-urgency rules and the example corpus built from them.
//!
//! The rules are not the detector; they curate the few-shot examples that
//! the comparison prompt shows the language model, and annotate the
//! structured report with lexical hits.

use crate::error::Result;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

/// Number of corpus examples placed in a prompt
pub const PROMPT_EXAMPLE_LIMIT: usize = 20;

/// Examples used when no curated dataset is available
pub const FALLBACK_EXAMPLES: [&str; 5] = [
    "Hurry! Only 2 left in stock",
    "15 people are looking at this right now",
    "Limited time offer!",
    "Selling fast!",
    "Only 3 items left at this price",
];

/// Kind of pressure a rule detects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UrgencyCategory {
    Quantity,
    Time,
    Scarcity,
    SocialProof,
    Action,
    Price,
}

impl fmt::Display for UrgencyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UrgencyCategory::Quantity => "quantity",
            UrgencyCategory::Time => "time",
            UrgencyCategory::Scarcity => "scarcity",
            UrgencyCategory::SocialProof => "social-proof",
            UrgencyCategory::Action => "action",
            UrgencyCategory::Price => "price",
        };
        f.write_str(name)
    }
}

use UrgencyCategory::*;

/// Rule table, evaluated top to bottom
const RULES: &[(&str, UrgencyCategory, &str)] = &[
    (
        r"\b(only|just)\s+\d+\s+(left|remaining|in stock|available|copy|copies)\b",
        Quantity,
        "Creates false scarcity by suggesting limited quantity",
    ),
    (
        r"\b(only|just)\s+(a few|a couple of|a handful of)\s+(left|remaining|in stock|available)\b",
        Quantity,
        "Uses vague quantity terms to create urgency",
    ),
    (
        r"\b(only|just)\s+\d+\s+(left|remaining)\s+at\s+this\s+price\b",
        Quantity,
        "Ties a limited quantity to the current price",
    ),
    (
        r"\b(ends?|expires?)\s+(in|at|today|tonight|soon|in \d+ (hours?|minutes?|days?))\b",
        Time,
        "Implies time pressure to force quick decisions",
    ),
    (
        r"\b(limited\s+time|time\s+limited|flash\s+sale|flash\s+deal)\b",
        Time,
        "Suggests the offer is only available for a short time",
    ),
    (
        r"\b(one\s+day\s+only|today\s+only|tonight\s+only|this\s+weekend\s+only)\b",
        Time,
        "Restricts the offer to a short window",
    ),
    (
        r"\b(almost\s+gone|almost\s+sold\s+out|going\s+fast|selling\s+fast|flying\s+off\s+the\s+shelves)\b",
        Scarcity,
        "Creates fear of missing out",
    ),
    (
        r"\b(running\s+out|running\s+low|low\s+in\s+stock|low\s+stock|stock\s+is\s+low)\b",
        Scarcity,
        "Claims stock is about to run out",
    ),
    (
        r"\b(supplies\s+are\s+limited|quantities\s+are\s+limited|while\s+supplies\s+last|while\s+stock\s+lasts)\b",
        Scarcity,
        "Claims the supply itself is limited",
    ),
    (
        r"\b(\d+\s+people\s+(are\s+)?(viewing|watching|purchasing|buying|in\s+line))\b",
        SocialProof,
        "Uses social pressure to encourage immediate action",
    ),
    (
        r"\b(\d+\s+(sold|bought|purchased)\s+(in|during)\s+the\s+last\s+\d+\s+(hours?|minutes?|days?))\b",
        SocialProof,
        "Cites recent sales to imply popularity",
    ),
    (
        r"\b(hurry|act\s+now|don'?t\s+miss|last\s+chance|order\s+now|buy\s+now|shop\s+now)\b",
        Action,
        "Direct commands that pressure immediate action",
    ),
    (
        r"\b(while\s+supplies\s+last|while\s+stock\s+lasts|while\s+quantities\s+last)\b",
        Action,
        "Ties the call to action to dwindling stock",
    ),
    (
        r"\b(price\s+increase\s+in\s+\d+\s+(hours?|days?)|price\s+goes\s+up\s+soon)\b",
        Price,
        "Threatens an imminent price increase",
    ),
    (
        r"\b(limited\s+time\s+offer|special\s+offer\s+expires\s+soon|today\s+only\s+deal)\b",
        Price,
        "Presents the price as a short-lived offer",
    ),
];

/// One compiled rule
#[derive(Debug)]
pub struct UrgencyRule {
    pub regex: Regex,
    pub category: UrgencyCategory,
    pub description: &'static str,
}

/// Ordered, compiled rule table
#[derive(Debug)]
pub struct UrgencyRuleSet {
    rules: Vec<UrgencyRule>,
}

static DEFAULT_RULES: LazyLock<UrgencyRuleSet> =
    LazyLock::new(|| UrgencyRuleSet::from_table(RULES).expect("built-in urgency rules compile"));

impl UrgencyRuleSet {
    /// The built-in rule table, compiled once
    pub fn standard() -> &'static UrgencyRuleSet {
        &DEFAULT_RULES
    }

    /// Compile a `(pattern, category, description)` table
    pub fn from_table(table: &[(&str, UrgencyCategory, &'static str)]) -> Result<Self> {
        let mut rules = Vec::with_capacity(table.len());
        for (pattern, category, description) in table {
            let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
            rules.push(UrgencyRule {
                regex,
                category: *category,
                description: *description,
            });
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[UrgencyRule] {
        &self.rules
    }

    /// First rule matching the text, in table order
    pub fn first_match(&self, text: &str) -> Option<&UrgencyRule> {
        let text = text.to_lowercase();
        self.rules.iter().find(|rule| rule.regex.is_match(&text))
    }

    /// Whether the text reads as false urgency
    pub fn classify(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }
}

/// Classify with the built-in rules
pub fn classify(text: &str) -> bool {
    UrgencyRuleSet::standard().classify(text)
}

/// One row of a labeled urgency dataset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabeledRow {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub label: String,
}

impl LabeledRow {
    pub fn new(text: &str, label: &str) -> Self {
        Self {
            text: text.to_string(),
            label: label.to_string(),
        }
    }

    fn is_positive(&self) -> bool {
        self.label.trim() == "1" && !self.text.trim().is_empty()
    }
}

/// Example phrases shown to the language model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleCorpus {
    examples: Vec<String>,
}

impl ExampleCorpus {
    /// Canonical phrases used when no dataset is usable
    pub fn fallback() -> Self {
        Self {
            examples: FALLBACK_EXAMPLES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn examples(&self) -> &[String] {
        &self.examples
    }

    /// The leading examples that fit into a prompt
    pub fn prompt_examples(&self) -> &[String] {
        &self.examples[..self.examples.len().min(PROMPT_EXAMPLE_LIMIT)]
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}

/// Keep positively labeled, non-empty rows; fall back when none remain
pub fn build_corpus<I>(rows: I) -> ExampleCorpus
where
    I: IntoIterator<Item = LabeledRow>,
{
    let examples = rows
        .into_iter()
        .filter(LabeledRow::is_positive)
        .map(|row| row.text)
        .collect::<Vec<_>>();

    if examples.is_empty() {
        ::log::warn!("Labeled dataset holds no positive examples, using fallback corpus");
        return ExampleCorpus::fallback();
    }
    ExampleCorpus { examples }
}

/// Load the curated dataset, falling back to the canonical phrases on any error
pub fn load_corpus<P: AsRef<Path>>(path: P) -> ExampleCorpus {
    let path = path.as_ref();
    match read_rows(path) {
        Ok(rows) => build_corpus(rows),
        Err(e) => {
            ::log::error!("Error loading urgency examples from {}: {}", path.display(), e);
            ExampleCorpus::fallback()
        }
    }
}

fn read_rows(path: &Path) -> Result<Vec<LabeledRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Counts reported by [`clean_dataset`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanSummary {
    pub total: usize,
    pub kept: usize,
}

/// Copy only the rows whose `text` column classifies as urgency
///
/// All columns of kept rows are preserved, headers included.
pub fn clean_dataset<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<CleanSummary> {
    let rules = UrgencyRuleSet::standard();
    let mut reader = csv::Reader::from_path(input.as_ref())?;
    let headers = reader.headers()?.clone();
    let text_column = headers.iter().position(|h| h == "text").ok_or_else(|| {
        crate::error::Error::Config(format!(
            "{} has no `text` column",
            input.as_ref().display()
        ))
    })?;

    let mut writer = csv::Writer::from_path(output.as_ref())?;
    writer.write_record(&headers)?;

    let mut summary = CleanSummary { total: 0, kept: 0 };
    for record in reader.records() {
        let record = record?;
        summary.total += 1;
        if record.get(text_column).is_some_and(|text| rules.classify(text)) {
            writer.write_record(&record)?;
            summary.kept += 1;
        }
    }
    writer.flush()?;

    ::log::info!(
        "Kept {} of {} rows, written to {}",
        summary.kept,
        summary.total,
        output.as_ref().display()
    );
    Ok(summary)
}
