//! One watch run: crawl, archive, compare against the previous crawl, report.

use crate::archive::{CrawlKey, CrawlRecord, DirArchive, SnapshotArchive, append_unique};
use crate::compare::{ComparisonOutcome, ReportKind, compare};
use crate::config::WatchConfig;
use crate::crawlers::{HttpFetcher, PageFetcher, PageRenderer, SiteWalker, WebDriverRenderer};
use crate::error::{Error, Result};
use crate::llm::Analyzer;
use crate::results::{LexicalFinding, PageSnapshot, RunStatus, StructuredReport, format_crawl};
use crate::urgency::{ExampleCorpus, UrgencyRuleSet, load_corpus};
use crate::utils::target_id;
use chrono::Local;
use std::collections::HashSet;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything one run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub url: String,
    pub record: CrawlRecord,
    pub baseline_key: Option<CrawlKey>,
    pub outcome: ComparisonOutcome,
    pub pages: Vec<PageSnapshot>,
}

impl RunSummary {
    pub fn status(&self) -> RunStatus {
        match &self.outcome {
            ComparisonOutcome::NoBaseline => RunStatus::NoBaseline,
            ComparisonOutcome::Compared(report) => match report.kind {
                ReportKind::Findings => RunStatus::Findings,
                ReportKind::Clean => RunStatus::Clean,
                ReportKind::Error => RunStatus::Error,
            },
        }
    }

    /// Machine-readable form of the run
    pub fn to_structured(&self) -> StructuredReport {
        StructuredReport {
            url: self.url.clone(),
            target: self.record.target.clone(),
            timestamp: self.record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            crawl_key: self.record.key.to_string(),
            baseline_key: self.baseline_key.as_ref().map(CrawlKey::to_string),
            status: self.status(),
            report: self.outcome.text().to_string(),
            pages_crawled: self.pages.len(),
            lexical_findings: lexical_findings(&self.pages),
        }
    }
}

/// Blocks of the crawl that trip a lexical urgency rule, each text once
pub fn lexical_findings(pages: &[PageSnapshot]) -> Vec<LexicalFinding> {
    let rules = UrgencyRuleSet::standard();
    let mut seen = HashSet::new();
    let mut findings = Vec::new();

    for block in pages.iter().flat_map(|page| page.blocks.iter()) {
        if !seen.insert(block.as_str()) {
            continue;
        }
        if let Some(rule) = rules.first_match(block) {
            findings.push(LexicalFinding {
                text: block.clone(),
                category: rule.category.to_string(),
                description: rule.description.to_string(),
            });
        }
    }
    findings
}

/// Crawl the target, archive the crawl and compare it with its predecessor
pub async fn run_once<F, R, A>(
    start_url: &str,
    max_pages: usize,
    walker: &SiteWalker<F, R>,
    archive: &mut A,
    corpus: &ExampleCorpus,
    analyzer: &Analyzer,
) -> Result<RunSummary>
where
    F: PageFetcher,
    R: PageRenderer,
    A: SnapshotArchive + ?Sized,
{
    let target = target_id(start_url);
    let started = Local::now().naive_local();

    let pages = walker.crawl(start_url, max_pages).await?;
    let record = append_unique(
        archive,
        CrawlRecord::new(&target, started, format_crawl(&pages)),
    )?;
    ::log::info!("Crawl {} of {} saved", record.key, start_url);

    let baseline = archive.most_recent_before(&target, &record.key)?;
    match &baseline {
        Some(previous) => ::log::info!("Comparing with previous crawl {}", previous.key),
        None => ::log::info!("No previous crawl found for {}", target),
    }

    let outcome = compare(
        &record.content,
        baseline.as_ref().map(|previous| previous.content.as_str()),
        corpus,
        analyzer,
    )
    .await;

    Ok(RunSummary {
        url: start_url.to_string(),
        record,
        baseline_key: baseline.map(|previous| previous.key),
        outcome,
        pages,
    })
}

/// Write the report text and its JSON companion, keyed like the crawl
///
/// The text report is only written when a comparison took place.
pub fn write_reports<P: AsRef<Path>>(reports_dir: P, summary: &RunSummary) -> Result<Vec<PathBuf>> {
    let dir = reports_dir.as_ref().join(&summary.record.target);
    fs::create_dir_all(&dir)?;

    let mut written = Vec::new();
    if let ComparisonOutcome::Compared(report) = &summary.outcome {
        let path = dir.join(format!("comparison_report_{}.txt", summary.record.key));
        fs::write(&path, &report.body)?;
        written.push(path);
    }

    let path = dir.join(format!("report_{}.json", summary.record.key));
    fs::write(&path, serde_json::to_string_pretty(&summary.to_structured())?)?;
    written.push(path);

    for path in &written {
        ::log::info!("Report saved to {}", path.display());
    }
    Ok(written)
}

/// Run once against the live site, archive directory and reports directory
///
/// The whole run is bounded by `run_timeout_secs`. Crawl records appended
/// before the deadline stay archived.
pub async fn run(config: &WatchConfig, analyzer: &Analyzer) -> Result<RunSummary> {
    config.validate()?;
    with_run_timeout(config.run_timeout_secs, run_with_config(config, analyzer)).await
}

async fn run_with_config(config: &WatchConfig, analyzer: &Analyzer) -> Result<RunSummary> {
    let fetcher = HttpFetcher::new(Duration::from_secs(config.fetch_timeout_secs))?;
    let renderer = WebDriverRenderer::new(
        &config.webdriver_url,
        Duration::from_millis(config.render_wait_ms),
    );
    let walker = SiteWalker::new(fetcher, renderer)
        .with_max_items(config.max_items)
        .with_exclude_patterns(config.exclude_patterns.clone());
    let mut archive = DirArchive::new(&config.archive_dir);
    let corpus = load_corpus(&config.dataset_path);
    ::log::debug!("Loaded {} urgency examples", corpus.len());

    let summary = run_once(
        &config.start_url,
        config.max_pages,
        &walker,
        &mut archive,
        &corpus,
        analyzer,
    )
    .await?;
    write_reports(&config.reports_dir, &summary)?;
    Ok(summary)
}

/// Fail with [`Error::Timeout`] when `fut` outlives `secs`
pub async fn with_run_timeout<T, Fut>(secs: u64, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(Duration::from_secs(secs), fut).await {
        Ok(result) => result,
        Err(_) => {
            ::log::error!("Run exceeded {} seconds, aborting", secs);
            Err(Error::Timeout(secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;
    use crate::compare::{ERROR_MARKER, NO_BASELINE_MESSAGE};
    use crate::llm::TextGenerator;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Single page whose HTML can change between crawls
    #[derive(Clone)]
    struct MutablePage {
        html: Arc<Mutex<String>>,
    }

    impl MutablePage {
        fn new(body: &str) -> Self {
            let page = Self {
                html: Arc::new(Mutex::new(String::new())),
            };
            page.set(body);
            page
        }

        fn set(&self, body: &str) {
            *self.html.lock().unwrap() =
                format!("<html><head><title>Shop</title></head><body>{}</body></html>", body);
        }
    }

    #[async_trait]
    impl PageFetcher for MutablePage {
        async fn fetch(&self, _url: &str) -> Result<String> {
            Ok(self.html.lock().unwrap().clone())
        }
    }

    #[async_trait]
    impl PageRenderer for MutablePage {
        async fn render(&self, _url: &str) -> Result<String> {
            Ok(self.html.lock().unwrap().clone())
        }
    }

    struct EchoPrompt {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TextGenerator for EchoPrompt {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let current = prompt.split("--- CURRENT CRAWL ---").nth(1).unwrap_or_default();
            if current.contains("Only 2 left in stock") {
                Ok("Was there indicative dark pattern: Yes\nRationale: new stock counter".into())
            } else {
                Ok("No dark patterns detected.".into())
            }
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_first_run_has_no_baseline_then_compares() {
        let page = MutablePage::new("<button>Add to basket</button>");
        let walker = SiteWalker::new(page.clone(), page.clone());
        let mut archive = MemoryArchive::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let analyzer = Analyzer::available(EchoPrompt {
            calls: Arc::clone(&calls),
        });
        let corpus = ExampleCorpus::fallback();
        let url = "https://shop.example.com/";

        let first = run_once(url, 1, &walker, &mut archive, &corpus, &analyzer)
            .await
            .unwrap();
        assert_eq!(first.outcome, ComparisonOutcome::NoBaseline);
        assert_eq!(first.status(), RunStatus::NoBaseline);
        assert_eq!(first.baseline_key, None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        page.set("<button>Add to basket</button><span>Only 2 left in stock</span>");
        let second = run_once(url, 1, &walker, &mut archive, &corpus, &analyzer)
            .await
            .unwrap();
        assert_eq!(second.status(), RunStatus::Findings);
        assert_eq!(second.baseline_key, Some(first.record.key.clone()));
        assert!(second.record.key > first.record.key);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let structured = second.to_structured();
        assert_eq!(structured.url, url);
        assert_eq!(structured.target, target_id(url));
        assert_eq!(structured.pages_crawled, 1);
        assert_eq!(structured.lexical_findings.len(), 1);
        assert_eq!(structured.lexical_findings[0].text, "Only 2 left in stock");
        assert_eq!(structured.lexical_findings[0].category, "quantity");
    }

    #[tokio::test]
    async fn test_archived_content_matches_crawl() {
        let page = MutablePage::new("<button>Add to basket</button>");
        let walker = SiteWalker::new(page.clone(), page.clone());
        let mut archive = MemoryArchive::new();
        let analyzer = Analyzer::unavailable("disabled");

        let summary = run_once(
            "https://shop.example.com/",
            1,
            &walker,
            &mut archive,
            &ExampleCorpus::fallback(),
            &analyzer,
        )
        .await
        .unwrap();

        let stored = archive
            .get(&target_id("https://shop.example.com/"), &summary.record.key)
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.content,
            format!(
                "URL: https://shop.example.com/\nTitle: Shop\n\n- Add to basket\n{}\n",
                "=".repeat(80)
            )
        );
    }

    #[tokio::test]
    async fn test_unavailable_analyzer_is_reported_not_raised() {
        let page = MutablePage::new("<button>Add to basket</button>");
        let walker = SiteWalker::new(page.clone(), page.clone());
        let mut archive = MemoryArchive::new();
        let analyzer = Analyzer::unavailable("GEMINI_API_KEY not set");
        let corpus = ExampleCorpus::fallback();
        let url = "https://shop.example.com/";

        run_once(url, 1, &walker, &mut archive, &corpus, &analyzer).await.unwrap();
        let second = run_once(url, 1, &walker, &mut archive, &corpus, &analyzer)
            .await
            .unwrap();

        assert_eq!(second.status(), RunStatus::Error);
        assert!(second.outcome.text().starts_with(ERROR_MARKER));
    }

    #[tokio::test]
    async fn test_similar_urls_never_share_a_baseline() {
        let page = MutablePage::new("<button>Add to basket</button>");
        let walker = SiteWalker::new(page.clone(), page.clone());
        let mut archive = MemoryArchive::new();
        let analyzer = Analyzer::unavailable("disabled");
        let corpus = ExampleCorpus::fallback();
        let base = format!("https://shop.example.com/{}", "catalog/".repeat(15));

        let first_url = format!("{}item-1", base);
        let second_url = format!("{}item-2", base);
        run_once(&first_url, 1, &walker, &mut archive, &corpus, &analyzer).await.unwrap();
        let second = run_once(&second_url, 1, &walker, &mut archive, &corpus, &analyzer)
            .await
            .unwrap();
        assert_eq!(second.outcome, ComparisonOutcome::NoBaseline);
        assert_eq!(second.baseline_key, None);

        let nested = run_once("https://shop.example.com/a/b", 1, &walker, &mut archive, &corpus, &analyzer)
            .await
            .unwrap();
        let flat = run_once("https://shop.example.com/a_b", 1, &walker, &mut archive, &corpus, &analyzer)
            .await
            .unwrap();
        assert_ne!(nested.record.target, flat.record.target);
        assert_eq!(flat.outcome, ComparisonOutcome::NoBaseline);
    }

    #[tokio::test]
    async fn test_invalid_url_fails_run() {
        let page = MutablePage::new("");
        let walker = SiteWalker::new(page.clone(), page);
        let mut archive = MemoryArchive::new();
        let result = run_once(
            "shop.example.com",
            1,
            &walker,
            &mut archive,
            &ExampleCorpus::fallback(),
            &Analyzer::unavailable("disabled"),
        )
        .await;
        assert!(matches!(result, Err(Error::Url(_))));
        assert!(archive.list(&target_id("shop.example.com")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_reports() {
        let page = MutablePage::new("<span>Hurry, sale ends tonight</span>");
        let walker = SiteWalker::new(page.clone(), page.clone());
        let mut archive = MemoryArchive::new();
        let analyzer = Analyzer::unavailable("disabled");
        let corpus = ExampleCorpus::fallback();
        let url = "https://shop.example.com/";
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();

        let first = run_once(url, 1, &walker, &mut archive, &corpus, &analyzer).await.unwrap();
        let written = write_reports(dir, &first).unwrap();
        assert_eq!(written.len(), 1);

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&written[0]).unwrap()).unwrap();
        assert_eq!(json["status"], "no_baseline");
        assert_eq!(json["report"], NO_BASELINE_MESSAGE);
        assert_eq!(json["crawl_key"], first.record.key.as_str());
        assert!(json.get("baseline_key").is_none());

        let second = run_once(url, 1, &walker, &mut archive, &corpus, &analyzer).await.unwrap();
        let written = write_reports(dir, &second).unwrap();
        assert_eq!(written.len(), 2);
        let text = fs::read_to_string(&written[0]).unwrap();
        assert!(text.starts_with(ERROR_MARKER));
        assert!(
            written[0]
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("comparison_report_")
        );
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(())
        };
        let result = with_run_timeout(0, slow).await;
        assert!(matches!(result, Err(Error::Timeout(0))));

        let quick = with_run_timeout(300, async { Ok(7) }).await.unwrap();
        assert_eq!(quick, 7);
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config() {
        let mut config = WatchConfig::new("https://shop.example.com/");
        config.max_pages = 0;
        let result = run(&config, &Analyzer::unavailable("disabled")).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_lexical_findings_deduplicate() {
        let pages = vec![
            PageSnapshot::new(
                "https://a.example/".into(),
                "a".into(),
                vec!["Selling fast!".into(), "Free returns".into()],
            ),
            PageSnapshot::new("https://a.example/b".into(), "b".into(), vec!["Selling fast!".into()]),
        ];
        let findings = lexical_findings(&pages);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, "scarcity");
    }
}
