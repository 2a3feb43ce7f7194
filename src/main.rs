use clap::Parser;
use urgency_watch::archive::{DirArchive, SnapshotArchive};
use urgency_watch::urgency::{UrgencyRuleSet, clean_dataset};
use urgency_watch::utils::target_id;
use urgency_watch::{ComparisonOutcome, UrgencyWatch};

mod args;
use args::{Args, Command};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    let result = match args.command {
        Command::Watch {
            url,
            max_pages,
            config,
            archive_dir,
            reports_dir,
        } => watch(url, max_pages, config, archive_dir, reports_dir).await,
        Command::History { url, archive_dir } => history(&url, archive_dir),
        Command::Clean { input, output } => clean_dataset(&input, &output).map(|summary| {
            println!(
                "Kept {} of {} rows in {}",
                summary.kept,
                summary.total,
                output.display()
            );
        }),
        Command::Classify { text } => {
            classify(&text);
            Ok(())
        }
    };

    if let Err(e) = result {
        ::log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn watch(
    url: String,
    max_pages: Option<usize>,
    config: Option<std::path::PathBuf>,
    archive_dir: Option<std::path::PathBuf>,
    reports_dir: Option<std::path::PathBuf>,
) -> urgency_watch::Result<()> {
    println!("Note: Rendering requires a WebDriver server (e.g., ChromeDriver).");
    println!(
        "Set WEBDRIVER_URL environment variable if not using the default http://localhost:4444"
    );

    // Command-line values win over the configuration file
    let mut watch = UrgencyWatch::new(&url);
    if let Some(path) = config {
        watch = watch.with_config_file(path)?;
    }
    if let Some(max_pages) = max_pages {
        watch = watch.with_max_pages(max_pages);
    }
    if let Some(dir) = archive_dir {
        watch = watch.with_archive_dir(dir);
    }
    if let Some(dir) = reports_dir {
        watch = watch.with_reports_dir(dir);
    }

    let start_time = std::time::Instant::now();
    let summary = watch.run().await?;
    ::log::info!(
        "Run complete - {} pages in {:.2} seconds",
        summary.pages.len(),
        start_time.elapsed().as_secs_f64()
    );

    println!("Crawl {} saved ({} pages)", summary.record.key, summary.pages.len());
    match &summary.outcome {
        ComparisonOutcome::NoBaseline => println!("{}", summary.outcome.text()),
        ComparisonOutcome::Compared(report) => {
            if let Some(baseline) = &summary.baseline_key {
                println!("Compared with crawl {}\n", baseline);
            }
            println!("{}", report.body);
        }
    }
    Ok(())
}

fn history(url: &str, archive_dir: std::path::PathBuf) -> urgency_watch::Result<()> {
    let target = target_id(url);
    let archive = DirArchive::new(archive_dir);
    let keys = archive.list(&target)?;

    if keys.is_empty() {
        println!("No crawls archived for {} in {}", url, archive.root().display());
        return Ok(());
    }
    for key in keys.iter().rev() {
        println!("{}  {}", key, key.time().format("%Y-%m-%d %H:%M:%S"));
    }
    Ok(())
}

fn classify(text: &str) {
    match UrgencyRuleSet::standard().first_match(text) {
        Some(rule) => println!("urgency ({}): {}", rule.category, rule.description),
        None => println!("no urgency pattern"),
    }
}
