use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "urgency-watch")]
#[command(about = "Watches shop sites for newly introduced false-urgency patterns")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl a site and compare it against its previous crawl
    Watch {
        /// URL to start crawling from
        url: String,

        /// Maximum number of pages visited
        #[arg(short, long)]
        max_pages: Option<usize>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory holding archived crawls
        #[arg(long)]
        archive_dir: Option<PathBuf>,

        /// Directory receiving reports
        #[arg(long)]
        reports_dir: Option<PathBuf>,
    },

    /// List the archived crawls of a site
    History {
        /// URL the site was crawled from
        url: String,

        /// Directory holding archived crawls
        #[arg(long, default_value = "crawls")]
        archive_dir: PathBuf,
    },

    /// Keep only the rows of a labeled dataset that read as urgency
    Clean {
        /// Raw labeled CSV with a `text` column
        #[arg(short, long, default_value = "dataset.csv")]
        input: PathBuf,

        /// Destination of the curated CSV
        #[arg(short, long, default_value = "cleaned_dataset.csv")]
        output: PathBuf,
    },

    /// Check a phrase against the lexical urgency rules
    Classify {
        /// Phrase to check
        text: String,
    },
}
