//! arxivdigest - arXiv Computer Vision digest
//!
//! Two steps that share markdown files on disk:
//!
//! ```bash
//! arxivdigest fetch --days 3 --max-results 1000
//! arxivdigest analyze --topics "3D reconstruction,video generation"
//! ```

use anyhow::{Context, Result};
use arxivdigest::{
    analysis::analyze_papers,
    arxiv::{ArxivClient, FetchOptions, DEFAULT_PAGE_SIZE},
    config::AiConfig,
    listing,
    llm::{LlmClient, LlmConfig},
    report, DateWindow,
};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// arXiv Computer Vision digest
#[derive(Parser)]
#[command(name = "arxivdigest")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch recent cs.CV papers and write a markdown listing
    Fetch {
        /// Number of past days to fetch papers for
        #[arg(long, default_value_t = 3)]
        days: u32,

        /// Maximum number of results to request from arXiv
        #[arg(long, default_value_t = 1000)]
        max_results: usize,

        /// Directory for the listing
        #[arg(short, long, default_value = listing::DEFAULT_PAPERS_DIR)]
        output_dir: PathBuf,

        /// Results per page request
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,

        /// Seconds to wait between page requests
        #[arg(long, default_value_t = 3)]
        delay_secs: u64,
    },

    /// Classify listed papers against research topics and write a report
    Analyze {
        /// Input listing (default: latest listing in --papers-dir)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output report (default: analyzed_papers_<range>.md next to the input)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Comma-separated research topics (default: RESEARCH_TOPICS)
        #[arg(long)]
        topics: Option<String>,

        /// Directory searched for the latest listing
        #[arg(long, default_value = listing::DEFAULT_PAPERS_DIR)]
        papers_dir: PathBuf,

        /// Also export every result as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Fetch {
            days,
            max_results,
            output_dir,
            page_size,
            delay_secs,
        } => run_fetch(days, max_results, output_dir, page_size, delay_secs).await,
        Commands::Analyze {
            input,
            output,
            topics,
            papers_dir,
            csv,
        } => run_analyze(input, output, topics, papers_dir, csv).await,
    }
}

// ============================================================================
// Fetch
// ============================================================================

async fn run_fetch(
    days: u32,
    max_results: usize,
    output_dir: PathBuf,
    page_size: usize,
    delay_secs: u64,
) -> Result<()> {
    let options = FetchOptions {
        max_results,
        page_size,
        request_delay: Duration::from_secs(delay_secs),
        ..FetchOptions::last_days(days)?
    };

    println!(
        "Fetching Computer Vision papers from arXiv from the past {} days ({})...",
        days, options.window
    );

    let client = ArxivClient::new()?;
    let (path, papers) = listing::fetch_to_listing(&client, &options, &output_dir).await?;

    println!("\nFound {} papers.", papers.len());
    for (date, count) in listing::daily_counts(&papers).iter().rev() {
        println!("  {}: {}", date, count);
    }

    println!("\n✓ Done! Results saved to {}", path.display());
    Ok(())
}

// ============================================================================
// Analyze
// ============================================================================

async fn run_analyze(
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    topics: Option<String>,
    papers_dir: PathBuf,
    csv: Option<PathBuf>,
) -> Result<()> {
    let input = match input {
        Some(path) => path,
        None => {
            let path = listing::find_latest_listing(&papers_dir)
                .context("Run `arxivdigest fetch` first or pass --input")?;
            println!("Using latest listing: {}", path.display());
            path
        }
    };
    let output = output.unwrap_or_else(|| listing::report_path_for(&input));

    let config = AiConfig::from_env()?;
    let topics = config.resolve_topics(topics.as_deref())?;
    info!(topics = ?topics, model = %config.model, "Loaded configuration");

    println!("Loading papers from {}...", input.display());
    let papers = listing::load_listing(&input)
        .with_context(|| format!("Failed to load listing {}", input.display()))?;
    if papers.is_empty() {
        anyhow::bail!("No papers found in {}", input.display());
    }
    println!("Loaded {} papers.", papers.len());

    let client = LlmClient::new(LlmConfig::from(&config))?;
    let analysis = analyze_papers(&client, &papers, &topics).await;

    println!(
        "\nAnalysis complete! Found {} relevant papers out of {} total papers.",
        analysis.relevant_count(),
        analysis.results.len()
    );
    if !analysis.skipped.is_empty() {
        println!("Skipped {} papers after repeated errors.", analysis.skipped.len());
    }

    let window = date_window(&input).or_else(|| date_window(&output));
    report::write_report(
        &output,
        &analysis,
        &topics,
        window.as_ref(),
        Local::now().naive_local(),
    )
    .with_context(|| format!("Failed to write report {}", output.display()))?;

    if let Some(csv_path) = csv {
        report::write_csv(&csv_path, &analysis.results)
            .with_context(|| format!("Failed to write CSV {}", csv_path.display()))?;
        println!("Saved CSV: {}", csv_path.display());
    }

    println!(
        "Token usage: {} prompt + {} completion = {} total",
        analysis.usage.prompt_tokens, analysis.usage.completion_tokens, analysis.usage.total_tokens
    );
    println!("\n✓ Check {} for results.", output.display());
    Ok(())
}

fn date_window(path: &Path) -> Option<DateWindow> {
    path.file_name()
        .and_then(|n| DateWindow::from_file_name(&n.to_string_lossy()))
}
