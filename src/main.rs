//! Biblio-Ripple main entry point
//!
//! This is the command-line interface for the Biblio-Ripple literature harvester.

use anyhow::{bail, Context};
use biblio_ripple::config::{load_config_with_hash, Config};
use biblio_ripple::crawler::crawl;
use biblio_ripple::model::SourceId;
use biblio_ripple::output::{load_statistics, print_report, print_statistics, write_markdown_report};
use biblio_ripple::storage::{open_storage, RecordStore};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Biblio-Ripple: a polite academic literature harvester
///
/// Biblio-Ripple runs one search query against ACM, arXiv, IEEE Xplore,
/// Science Direct and Springer Link, spacing out its requests to each
/// site, and stores every article it finds in a local SQLite database.
#[derive(Parser, Debug)]
#[command(name = "biblio-ripple")]
#[command(version)]
#[command(about = "A polite academic literature harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Search query; multiple words are joined with spaces
    #[arg(value_name = "QUERY")]
    query: Vec<String>,

    /// Only crawl this source (repeatable, e.g. -s arxiv -s ieee)
    #[arg(short, long = "source", value_name = "SOURCE")]
    sources: Vec<SourceId>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Cancel the crawl after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Print the crawl report as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let sources = if cli.sources.is_empty() {
        config.enabled_sources()
    } else {
        cli.sources.clone()
    };

    if cli.dry_run {
        handle_dry_run(&config, &sources, &cli.query.join(" "));
        return Ok(());
    }

    if cli.stats {
        return handle_stats(&config);
    }

    let query = cli.query.join(" ");
    if query.trim().is_empty() {
        bail!("no search query given; usage: biblio-ripple <CONFIG> <QUERY>...");
    }

    handle_crawl(&config, &config_hash, &query, &sources, &cli).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("biblio_ripple=info,warn"),
            1 => EnvFilter::new("biblio_ripple=debug,info"),
            2 => EnvFilter::new("biblio_ripple=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective settings of each selected source
fn handle_dry_run(config: &Config, sources: &[SourceId], query: &str) {
    println!("=== Biblio-Ripple Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max attempts: {}", config.crawler.max_attempts);
    println!("  Base delay: {}ms", config.crawler.base_delay_ms);
    println!("  Max delay: {}ms", config.crawler.max_delay_ms);
    println!(
        "  Request timeout: {}s",
        config.crawler.request_timeout_secs
    );

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);

    println!("\nSources ({}):", sources.len());
    for id in sources {
        let source = config.source(*id);
        println!(
            "  - {} (page size {}, {}ms between requests{})",
            id.display_name(),
            source.page_size,
            source.min_interval_ms,
            if source.enabled { "" } else { ", disabled" }
        );
        if let Some(base_url) = &source.base_url {
            println!("    * base URL: {}", base_url);
        }
    }

    println!("\n✓ Configuration is valid");
    if query.trim().is_empty() {
        println!("✓ Would crawl once a query is given");
    } else {
        println!("✓ Would search for \"{}\"", query);
    }
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("failed to open the record database")?;
    let stats = load_statistics(&storage)?;

    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    query: &str,
    sources: &[SourceId],
    cli: &Cli,
) -> anyhow::Result<()> {
    let store: Arc<dyn RecordStore> = Arc::new(
        open_storage(Path::new(&config.output.database_path))
            .context("failed to open the record database")?,
    );

    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, cli.timeout.map(Duration::from_secs));

    tracing::info!(
        "Searching {} source(s) for \"{}\"",
        sources.len(),
        query
    );

    let report = crawl(config, config_hash, store, query, sources, &cancel)
        .await
        .context("crawl failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !cli.quiet {
        print_report(&report);
    }

    let summary_path = Path::new(&config.output.summary_path);
    write_markdown_report(&report, summary_path)
        .with_context(|| format!("failed to write {}", summary_path.display()))?;
    tracing::info!("Summary written to: {}", summary_path.display());

    if !report.is_complete() {
        tracing::warn!("Not every source finished its crawl");
    }

    Ok(())
}

/// Cancels the crawl on Ctrl-C or once the operator deadline passes
fn spawn_cancel_triggers(cancel: &CancellationToken, timeout: Option<Duration>) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling crawl");
            on_signal.cancel();
        }
    });

    if let Some(timeout) = timeout {
        let on_deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            tracing::warn!("Crawl deadline of {}s reached, cancelling", timeout.as_secs());
            on_deadline.cancel();
        });
    }
}
