//! Media-Ripple main entry point
//!
//! This is the command-line interface for the Media-Ripple crawler.

use anyhow::{bail, Context};
use clap::Parser;
use media_ripple::config::{load_config, resolve_seeds, validate, Config};
use media_ripple::crawler::run_crawl;
use media_ripple::output::{load_statistics, print_report, print_statistics};
use media_ripple::storage::open_storage;
use media_ripple::Platform;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Media-Ripple: a resumable media crawler
///
/// Media-Ripple walks a platform's pages breadth-first from seed URLs or
/// search keywords and downloads every track or video it finds. Progress is
/// checkpointed, so an interrupted crawl resumes where it stopped.
#[derive(Parser, Debug)]
#[command(name = "media-ripple")]
#[command(version)]
#[command(about = "A resumable media crawler", long_about = None)]
struct Cli {
    /// Platform to crawl (youtube or soundcloud)
    #[arg(value_name = "PLATFORM")]
    platform: Platform,

    /// Seed URLs to start crawling from
    #[arg(short, long, num_args = 1..)]
    urls: Vec<String>,

    /// Search keywords to seed the crawl (YouTube only)
    #[arg(short, long, num_args = 1..)]
    keywords: Vec<String>,

    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum crawl depth
    #[arg(short, long)]
    depth: Option<u32>,

    /// Number of download workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Number of scrolls per page when loading dynamic content
    #[arg(short = 's', long = "scroll", visible_alias = "scroll-count")]
    scroll_count: Option<u32>,

    /// Audio quality passed to the downloader
    #[arg(short, long)]
    quality: Option<String>,

    /// Audio format (mp3, wav, flac, m4a)
    #[arg(short, long)]
    format: Option<String>,

    /// Output folder for downloads
    #[arg(short = 'o', long = "output", visible_alias = "output-dir")]
    output_dir: Option<String>,

    /// SQLite database holding the crawl state
    #[arg(long = "db", visible_alias = "database")]
    database: Option<String>,

    /// Show the browser window while rendering
    #[arg(long)]
    no_headless: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, conflicts_with = "verbose")]
    quiet: bool,

    /// Wipe the persisted crawl state and start fresh
    #[arg(long, conflicts_with = "stats")]
    clear_state: bool,

    /// Show statistics from the database and exit
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = build_config(&cli)?;

    if cli.stats {
        handle_stats(&config)?;
        return Ok(ExitCode::SUCCESS);
    }

    handle_crawl(config, cli.clear_state).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("media_ripple=info,warn"),
            1 => EnvFilter::new("media_ripple=debug,info"),
            2 => EnvFilter::new("media_ripple=trace,debug"),
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

/// Loads the config file, if any, and lays the command-line flags over it
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let config = load_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            if config.platform != cli.platform {
                bail!(
                    "Configuration file is for {}, but {} was requested",
                    config.platform,
                    cli.platform
                );
            }
            config
        }
        None => Config::for_platform(cli.platform),
    };

    config.seeds.urls.extend(cli.urls.iter().cloned());
    config.seeds.keywords.extend(cli.keywords.iter().cloned());

    if let Some(depth) = cli.depth {
        config.crawler.max_depth = depth;
    }
    if let Some(workers) = cli.workers {
        config.crawler.workers = workers;
    }
    if let Some(scroll_count) = cli.scroll_count {
        config.renderer.scroll_count = scroll_count;
    }
    if let Some(quality) = &cli.quality {
        config.download.quality = quality.clone();
    }
    if let Some(format) = &cli.format {
        config.download.format = format.to_ascii_lowercase();
    }
    if let Some(output_dir) = &cli.output_dir {
        config.download.output_dir = output_dir.clone();
    }
    if let Some(database) = &cli.database {
        config.output.database_path = Some(database.clone());
    }
    if cli.no_headless {
        config.renderer.headless = false;
    }

    validate(&config).context("Invalid settings")?;
    Ok(config)
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = config.database_path();
    println!("Database: {}\n", path.display());

    let storage = open_storage(&path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    let stats = load_statistics(&storage).context("Failed to read crawl state")?;

    print_statistics(&stats);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, clear_state: bool) -> anyhow::Result<ExitCode> {
    let seeds = resolve_seeds(&config).context("No usable seeds")?;

    tracing::info!(
        "Crawling {} from {} seeds: depth {}, {} workers, {} {} into {}",
        config.platform,
        seeds.len(),
        config.crawler.max_depth,
        config.crawler.workers,
        config.download.quality,
        config.download.format,
        config.download.resolved_output_dir().display()
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight work and saving progress");
            ctrl_c.cancel();
        }
    });

    let report = run_crawl(config, seeds, clear_state, cancel)
        .await
        .context("Crawl failed")?;

    print_report(&report);

    if report.cancelled {
        Ok(ExitCode::from(130))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
