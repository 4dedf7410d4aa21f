//! confpapers: conference technical-paper catalog scraper.
//! Entry point for the scraper binary.

mod config;

use std::path::PathBuf;

use clap::Parser;
use confpapers_common::FetchClient;
use confpapers_ingestion::{run_scrape, write_catalog};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "confpapers")]
#[command(about = "Scrape a conference schedule into a JSON paper catalog")]
#[command(version)]
struct Cli {
    /// Path to confpapers.toml (defaults to $CONFPAPERS_CONFIG, then ./confpapers.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Catalog output path (overrides output.path)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Image directory (overrides output.images_dir)
    #[arg(long)]
    images_dir: Option<PathBuf>,

    /// Skip image downloads
    #[arg(long)]
    no_images: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("confpapers=debug,info")),
        )
        .init();

    let cli = Cli::parse();
    info!("confpapers {}", env!("CARGO_PKG_VERSION"));

    let config = config::Config::load(cli.config.as_deref())?;
    info!(base = %config.site.base_url, concurrency = config.http.concurrency, "Configuration loaded");

    let mut job = config.to_job();
    if cli.no_images {
        job.images_dir = None;
    } else if let Some(dir) = cli.images_dir {
        job.images_dir = Some(dir);
    }
    let output = cli.output.unwrap_or_else(|| PathBuf::from(&config.output.path));

    let client = FetchClient::with_reqwest(&config.site.user_agent, config.timeout(), config.retry_policy())?;
    let out = run_scrape(&client, &job, None).await?;

    write_catalog(&output, &out.papers)?;
    if let Some(staged) = out.staged_images {
        staged.commit()?;
    }

    for err in &out.result.errors {
        tracing::warn!("{err}");
    }
    info!(
        snippets = out.result.snippets_found,
        duplicates = out.result.papers_duplicate,
        enrichment_failures = out.result.enrichment_failures,
        images = out.result.images_downloaded,
        duration_ms = out.result.duration_ms,
        "Run summary"
    );
    println!("Saved {} papers to {}", out.papers.len(), output.display());
    Ok(())
}
