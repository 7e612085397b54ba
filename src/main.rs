// insights-scraper: scrape audience insights for a list of artist ids
//
// Logs go to stderr; stdout carries only the BatchResult JSON.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use insights_scraper::{Orchestrator, RunOptions, load_config, load_yaml_config};

#[derive(Parser)]
#[command(
    name = "insights-scraper",
    about = "Scrape artist audience insights with a headless browser",
    version
)]
struct Cli {
    /// Target identifiers, processed in order
    #[arg(required = true)]
    ids: Vec<String>,

    /// Pause after each navigation so the page can be inspected
    #[arg(long)]
    pause: bool,

    /// YAML config file (defaults to config.yaml in the package root)
    #[arg(short, long, env = "INSIGHTS_SCRAPER_CONFIG")]
    config: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Pretty-print the JSON result
    #[arg(long)]
    pretty: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => load_yaml_config().context("Failed to load config.yaml")?,
    };
    if cli.headed {
        config.browser.headless = false;
    }

    let orchestrator = Orchestrator::new(config)?;

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing the current target");
            ctrl_c_token.cancel();
        }
    });

    info!("Scraping {} target(s)", cli.ids.len());
    let result = orchestrator
        .run(&cli.ids, RunOptions { inspect: cli.pause }, cancel)
        .await?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{json}");

    Ok(())
}
