mod browser;
mod config;
mod discovery;
mod extract;
mod models;
mod output;
mod photos;
mod pipeline;
mod utils;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{AppConfig, Credentials};
use crate::pipeline::{resolve_listing_urls, Pipeline};

#[derive(Parser)]
#[command(name = "viewpoint-scraper", about = "Viewpoint listing and photo scraper", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl configured subdistricts and export for-sale single-family listings
    ForSale,

    /// Export sold/expired listings from a list of listing URLs
    SoldExpired {
        /// Listing paths, e.g. /cutsheet/202422079/1/50-Glissade-Court-Bedford
        urls: Vec<String>,

        /// File with one listing path per line
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Download gallery photos for a list of listing URLs
    Photos {
        urls: Vec<String>,

        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Extract one listing and print it as JSON
    Extract { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "viewpoint_scraper=info,warn",
        1 => "viewpoint_scraper=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;
    let credentials = Credentials::from_env()?;
    let pipeline = Pipeline::new(config.clone());

    match cli.command {
        Command::ForSale => {
            let mut timer = utils::BatchTimer::start("For-sale crawl");
            let stats = pipeline.run_for_sale(&credentials).await?;
            timer.set_listings(stats.listings_visited);
            info!(
                "Done: {} listings visited, {} kept, {} filtered, {} errors",
                stats.listings_visited, stats.records_kept, stats.filtered_out, stats.errors
            );
        }

        Command::SoldExpired { urls, file } => {
            let urls = resolve_listing_urls(urls, file.as_deref(), &config.pipeline.listing_urls)?;
            if urls.is_empty() {
                bail!("No listing URLs given (arguments, --file, or pipeline.listing_urls)");
            }
            let mut timer = utils::BatchTimer::start(format!("Sold/expired export ({} listings)", urls.len()));
            let stats = pipeline.run_sold_expired(&credentials, &urls).await?;
            timer.set_listings(stats.listings_visited);
            info!(
                "Done: {} listings visited, {} kept, {} filtered, {} errors",
                stats.listings_visited, stats.records_kept, stats.filtered_out, stats.errors
            );
        }

        Command::Photos { urls, file } => {
            let urls = resolve_listing_urls(urls, file.as_deref(), &config.pipeline.listing_urls)?;
            if urls.is_empty() {
                bail!("No listing URLs given (arguments, --file, or pipeline.listing_urls)");
            }
            let mut timer = utils::BatchTimer::start(format!("Photo download ({} listings)", urls.len()));
            let stats = pipeline.run_photos(&credentials, &urls).await?;
            timer.set_listings(urls.len());
            info!(
                "Done: {} downloaded, {} already present, {} failed",
                stats.downloaded, stats.skipped, stats.failed
            );
        }

        Command::Extract { url } => {
            let record = pipeline.extract_one(&credentials, &url).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}
