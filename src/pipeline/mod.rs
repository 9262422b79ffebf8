//! Batch drivers: tie discovery → browser extraction → CSV together.
//!
//! ## Run modes
//!
//! `run_for_sale()` — crawl every configured subdistrict's streets, extract
//!   each listing, keep the configured property type, write one dated CSV.
//!
//! `run_sold_expired()` — same extraction over an explicit list of listing URLs.
//!
//! `run_photos()` — download gallery photos for an explicit list of listings.
//!
//! One browser session serves the whole run, strictly one listing at a time.
//! A failed listing is logged and counted; the batch moves on.

use crate::browser::login::login;
use crate::browser::{PageSession, WebDriverSession};
use crate::config::{AppConfig, Credentials};
use crate::discovery::Discovery;
use crate::extract::ListingExtractor;
use crate::models::ListingRecord;
use crate::output::{dated_output_path, write_rows, Row};
use crate::photos::{download_listing_photos, PhotoStats};
use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// A listing URL plus the leading columns its output row should carry.
#[derive(Debug, Clone)]
pub struct ListingTarget {
    pub url: String,
    pub context: Row,
}

impl ListingTarget {
    pub fn bare(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            context: Row::new(),
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct PipelineStats {
    pub listings_visited: usize,
    pub records_kept: usize,
    pub filtered_out: usize,
    pub errors: usize,
}

/// Extract each target in turn, keeping records whose type matches `property_type`.
pub async fn collect_listings<S: PageSession>(
    session: &S,
    extractor: &ListingExtractor,
    targets: &[ListingTarget],
    property_type: &str,
    stats: &mut PipelineStats,
) -> Vec<Row> {
    let mut rows = Vec::new();

    for target in targets {
        stats.listings_visited += 1;
        let record = match extractor.build_record(session, &target.url).await {
            Ok(record) => record,
            Err(e) if e.is_structural() => {
                error!("{}: page layout changed: {}", target.url, e);
                stats.errors += 1;
                continue;
            }
            Err(e) => {
                warn!("{}: {}", target.url, e);
                stats.errors += 1;
                continue;
            }
        };

        if record.property_type() != Some(property_type) {
            info!(
                "{}: skipping type {:?}",
                record.listing_id,
                record.property_type().unwrap_or("<none>")
            );
            stats.filtered_out += 1;
            continue;
        }

        let mut row = target.context.clone();
        row.extend(record.to_row());
        rows.push(row);
        stats.records_kept += 1;
    }

    rows
}

pub struct Pipeline {
    config: AppConfig,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    fn extractor(&self) -> ListingExtractor {
        ListingExtractor::new(&self.config.scraper.base_url, &self.config.browser)
    }

    /// Connect to the WebDriver and sign in.
    async fn open_session(&self, credentials: &Credentials) -> Result<WebDriverSession> {
        let session = WebDriverSession::connect(&self.config.browser)
            .await
            .context("Failed to start browser session")?;

        login(
            &session,
            &self.config.scraper.base_url,
            credentials,
            self.config.browser.login_timeout(),
        )
        .await
        .context("Login failed")?;

        tokio::time::sleep(Duration::from_secs(self.config.browser.login_settle_secs)).await;
        Ok(session)
    }

    async fn close_session(session: WebDriverSession) {
        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {}", e);
        }
    }

    fn write_dated(&self, dir: &Path, rows: &[Row]) -> Result<Option<PathBuf>> {
        let path = dated_output_path(dir, Local::now().date_naive());
        Ok(match write_rows(&path, rows)? {
            0 => None,
            _ => Some(path),
        })
    }

    pub async fn run_for_sale(&self, credentials: &Credentials) -> Result<PipelineStats> {
        let discovery = Discovery::new(&self.config.scraper)?;
        let session = self.open_session(credentials).await?;
        let result = self.crawl_for_sale(&discovery, &session).await;
        Self::close_session(session).await;

        let (rows, stats) = result?;
        self.write_dated(&self.config.output.for_sale_dir, &rows)?;
        Ok(stats)
    }

    async fn crawl_for_sale<S: PageSession>(
        &self,
        discovery: &Discovery,
        session: &S,
    ) -> Result<(Vec<Row>, PipelineStats)> {
        let extractor = self.extractor();
        let mut stats = PipelineStats::default();
        let mut rows = Vec::new();

        for subdistrict in &self.config.pipeline.subdistricts {
            info!("=== {} ({}) ===", subdistrict.name, subdistrict.id);
            let streets = match discovery.streets(subdistrict.id).await {
                Ok(streets) => streets,
                Err(e) => {
                    warn!("{}: {:#}", subdistrict.name, e);
                    stats.errors += 1;
                    continue;
                }
            };

            for (street_name, street_url) in &streets {
                let properties = match discovery.properties(street_url).await {
                    Ok(properties) => properties,
                    Err(e) => {
                        warn!("{}: {:#}", street_name, e);
                        stats.errors += 1;
                        continue;
                    }
                };

                let targets: Vec<ListingTarget> = properties
                    .into_iter()
                    .map(|(property_name, url)| {
                        let mut context = Row::new();
                        context.insert("subdistrict_name".into(), subdistrict.name.clone());
                        context.insert("street_name".into(), street_name.clone());
                        context.insert("property_name".into(), property_name);
                        ListingTarget { url, context }
                    })
                    .collect();

                rows.extend(
                    collect_listings(
                        session,
                        &extractor,
                        &targets,
                        &self.config.pipeline.property_type,
                        &mut stats,
                    )
                    .await,
                );
            }
        }

        Ok((rows, stats))
    }

    pub async fn run_sold_expired(
        &self,
        credentials: &Credentials,
        urls: &[String],
    ) -> Result<PipelineStats> {
        let targets: Vec<ListingTarget> = urls.iter().map(ListingTarget::bare).collect();
        let session = self.open_session(credentials).await?;

        let mut stats = PipelineStats::default();
        let rows = collect_listings(
            &session,
            &self.extractor(),
            &targets,
            &self.config.pipeline.property_type,
            &mut stats,
        )
        .await;
        Self::close_session(session).await;

        self.write_dated(&self.config.output.sold_expired_dir, &rows)?;
        Ok(stats)
    }

    pub async fn run_photos(&self, credentials: &Credentials, urls: &[String]) -> Result<PhotoStats> {
        let discovery = Discovery::new(&self.config.scraper)?;
        let session = self.open_session(credentials).await?;

        let mut total = PhotoStats::default();
        for url in urls {
            match download_listing_photos(
                &session,
                discovery.client(),
                &self.config.scraper.base_url,
                url,
                &self.config.output.photos_dir,
                self.config.browser.gallery_timeout(),
            )
            .await
            {
                Ok(stats) => {
                    total.downloaded += stats.downloaded;
                    total.skipped += stats.skipped;
                    total.failed += stats.failed;
                }
                Err(e) => {
                    warn!("{}: {:#}", url, e);
                    total.failed += 1;
                }
            }
        }

        Self::close_session(session).await;
        Ok(total)
    }

    /// Extract a single listing without filtering.
    pub async fn extract_one(&self, credentials: &Credentials, url: &str) -> Result<ListingRecord> {
        let session = self.open_session(credentials).await?;
        let result = self.extractor().build_record(&session, url).await;
        Self::close_session(session).await;
        Ok(result?)
    }
}

/// URLs from the command line, else from a file (one per line, `#` comments), else the config list.
pub fn resolve_listing_urls(
    args: Vec<String>,
    file: Option<&Path>,
    configured: &[String],
) -> Result<Vec<String>> {
    if !args.is_empty() {
        return Ok(args);
    }
    if let Some(file) = file {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read url list {:?}", file))?;
        return Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(String::from)
            .collect());
    }
    Ok(configured.to_vec())
}
