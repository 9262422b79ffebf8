//! Static link discovery: subdistrict → streets → listing pages.

pub mod http_client;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ScraperConfig;

use self::http_client::HttpClient;

const STREET_LINKS: &str = "div#subdistrict-list a";
const PROPERTY_LINKS: &str = "div#property-list a";
const LISTING_PREFIX: &str = "/cutsheet";

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("selector {}: {:?}", css, e))
}

/// Street name → absolute street URL, in page order.
pub fn parse_street_links(html: &str, base: &Url) -> Result<IndexMap<String, String>> {
    let doc = Html::parse_document(html);
    let sel = selector(STREET_LINKS)?;

    let mut streets = IndexMap::new();
    for a in doc.select(&sel) {
        let Some(href) = a.value().attr("href") else { continue };
        let name = a.text().collect::<String>().trim().to_string();
        match base.join(href) {
            Ok(url) => {
                streets.insert(name, url.to_string());
            }
            Err(e) => warn!("Skipping street link {:?}: {}", href, e),
        }
    }
    Ok(streets)
}

/// Property label → listing path (`/cutsheet/...`), in page order.
///
/// Returns an empty map when the page has no property list.
pub fn parse_property_links(html: &str) -> Result<IndexMap<String, String>> {
    let doc = Html::parse_document(html);
    let sel = selector(PROPERTY_LINKS)?;

    let mut properties = IndexMap::new();
    for a in doc.select(&sel) {
        let Some(href) = a.value().attr("href") else { continue };
        if !href.starts_with(LISTING_PREFIX) {
            continue;
        }
        let name = a.text().collect::<String>().trim().to_string();
        properties.insert(name, href.to_string());
    }
    Ok(properties)
}

pub struct Discovery {
    client: HttpClient,
    base: Url,
}

impl Discovery {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config).context("Failed to build HTTP client")?,
            base: Url::parse(&config.base_url)
                .with_context(|| format!("Invalid base url {}", config.base_url))?,
        })
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub fn subdistrict_url(&self, subdistrict_id: u32) -> Result<Url> {
        self.base
            .join(&format!("/forsale/subdistrict/{}", subdistrict_id))
            .context("Failed to build subdistrict url")
    }

    pub async fn streets(&self, subdistrict_id: u32) -> Result<IndexMap<String, String>> {
        let url = self.subdistrict_url(subdistrict_id)?;
        info!("Fetching streets for subdistrict {}", subdistrict_id);
        let html = self
            .client
            .get_text(url.as_str())
            .await
            .with_context(|| format!("Failed to fetch subdistrict {}", subdistrict_id))?;
        let streets = parse_street_links(&html, &self.base)?;
        debug!("Subdistrict {}: {} streets", subdistrict_id, streets.len());
        Ok(streets)
    }

    pub async fn properties(&self, street_url: &str) -> Result<IndexMap<String, String>> {
        info!("Fetching properties on {}", street_url);
        let html = self
            .client
            .get_text(street_url)
            .await
            .with_context(|| format!("Failed to fetch street page {}", street_url))?;
        parse_property_links(&html)
    }
}
