//! Listing-page extraction: turns one rendered listing page into a
//! [`ListingRecord`].
//!
//! ## Visit sequence
//!
//! `Navigated → EmbeddedDataExtracted → HistoryPanelOpened →
//! HistoryExtracted | HistoryTimedOut → DetailPanelOpened → DetailsExtracted → Composed`
//!
//! Only a malformed listing URL, a failed navigation, a missing address
//! element, a changed history header, or a broken session abort the visit.
//! Everything else degrades to absent fields.

pub mod details;
pub mod embedded;
pub mod history;
pub mod normalize;
pub mod panel;

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::browser::{PageSession, SessionError, WaitCondition, WaitOutcome};
use crate::config::BrowserConfig;
use crate::models::{ListingRecord, STRUCTURED_COLUMNS};

use self::details::extract_details;
use self::embedded::{extract_embedded_data, EmbeddedData};
use self::history::extract_history;
use self::panel::{locate, reveal, DESCRIPTION_PANEL, DETAILS_PANEL, HISTORY_PANEL};

const ADDRESS: &str = ".cutsheet-address";
const DESCRIPTION_MORE: &str = ".truncated-more";
const DESCRIPTION_FULL: &str = ".full-description";

static RE_LISTING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/cutsheet/(\d+)(?:/|$)").unwrap());

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no listing id in url `{0}`")]
    MalformedUrl(String),

    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: SessionError,
    },

    #[error("`{selector}` not visible after {waited:?}")]
    ElementTimeout { selector: &'static str, waited: Duration },

    #[error("listing history header changed: {found:?}")]
    HistoryHeaderMismatch { found: Vec<String> },

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ExtractError {
    /// The page markup no longer matches what the extractors expect.
    pub fn is_structural(&self) -> bool {
        matches!(self, ExtractError::HistoryHeaderMismatch { .. })
    }
}

/// Progress through one listing visit, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    Navigated,
    EmbeddedDataExtracted,
    HistoryPanelOpened,
    HistoryExtracted,
    HistoryTimedOut,
    DetailPanelOpened,
    DetailsExtracted,
    Composed,
}

/// Numeric id following `/cutsheet/` in a listing path or URL.
///
/// "/cutsheet/202422079/1/50-Glissade-Court-Bedford" → "202422079"
pub fn listing_id_from_url(url: &str) -> Result<String, ExtractError> {
    RE_LISTING_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ExtractError::MalformedUrl(url.to_string()))
}

/// Absolute URL for a site path; absolute inputs pass through.
pub fn absolute_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

/// Drives one listing page through the extractors and composes the record.
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    base_url: String,
    page_timeout: Duration,
    panel_timeout: Duration,
}

impl ListingExtractor {
    pub fn new(base_url: &str, browser: &BrowserConfig) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            page_timeout: browser.page_timeout(),
            panel_timeout: browser.panel_timeout(),
        }
    }

    pub fn with_timeouts(mut self, page: Duration, panel: Duration) -> Self {
        self.page_timeout = page;
        self.panel_timeout = panel;
        self
    }

    pub async fn build_record<S: PageSession>(
        &self,
        session: &S,
        property_url: &str,
    ) -> Result<ListingRecord, ExtractError> {
        let listing_id = listing_id_from_url(property_url)?;
        let url = absolute_url(&self.base_url, property_url);
        info!("Extracting listing {} ({})", listing_id, url);

        session
            .navigate(&url)
            .await
            .map_err(|source| ExtractError::Navigation { url: url.clone(), source })?;
        self.advance(&listing_id, VisitState::Navigated);

        let address = match session
            .wait_for(ADDRESS, WaitCondition::Visible, self.page_timeout)
            .await?
        {
            WaitOutcome::Found(el) => session.text(&el).await?,
            WaitOutcome::TimedOut => {
                return Err(ExtractError::ElementTimeout {
                    selector: ADDRESS,
                    waited: self.page_timeout,
                })
            }
        };
        let dom_description = self.read_description(session).await?;

        let embedded = extract_embedded_data(session).await?;
        self.advance(&listing_id, VisitState::EmbeddedDataExtracted);

        let listing_history = match reveal(session, HISTORY_PANEL, self.panel_timeout).await? {
            WaitOutcome::Found(panel) => {
                self.advance(&listing_id, VisitState::HistoryPanelOpened);
                let history = extract_history(session, &panel, self.panel_timeout).await?;
                self.advance(&listing_id, VisitState::HistoryExtracted);
                history
            }
            WaitOutcome::TimedOut => {
                warn!("{}: history panel unavailable", listing_id);
                self.advance(&listing_id, VisitState::HistoryTimedOut);
                Vec::new()
            }
        };

        let details = match reveal(session, DETAILS_PANEL, self.panel_timeout).await? {
            WaitOutcome::Found(panel) => {
                self.advance(&listing_id, VisitState::DetailPanelOpened);
                let details = extract_details(session, &panel).await?;
                self.advance(&listing_id, VisitState::DetailsExtracted);
                details
            }
            WaitOutcome::TimedOut => {
                warn!("{}: detail panel unavailable", listing_id);
                Default::default()
            }
        };

        let mut record = compose(listing_id, url, &embedded);
        record.address = non_empty(address).or(record.address);
        record.description = dom_description.or(record.description);
        record.listing_history = listing_history;
        merge_details(&mut record, details);

        self.advance(&record.listing_id, VisitState::Composed);
        Ok(record)
    }

    async fn read_description<S: PageSession>(&self, session: &S) -> Result<Option<String>, SessionError> {
        let section = match locate(session, DESCRIPTION_PANEL, self.panel_timeout).await? {
            WaitOutcome::Found(section) => section,
            WaitOutcome::TimedOut => return Ok(None),
        };

        // The "more" toggle is absent on short descriptions.
        if let Some(more) = session.find(Some(section.root()), DESCRIPTION_MORE).await? {
            if let Err(e) = session.click(&more).await {
                debug!("Could not expand description: {}", e);
            }
        }

        match session.find(Some(section.root()), DESCRIPTION_FULL).await? {
            Some(full) => Ok(non_empty(session.text(&full).await?)),
            None => Ok(None),
        }
    }

    fn advance(&self, listing_id: &str, state: VisitState) {
        debug!("{}: {:?}", listing_id, state);
    }
}

/// Record skeleton from the id, URL and embedded data. Missing keys stay `None`.
pub fn compose(listing_id: String, url: String, embedded: &EmbeddedData) -> ListingRecord {
    let street_address = embedded.str_at(&["address", "streetAddress"]);
    let locality = embedded.str_at(&["address", "addressLocality"]);
    let postal_code = embedded.str_at(&["address", "postalCode"]);

    let address = match (&street_address, &locality) {
        (Some(street), Some(town)) => Some(format!("{}, {}", street, town)),
        (Some(street), None) => Some(street.clone()),
        _ => None,
    };

    ListingRecord {
        listing_id,
        url,
        address,
        name: embedded.str_at(&["name"]),
        street_address,
        locality,
        postal_code,
        description: embedded.str_at(&["description"]),
        price: embedded.first_number(&[
            &["priceSpecification", "price"],
            &["offers", "priceSpecification", "price"],
            &["offers", "price"],
        ]),
        rooms: embedded.number_at(&["numberOfRooms"]),
        bathrooms: embedded.number_at(&["numberOfBathroomsTotal"]),
        date_posted: embedded.str_at(&["datePosted"]),
        listing_history: Vec::new(),
        details: Default::default(),
    }
}

/// Add detail fields; a detail never replaces a structured value that is present.
pub fn merge_details(record: &mut ListingRecord, details: indexmap::IndexMap<String, String>) {
    for (key, value) in details {
        if STRUCTURED_COLUMNS.contains(&key.as_str()) && record.structured_value(&key).is_some() {
            debug!(
                "{}: detail `{}` shadowed by structured field",
                record.listing_id, key
            );
            continue;
        }
        record.details.insert(key, value);
    }
}

fn non_empty(s: String) -> Option<String> {
    let s = s.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fixture::FixtureSession;
    use crate::extract::embedded::parse_embedded;

    const BASE: &str = "https://www.viewpoint.ca";
    const PATH: &str = "/cutsheet/202422079/1/50-Glissade-Court-Bedford";

    const EMBEDDED: &str = r#"{
        "@type": "RealEstateListing",
        "name": "50 Glissade Court",
        "url": "https://www.viewpoint.ca/cutsheet/202422079",
        "description": "Embedded description",
        "datePosted": "2024-10-01",
        "priceSpecification": {"price": 689900, "priceCurrency": "CAD"},
        "address": {"streetAddress": "50 Glissade Court", "addressLocality": "Bedford", "postalCode": "B4B 0A1"},
        "numberOfRooms": 9,
        "numberOfBathroomsTotal": "3",
        "geo": {"latitude": , "longitude": },
    }"#;

    fn page(history: &str) -> String {
        format!(
            r#"<html><head><script type="application/ld+json">{EMBEDDED}</script></head><body>
            <h1 class="cutsheet-address">50 Glissade Court, Bedford</h1>
            <div data-section-id="3">
              <div class="full-description">A lovely home.</div>
              <a class="truncated-more">more</a>
            </div>
            {history}
            <div data-section-id="4" data-collapsed>
              <div class="cutsheet-detail-item">Type: Single Family</div>
              <div class="cutsheet-detail-item">Bedrooms: 4</div>
              <div class="cutsheet-detail-item">Price: $1</div>
              <div class="cutsheet-detail-item">Heating</div>
            </div>
            </body></html>"#
        )
    }

    const HISTORY: &str = r#"<div data-section-id="6" data-collapsed>
        <div class="table-history-item"><div class="table-history-item-header">
          <span>Status</span><span>Start Date</span><span>End Date</span>
          <span>List Price</span><span>Sold Price</span><span>Duration</span>
        </div></div>
        <div class="table-history-item"><div class="table-history-item-header">
          <span>Active</span><span>Oct 1, 2024</span><span></span>
          <span>$689,900</span><span></span><span>15</span>
        </div></div>
    </div>"#;

    fn extractor() -> ListingExtractor {
        ListingExtractor::new(BASE, &BrowserConfig::default())
            .with_timeouts(Duration::from_millis(10), Duration::from_millis(10))
    }

    fn session(html: &str) -> FixtureSession {
        FixtureSession::new().with_page(&format!("{BASE}{PATH}"), html)
    }

    #[test]
    fn test_listing_id_from_url() {
        assert_eq!(listing_id_from_url(PATH).unwrap(), "202422079");
        assert_eq!(
            listing_id_from_url("https://www.viewpoint.ca/cutsheet/202402498/1/x").unwrap(),
            "202402498"
        );
        assert!(matches!(
            listing_id_from_url("/forsale/subdistrict/74"),
            Err(ExtractError::MalformedUrl(_))
        ));
        assert!(listing_id_from_url("/cutsheet/abc/1/x").is_err());
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(absolute_url(BASE, PATH), format!("{BASE}{PATH}"));
        assert_eq!(absolute_url("https://a.ca/", "x"), "https://a.ca/x");
        assert_eq!(absolute_url(BASE, "https://other.ca/p"), "https://other.ca/p");
    }

    #[test]
    fn test_compose_tolerates_empty_embedded_data() {
        let rec = compose("1".into(), "u".into(), &EmbeddedData::default());
        assert_eq!(rec.listing_id, "1");
        assert_eq!(rec.price, None);
        assert_eq!(rec.address, None);
        assert!(rec.details.is_empty());
    }

    #[test]
    fn test_compose_reads_nested_keys() {
        let rec = compose("1".into(), "u".into(), &parse_embedded(EMBEDDED));
        assert_eq!(rec.price, Some(689900.0));
        assert_eq!(rec.rooms, Some(9.0));
        assert_eq!(rec.bathrooms, Some(3.0));
        assert_eq!(rec.postal_code.as_deref(), Some("B4B 0A1"));
        assert_eq!(rec.address.as_deref(), Some("50 Glissade Court, Bedford"));
        assert_eq!(rec.date_posted.as_deref(), Some("2024-10-01"));
    }

    #[tokio::test]
    async fn test_full_page() {
        let session = session(&page(HISTORY));
        let rec = extractor().build_record(&session, PATH).await.unwrap();

        assert_eq!(rec.listing_id, "202422079");
        assert_eq!(rec.url, format!("{BASE}{PATH}"));
        assert_eq!(rec.address.as_deref(), Some("50 Glissade Court, Bedford"));
        assert_eq!(rec.description.as_deref(), Some("A lovely home."));
        assert_eq!(rec.name.as_deref(), Some("50 Glissade Court"));
        assert_eq!(rec.listing_history.len(), 1);
        assert_eq!(rec.listing_history[0].status, "Active");
        assert_eq!(rec.property_type(), Some("Single Family"));
        assert_eq!(rec.details["bedrooms"], "4");
        // Structured price from embedded data wins over the detail row.
        assert_eq!(rec.price, Some(689900.0));
        assert!(!rec.details.contains_key("price"));
        assert!(!rec.details.contains_key("heating"));
    }

    #[tokio::test]
    async fn test_history_timeout_still_composes() {
        let session = session(&page(""));
        let rec = extractor().build_record(&session, PATH).await.unwrap();

        assert!(rec.listing_history.is_empty());
        assert_eq!(rec.price, Some(689900.0));
        assert_eq!(rec.property_type(), Some("Single Family"));
        assert_eq!(rec.description.as_deref(), Some("A lovely home."));
    }

    #[tokio::test]
    async fn test_history_header_change_aborts() {
        let broken = HISTORY.replace("<span>Sold Price</span>", "<span>Agent</span>");
        let session = session(&page(&broken));
        let err = extractor().build_record(&session, PATH).await.unwrap_err();
        assert!(err.is_structural());
    }

    #[tokio::test]
    async fn test_unparseable_embedded_data_degrades() {
        let html = page(HISTORY).replace(EMBEDDED, "{ this is not json");
        let session = session(&html);
        let rec = extractor().build_record(&session, PATH).await.unwrap();

        assert_eq!(rec.price, None);
        assert_eq!(rec.name, None);
        assert_eq!(rec.address.as_deref(), Some("50 Glissade Court, Bedford"));
        assert_eq!(rec.details["price"], "$1");
        assert_eq!(rec.listing_history.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_url_never_navigates() {
        let session = session(&page(HISTORY));
        let err = extractor().build_record(&session, "/listing/oops").await.unwrap_err();
        assert!(matches!(err, ExtractError::MalformedUrl(_)));
        assert!(session.visited.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_navigation_failure_is_fatal() {
        let session = FixtureSession::new();
        let err = extractor().build_record(&session, PATH).await.unwrap_err();
        assert!(matches!(err, ExtractError::Navigation { .. }));
    }

    #[tokio::test]
    async fn test_missing_address_is_fatal() {
        let html = page(HISTORY).replace("cutsheet-address", "headline");
        let session = session(&html);
        let err = extractor().build_record(&session, PATH).await.unwrap_err();
        assert!(matches!(err, ExtractError::ElementTimeout { selector: ADDRESS, .. }));
    }
}
