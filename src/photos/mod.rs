//! Listing photo download: open the gallery, page through it collecting
//! image URLs, then fetch each one that is not already on disk.

use anyhow::{Context, Result};
use indexmap::IndexSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{PageSession, WaitCondition, WaitOutcome};
use crate::discovery::http_client::HttpClient;
use crate::extract::{absolute_url, listing_id_from_url};

const GALLERY_TRIGGER: &str = ".cutsheet-photo";
const GALLERY_IMAGE: &str = ".gallery img";
const GALLERY_NEXT: &str = ".gallery-next";
const MAX_GALLERY_PAGES: usize = 50;

#[derive(Debug, Default, PartialEq)]
pub struct PhotoStats {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// `<dir>/<listing_id>/<NNN>.<ext>`; extension from the URL path, default `jpg`.
pub fn photo_path(dir: &Path, listing_id: &str, index: usize, image_url: &str) -> PathBuf {
    let path = url::Url::parse(image_url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| image_url.to_string());
    let ext = Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.len() <= 4 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "jpg".to_string());
    dir.join(listing_id).join(format!("{:03}.{}", index + 1, ext))
}

/// Resolve an image `src` the way the browser would, against the listing page.
/// Handles absolute, protocol-relative (`//cdn/...`), root-relative and relative values.
pub fn resolve_image_url(page: &Url, src: &str) -> Option<String> {
    match page.join(src) {
        Ok(url) => Some(url.to_string()),
        Err(e) => {
            debug!("Ignoring image src {:?}: {}", src, e);
            None
        }
    }
}

/// Open the listing's gallery and collect its image URLs in display order.
pub async fn collect_gallery_urls<S: PageSession>(
    session: &S,
    base_url: &str,
    property_url: &str,
    timeout: Duration,
) -> Result<Vec<String>> {
    let url = absolute_url(base_url, property_url);
    let listing_page = Url::parse(&url).with_context(|| format!("Invalid listing url {}", url))?;
    session
        .navigate(&url)
        .await
        .with_context(|| format!("Failed to open {}", url))?;

    let trigger = match session
        .wait_for(GALLERY_TRIGGER, WaitCondition::Clickable, timeout)
        .await?
    {
        WaitOutcome::Found(el) => el,
        WaitOutcome::TimedOut => {
            warn!("No photo gallery on {}", url);
            return Ok(Vec::new());
        }
    };
    session.click(&trigger).await?;

    if session
        .wait_for(GALLERY_IMAGE, WaitCondition::Visible, timeout)
        .await?
        .is_timed_out()
    {
        warn!("Gallery on {} did not open within {:?}", url, timeout);
        return Ok(Vec::new());
    }

    let mut urls = IndexSet::new();
    for page in 0..MAX_GALLERY_PAGES {
        let before = urls.len();
        for img in session.find_all(None, GALLERY_IMAGE).await? {
            let src = match session.attribute(&img, "src").await? {
                Some(src) if !src.trim().is_empty() => Some(src),
                _ => session.attribute(&img, "data-src").await?,
            };
            if let Some(src) = src.as_deref().and_then(|s| resolve_image_url(&listing_page, s.trim())) {
                urls.insert(src);
            }
        }

        if urls.len() == before {
            debug!("Gallery page {} added nothing; done", page);
            break;
        }
        let Some(next) = session.find(None, GALLERY_NEXT).await? else {
            break;
        };
        session.click(&next).await?;
    }

    Ok(urls.into_iter().collect())
}

/// Download every gallery photo for one listing, skipping existing files.
pub async fn download_listing_photos<S: PageSession>(
    session: &S,
    client: &HttpClient,
    base_url: &str,
    property_url: &str,
    dir: &Path,
    timeout: Duration,
) -> Result<PhotoStats> {
    let listing_id = listing_id_from_url(property_url)?;
    let urls = collect_gallery_urls(session, base_url, property_url, timeout).await?;
    info!("{}: {} photos in gallery", listing_id, urls.len());

    let mut stats = PhotoStats::default();
    for (i, image_url) in urls.iter().enumerate() {
        let path = photo_path(dir, &listing_id, i, image_url);
        if path.exists() {
            stats.skipped += 1;
            continue;
        }

        match client.get_bytes(image_url).await {
            Ok(bytes) => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, bytes)
                    .await
                    .with_context(|| format!("Failed to write {:?}", path))?;
                stats.downloaded += 1;
            }
            Err(e) => {
                warn!("{}: photo {} failed: {}", listing_id, image_url, e);
                stats.failed += 1;
            }
        }
    }

    info!(
        "{}: {} downloaded, {} already present, {} failed",
        listing_id, stats.downloaded, stats.skipped, stats.failed
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fixture::FixtureSession;

    const BASE: &str = "https://www.viewpoint.ca";
    const PATH: &str = "/cutsheet/202422079/1/50-Glissade-Court-Bedford";

    #[test]
    fn test_photo_path() {
        let dir = Path::new("data/photos");
        assert_eq!(
            photo_path(dir, "202422079", 0, "https://cdn.example.com/p/1.JPEG?w=1024"),
            PathBuf::from("data/photos/202422079/001.jpeg")
        );
        assert_eq!(
            photo_path(dir, "202422079", 11, "https://cdn.example.com/p/photo"),
            PathBuf::from("data/photos/202422079/012.jpg")
        );
    }

    #[test]
    fn test_resolve_image_url() {
        let page = Url::parse(&format!("{BASE}{PATH}")).unwrap();
        assert_eq!(
            resolve_image_url(&page, "//cdn.viewpoint.ca/p/1.jpg").as_deref(),
            Some("https://cdn.viewpoint.ca/p/1.jpg")
        );
        assert_eq!(
            resolve_image_url(&page, "/img/x.jpg").as_deref(),
            Some("https://www.viewpoint.ca/img/x.jpg")
        );
        assert_eq!(
            resolve_image_url(&page, "img/x.jpg").as_deref(),
            Some("https://www.viewpoint.ca/cutsheet/202422079/1/img/x.jpg")
        );
        assert_eq!(
            resolve_image_url(&page, "https://other.ca/a.png").as_deref(),
            Some("https://other.ca/a.png")
        );
    }

    #[tokio::test]
    async fn test_gallery_urls_deduplicated_in_order() {
        let html = r#"<html><body>
            <a class="cutsheet-photo">Photos</a>
            <div class="gallery">
              <img src="https://cdn.example.com/a.jpg">
              <img src="" data-src="/img/b.png">
              <img src="https://cdn.example.com/a.jpg">
              <img src="//cdn.viewpoint.ca/p/1.jpg">
            </div>
            <button class="gallery-next">Next</button>
        </body></html>"#;
        let session = FixtureSession::new().with_page(&format!("{BASE}{PATH}"), html);

        let urls = collect_gallery_urls(&session, BASE, PATH, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(
            urls,
            vec![
                "https://cdn.example.com/a.jpg".to_string(),
                "https://www.viewpoint.ca/img/b.png".to_string(),
                "https://cdn.viewpoint.ca/p/1.jpg".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_listing_without_gallery() {
        let session = FixtureSession::new().with_page(&format!("{BASE}{PATH}"), "<body></body>");
        let urls = collect_gallery_urls(&session, BASE, PATH, Duration::from_millis(10))
            .await
            .unwrap();
        assert!(urls.is_empty());
    }
}
