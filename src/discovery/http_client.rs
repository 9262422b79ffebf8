use crate::config::ScraperConfig;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { status: StatusCode, url: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Rate limiting, server errors and transport failures are worth another try.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            FetchError::Request { .. } => true,
        }
    }
}

/// Plain HTTP client for static pages and image downloads.
pub struct HttpClient {
    inner: reqwest::Client,
    config: ScraperConfig,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self, reqwest::Error> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// Fetch a URL as text with rate-limiting and retry.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.get(url).await?;
        resp.text().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self.get(url).await?;
        let bytes = resp.bytes().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        self.polite_delay().await;

        // delay * 2, delay * 4, ... with jitter
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.config.request_delay_ms.max(1))
            .map(jitter)
            .take(self.config.max_retries as usize);

        RetryIf::spawn(
            strategy,
            || async move {
                debug!("GET {}", url);
                let resp = self
                    .inner
                    .get(url)
                    .send()
                    .await
                    .map_err(|source| FetchError::Request {
                        url: url.to_string(),
                        source,
                    })?;
                let status = resp.status();
                if status.is_success() {
                    Ok(resp)
                } else {
                    Err(FetchError::Status {
                        status,
                        url: url.to_string(),
                    })
                }
            },
            |e: &FetchError| {
                let retry = e.is_retryable();
                if retry {
                    warn!("{}; retrying", e);
                }
                retry
            },
        )
        .await
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let extra = jitter(Duration::from_millis(self.config.jitter_ms));
        sleep(Duration::from_millis(self.config.request_delay_ms) + extra).await;
    }
}
