use crate::config::BrowserConfig;
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::{PageSession, SessionError, WaitCondition, WaitOutcome};

/// Chrome driven over WebDriver (chromedriver).
pub struct WebDriverSession {
    client: Client,
    poll_interval: Duration,
}

impl WebDriverSession {
    pub async fn connect(config: &BrowserConfig) -> Result<Self, SessionError> {
        let mut args = vec![
            format!("--window-size={}", config.window_size),
            "--no-sandbox".to_string(),
            "--disable-gpu".to_string(),
        ];
        if config.headless {
            args.push("--headless".to_string());
        }

        let mut caps = serde_json::Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

        info!("Connecting to webdriver at {}", config.webdriver_url);
        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&config.webdriver_url)
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;

        Ok(Self {
            client,
            poll_interval: config.poll_interval(),
        })
    }

    pub async fn close(self) -> Result<(), SessionError> {
        self.client
            .close()
            .await
            .map_err(|e| SessionError::command("close", e))
    }

    async fn meets(&self, element: &Element, condition: WaitCondition) -> bool {
        // A stale or detached element simply does not qualify yet.
        match condition {
            WaitCondition::Present => true,
            WaitCondition::Visible => element.is_displayed().await.unwrap_or(false),
            WaitCondition::Clickable => {
                element.is_displayed().await.unwrap_or(false)
                    && element.is_enabled().await.unwrap_or(false)
            }
        }
    }
}

#[async_trait]
impl PageSession for WebDriverSession {
    type Element = Element;

    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        debug!("GET {}", url);
        self.client
            .goto(url)
            .await
            .map_err(|e| SessionError::command("navigate", e))
    }

    async fn wait_for(
        &self,
        selector: &str,
        condition: WaitCondition,
        timeout: Duration,
    ) -> Result<WaitOutcome<Element>, SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            let candidates = self
                .client
                .find_all(Locator::Css(selector))
                .await
                .map_err(|e| SessionError::command("find", e))?;

            for element in candidates {
                if self.meets(&element, condition).await {
                    return Ok(WaitOutcome::Found(element));
                }
            }

            if Instant::now() >= deadline {
                debug!("Timed out after {:?} waiting for {} ({:?})", timeout, selector, condition);
                return Ok(WaitOutcome::TimedOut);
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn find_all(
        &self,
        scope: Option<&Element>,
        selector: &str,
    ) -> Result<Vec<Element>, SessionError> {
        let found = match scope {
            Some(parent) => parent.find_all(Locator::Css(selector)).await,
            None => self.client.find_all(Locator::Css(selector)).await,
        };
        found.map_err(|e| SessionError::command("find", e))
    }

    async fn click(&self, element: &Element) -> Result<(), SessionError> {
        element
            .click()
            .await
            .map_err(|e| SessionError::command("click", e))
    }

    async fn send_keys(&self, element: &Element, text: &str) -> Result<(), SessionError> {
        element
            .send_keys(text)
            .await
            .map_err(|e| SessionError::command("send_keys", e))
    }

    async fn text(&self, element: &Element) -> Result<String, SessionError> {
        element
            .text()
            .await
            .map_err(|e| SessionError::command("text", e))
    }

    async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>, SessionError> {
        let attr = element
            .attr(name)
            .await
            .map_err(|e| SessionError::command("attribute", e))?;
        if attr.is_some() {
            return Ok(attr);
        }
        element
            .prop(name)
            .await
            .map_err(|e| SessionError::command("property", e))
    }

    async fn execute_script(&self, script: &str, args: &[&Element]) -> Result<Value, SessionError> {
        let args = args
            .iter()
            .map(|el| serde_json::to_value(el))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SessionError::command("execute_script", e))?;
        self.client
            .execute(script, args)
            .await
            .map_err(|e| SessionError::command("execute_script", e))
    }
}
