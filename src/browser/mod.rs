//! Rendered-page session capability.
//!
//! Everything that talks to a live page goes through [`PageSession`]; the
//! extractors never see the WebDriver client directly. Waits return an
//! explicit [`WaitOutcome`] so each caller decides whether a timeout is
//! fatal or degrades gracefully.

pub mod login;
pub mod webdriver;

#[cfg(test)]
pub mod fixture;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use self::webdriver::WebDriverSession;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not start browser session: {0}")]
    Connect(String),

    #[error("{op} failed: {message}")]
    Command { op: &'static str, message: String },

    #[error("invalid selector `{0}`")]
    InvalidSelector(String),
}

impl SessionError {
    pub fn command(op: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Command { op, message: err.to_string() }
    }
}

/// Condition an element must meet before a wait succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    Present,
    Visible,
    Clickable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome<E> {
    Found(E),
    TimedOut,
}

impl<E> WaitOutcome<E> {
    pub fn found(self) -> Option<E> {
        match self {
            WaitOutcome::Found(el) => Some(el),
            WaitOutcome::TimedOut => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, WaitOutcome::TimedOut)
    }
}

/// An authenticated, rendered page that can be driven and queried.
///
/// One session serves one listing at a time; callers must not interleave
/// operations from two visits on the same session.
#[async_trait]
pub trait PageSession: Send + Sync {
    type Element: Clone + Send + Sync;

    async fn navigate(&self, url: &str) -> Result<(), SessionError>;

    /// Wait until the first element matching `selector` meets `condition`.
    async fn wait_for(
        &self,
        selector: &str,
        condition: WaitCondition,
        timeout: Duration,
    ) -> Result<WaitOutcome<Self::Element>, SessionError>;

    /// All matches in document order, searched under `scope` when given.
    async fn find_all(
        &self,
        scope: Option<&Self::Element>,
        selector: &str,
    ) -> Result<Vec<Self::Element>, SessionError>;

    async fn find(
        &self,
        scope: Option<&Self::Element>,
        selector: &str,
    ) -> Result<Option<Self::Element>, SessionError> {
        Ok(self.find_all(scope, selector).await?.into_iter().next())
    }

    async fn click(&self, element: &Self::Element) -> Result<(), SessionError>;

    async fn send_keys(&self, element: &Self::Element, text: &str) -> Result<(), SessionError>;

    /// Rendered text, whitespace-collapsed the way a browser reports it.
    async fn text(&self, element: &Self::Element) -> Result<String, SessionError>;

    /// Attribute value, falling back to the DOM property of the same name
    /// (so `textContent` works for non-rendered elements such as scripts).
    async fn attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, SessionError>;

    async fn execute_script(
        &self,
        script: &str,
        args: &[&Self::Element],
    ) -> Result<serde_json::Value, SessionError>;
}
