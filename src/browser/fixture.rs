//! Static-HTML stand-in for a browser session, used by tests.
//!
//! Elements are addressed by their position in document order. Anything
//! below a `data-collapsed` element stays invisible to queries until that
//! element has been clicked.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use super::{PageSession, SessionError, WaitCondition, WaitOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixtureElement(usize);

#[derive(Default)]
pub struct FixtureSession {
    pages: HashMap<String, String>,
    current: Mutex<Option<String>>,
    clicked: Mutex<HashSet<usize>>,
    pub visited: Mutex<Vec<String>>,
    pub typed: Mutex<Vec<(usize, String)>>,
    pub clicks: Mutex<Vec<usize>>,
}

impl FixtureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    fn with_doc<T>(
        &self,
        f: impl FnOnce(&[ElementRef<'_>], &HashSet<usize>) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let html = self
            .current
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| SessionError::command("query", "no page loaded"))?;
        let doc = Html::parse_document(&html);
        let all_sel = Selector::parse("*").unwrap();
        let all: Vec<ElementRef<'_>> = doc.select(&all_sel).collect();
        let clicked = self.clicked.lock().unwrap().clone();
        f(&all, &clicked)
    }
}

fn selector(css: &str) -> Result<Selector, SessionError> {
    Selector::parse(css).map_err(|_| SessionError::InvalidSelector(css.to_string()))
}

fn index_of(all: &[ElementRef<'_>], el: &ElementRef<'_>) -> usize {
    all.iter().position(|e| e.id() == el.id()).unwrap()
}

fn is_present(all: &[ElementRef<'_>], el: &ElementRef<'_>, clicked: &HashSet<usize>) -> bool {
    el.ancestors().filter_map(ElementRef::wrap).all(|anc| {
        anc.value().attr("data-collapsed").is_none() || clicked.contains(&index_of(all, &anc))
    })
}

fn matches(
    all: &[ElementRef<'_>],
    clicked: &HashSet<usize>,
    scope: Option<&FixtureElement>,
    css: &str,
) -> Result<Vec<FixtureElement>, SessionError> {
    let sel = selector(css)?;
    let found: Vec<ElementRef<'_>> = match scope {
        Some(FixtureElement(i)) => all[*i].select(&sel).collect(),
        None => all.iter().filter(|e| sel.matches(e)).copied().collect(),
    };
    Ok(found
        .iter()
        .filter(|el| is_present(all, el, clicked))
        .map(|el| FixtureElement(index_of(all, el)))
        .collect())
}

#[async_trait]
impl PageSession for FixtureSession {
    type Element = FixtureElement;

    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        self.visited.lock().unwrap().push(url.to_string());
        let html = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| SessionError::command("navigate", format!("unreachable: {}", url)))?;
        *self.current.lock().unwrap() = Some(html);
        self.clicked.lock().unwrap().clear();
        Ok(())
    }

    async fn wait_for(
        &self,
        selector: &str,
        _condition: WaitCondition,
        _timeout: Duration,
    ) -> Result<WaitOutcome<FixtureElement>, SessionError> {
        self.with_doc(|all, clicked| {
            Ok(match matches(all, clicked, None, selector)?.into_iter().next() {
                Some(el) => WaitOutcome::Found(el),
                None => WaitOutcome::TimedOut,
            })
        })
    }

    async fn find_all(
        &self,
        scope: Option<&FixtureElement>,
        selector: &str,
    ) -> Result<Vec<FixtureElement>, SessionError> {
        self.with_doc(|all, clicked| matches(all, clicked, scope, selector))
    }

    async fn click(&self, element: &FixtureElement) -> Result<(), SessionError> {
        self.clicks.lock().unwrap().push(element.0);
        self.clicked.lock().unwrap().insert(element.0);
        Ok(())
    }

    async fn send_keys(&self, element: &FixtureElement, text: &str) -> Result<(), SessionError> {
        self.typed.lock().unwrap().push((element.0, text.to_string()));
        Ok(())
    }

    async fn text(&self, element: &FixtureElement) -> Result<String, SessionError> {
        self.with_doc(|all, _| {
            let raw: String = all[element.0].text().collect();
            Ok(raw.split_whitespace().collect::<Vec<_>>().join(" "))
        })
    }

    async fn attribute(
        &self,
        element: &FixtureElement,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        self.with_doc(|all, _| {
            let el = all[element.0];
            Ok(match name {
                "textContent" => Some(el.text().collect()),
                _ => el.value().attr(name).map(str::to_string),
            })
        })
    }

    async fn execute_script(
        &self,
        _script: &str,
        _args: &[&FixtureElement],
    ) -> Result<Value, SessionError> {
        Ok(Value::Null)
    }
}

impl FixtureSession {
    /// Document-order index of the first element matching `css` on the current page.
    pub fn element_index(&self, css: &str) -> Option<usize> {
        self.with_doc(|all, _| {
            let sel = selector(css)?;
            Ok(all.iter().position(|e| sel.matches(e)))
        })
        .ok()
        .flatten()
    }
}
