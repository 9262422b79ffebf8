//! Structured data embedded in the listing page (`application/ld+json`).
//!
//! The site's template emits near-JSON: escaped newlines, trailing commas,
//! and bare `"value": ,` slots. The text is repaired before parsing and a
//! blob that still fails to parse degrades to an empty mapping.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::browser::{PageSession, SessionError};

pub const EMBEDDED_SCRIPT: &str = r#"script[type="application/ld+json"]"#;

static RE_TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());
static RE_EMPTY_SLOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"("(?:value|latitude|longitude)"\s*:)\s*([,}\]])"#).unwrap()
});

/// Schema-less mapping read from the embedded block. Lookups never panic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddedData(Map<String, Value>);

impl EmbeddedData {
    /// Objects are used as-is; for arrays the first object wins.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            Value::Array(items) => items
                .into_iter()
                .find_map(|v| match v {
                    Value::Object(map) => Some(Self(map)),
                    _ => None,
                })
                .unwrap_or_default(),
            _ => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.0.get(*first)?, |node, key| node.as_object()?.get(*key))
    }

    /// Non-empty string at `path`; numbers are rendered as text.
    pub fn str_at(&self, path: &[&str]) -> Option<String> {
        match self.get_path(path)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Number at `path`, coercing display strings like "$499,900".
    pub fn number_at(&self, path: &[&str]) -> Option<f64> {
        match self.get_path(path)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_number(s),
            _ => None,
        }
    }

    /// First path that yields a number.
    pub fn first_number(&self, paths: &[&[&str]]) -> Option<f64> {
        paths.iter().find_map(|p| self.number_at(p))
    }
}

/// Parse a displayed number: strip everything except digits, dot, minus.
/// "$1,234.50" → 1234.5 | "N/A" → None
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "N/A" || s == "-" || s == "—" {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse().ok()
}

/// Apply the template-quirk repairs, in order.
pub fn repair(raw: &str) -> String {
    let text = strip_whitespace_escapes(raw).replace(['\n', '\r', '\t'], " ");
    let text = RE_TRAILING_COMMA.replace_all(&text, "$1");
    RE_EMPTY_SLOT.replace_all(&text, "$1 null$2").into_owned()
}

/// Drop `\n` and `\t` escapes. Escapes are read as pairs, so the `n` of
/// an escaped backslash followed by `n` (`C:\\new`) survives.
fn strip_whitespace_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 't') => {}
            Some(next) => {
                out.push(c);
                out.push(next);
            }
            None => out.push(c),
        }
    }
    out
}

/// Repair then parse. Unparseable text yields an empty mapping.
pub fn parse_embedded(raw: &str) -> EmbeddedData {
    let repaired = repair(raw);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => EmbeddedData::from_value(value),
        Err(e) => {
            warn!("Embedded data unparseable after repair: {}", e);
            warn!("Repaired text: {}", repaired);
            EmbeddedData::default()
        }
    }
}

/// Read the first non-empty embedded block on the current page.
pub async fn extract_embedded_data<S: PageSession>(session: &S) -> Result<EmbeddedData, SessionError> {
    for script in session.find_all(None, EMBEDDED_SCRIPT).await? {
        let Some(text) = session.attribute(&script, "textContent").await? else {
            continue;
        };
        if text.trim().is_empty() {
            continue;
        }
        return Ok(parse_embedded(&text));
    }
    debug!("No embedded data block on page");
    Ok(EmbeddedData::default())
}
