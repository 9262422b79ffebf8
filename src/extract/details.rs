use indexmap::IndexMap;

use crate::browser::{PageSession, SessionError};

use super::normalize::normalize_label;
use super::panel::RevealedPanel;

const DETAIL_ITEM: &str = ".cutsheet-detail-item";

/// Split "Label: value" rows on the first colon into normalized key → value.
///
/// Rows without a colon are skipped; a repeated key keeps the last value.
pub fn parse_detail_rows<I, S>(rows: I) -> IndexMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut details = IndexMap::new();
    for row in rows {
        let Some((key, value)) = row.as_ref().split_once(':') else {
            continue;
        };
        details.insert(normalize_label(key.trim()), value.trim().to_string());
    }
    details
}

pub async fn extract_details<S: PageSession>(
    session: &S,
    panel: &RevealedPanel<S::Element>,
) -> Result<IndexMap<String, String>, SessionError> {
    let mut rows = Vec::new();
    for item in session.find_all(Some(panel.root()), DETAIL_ITEM).await? {
        rows.push(session.text(&item).await?);
    }
    Ok(parse_detail_rows(rows))
}
