use std::time::Duration;
use tracing::{debug, warn};

use crate::browser::{PageSession, WaitCondition, WaitOutcome};
use crate::models::{HistoryEntry, RawHistoryRow, HISTORY_COLUMNS};

use super::normalize::normalize_label;
use super::panel::RevealedPanel;
use super::ExtractError;

const ITEM: &str = ".table-history-item";
const ITEM_HEADER: &str = ".table-history-item-header";
const CELL: &str = "span";
const CHANGE: &str = ".history-item-change";

/// Validate the header row and zip every following row against it.
///
/// The first row must normalize to exactly [`HISTORY_COLUMNS`]. Rows keep
/// document order; short rows leave their trailing fields empty.
pub fn parse_history_rows(rows: Vec<RawHistoryRow>) -> Result<Vec<HistoryEntry>, ExtractError> {
    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };

    let labels: Vec<String> = header.cells.iter().map(|c| normalize_label(c)).collect();
    if labels != HISTORY_COLUMNS {
        return Err(ExtractError::HistoryHeaderMismatch { found: labels });
    }

    Ok(rows
        .enumerate()
        .map(|(i, row)| {
            if row.cells.len() != labels.len() {
                debug!(
                    "History row {} has {} cells, expected {}",
                    i + 1,
                    row.cells.len(),
                    labels.len()
                );
            }
            let mut entry = HistoryEntry {
                changes: row.changes,
                ..Default::default()
            };
            for (label, value) in labels.iter().zip(row.cells) {
                entry.set(label, value);
            }
            entry
        })
        .collect())
}

/// Read the history table of a revealed history panel.
///
/// Rows that never appear within `timeout` yield an empty history.
pub async fn extract_history<S: PageSession>(
    session: &S,
    panel: &RevealedPanel<S::Element>,
    timeout: Duration,
) -> Result<Vec<HistoryEntry>, ExtractError> {
    if let WaitOutcome::TimedOut = session.wait_for(ITEM, WaitCondition::Present, timeout).await? {
        warn!("Timeout: listing history did not load within {:?}", timeout);
        return Ok(Vec::new());
    }

    let mut raw_rows = Vec::new();
    for item in session.find_all(Some(panel.root()), ITEM).await? {
        let mut cells = Vec::new();
        if let Some(header) = session.find(Some(&item), ITEM_HEADER).await? {
            for cell in session.find_all(Some(&header), CELL).await? {
                cells.push(session.text(&cell).await?);
            }
        }

        let mut changes = Vec::new();
        for change in session.find_all(Some(&item), CHANGE).await? {
            changes.push(session.text(&change).await?);
        }

        raw_rows.push(RawHistoryRow { cells, changes });
    }

    parse_history_rows(raw_rows)
}
