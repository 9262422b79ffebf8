//! CSV sink for flattened listing rows.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use indexmap::{IndexMap, IndexSet};
use std::path::{Path, PathBuf};
use tracing::info;

pub type Row = IndexMap<String, String>;

/// `<dir>/properties_<YYYY-MM-DD>.csv`
pub fn dated_output_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("properties_{}.csv", date.format("%Y-%m-%d")))
}

/// Union of row keys in first-seen order.
pub fn header(rows: &[Row]) -> Vec<String> {
    let mut seen = IndexSet::new();
    for row in rows {
        for key in row.keys() {
            if !seen.contains(key.as_str()) {
                seen.insert(key.clone());
            }
        }
    }
    seen.into_iter().collect()
}

/// Write rows under the union header; absent cells are empty.
///
/// Returns the number of rows written. Nothing is created for an empty batch.
pub fn write_rows(path: &Path, rows: &[Row]) -> Result<usize> {
    if rows.is_empty() {
        info!("No rows to write; skipping {:?}", path);
        return Ok(0);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }

    let columns = header(rows);
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))?;
    writer.write_record(&columns)?;
    for row in rows {
        writer.write_record(
            columns
                .iter()
                .map(|c| row.get(c).map(String::as_str).unwrap_or("")),
        )?;
    }
    writer.flush()?;

    info!("Writing data to file: {:?} ({} rows)", path, rows.len());
    Ok(rows.len())
}
