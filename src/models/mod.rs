use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ── Listing history ───────────────────────────────────────────────────────────

/// Fixed header of the listing-history table, in display order.
pub const HISTORY_COLUMNS: [&str; 6] = [
    "status",
    "start_date",
    "end_date",
    "list_price",
    "sold_price",
    "duration",
];

/// One row of a listing's status timeline. Values are kept as displayed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub status: String,
    pub start_date: String,
    pub end_date: String,
    pub list_price: String,
    pub sold_price: String,
    pub duration: String,
    pub changes: Vec<String>,
}

impl HistoryEntry {
    /// Assign a cell by its normalized header label. Unknown labels are ignored.
    pub fn set(&mut self, label: &str, value: String) {
        match label {
            "status" => self.status = value,
            "start_date" => self.start_date = value,
            "end_date" => self.end_date = value,
            "list_price" => self.list_price = value,
            "sold_price" => self.sold_price = value,
            "duration" => self.duration = value,
            _ => {}
        }
    }
}

// ── Listing record ────────────────────────────────────────────────────────────

/// Detail-panel key holding the property category.
pub const PROPERTY_TYPE_KEY: &str = "type";

/// Flattened column names owned by structured fields, in output order.
pub const STRUCTURED_COLUMNS: [&str; 13] = [
    "address",
    "listing_id",
    "url",
    "description",
    "name",
    "street_address",
    "locality",
    "postal_code",
    "price",
    "rooms",
    "bathrooms",
    "date_posted",
    "listing_history",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub listing_id: String,
    pub url: String,
    pub address: Option<String>,
    pub name: Option<String>,
    pub street_address: Option<String>,
    pub locality: Option<String>,
    pub postal_code: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub rooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub date_posted: Option<String>,
    pub listing_history: Vec<HistoryEntry>,
    /// Detail-panel fields keyed by normalized label, in document order.
    pub details: IndexMap<String, String>,
}

impl ListingRecord {
    pub fn property_type(&self) -> Option<&str> {
        self.details.get(PROPERTY_TYPE_KEY).map(String::as_str)
    }

    /// Value of a structured column, `None` when the field is absent.
    pub fn structured_value(&self, column: &str) -> Option<String> {
        let num = |v: Option<f64>| v.map(|n| n.to_string());
        match column {
            "address" => self.address.clone(),
            "listing_id" => Some(self.listing_id.clone()),
            "url" => Some(self.url.clone()),
            "description" => self.description.clone(),
            "name" => self.name.clone(),
            "street_address" => self.street_address.clone(),
            "locality" => self.locality.clone(),
            "postal_code" => self.postal_code.clone(),
            "price" => num(self.price),
            "rooms" => num(self.rooms),
            "bathrooms" => num(self.bathrooms),
            "date_posted" => self.date_posted.clone(),
            "listing_history" => serde_json::to_string(&self.listing_history).ok(),
            _ => None,
        }
    }

    /// Flatten into one output row: structured columns first, then details.
    ///
    /// Missing structured values become empty cells so every row carries
    /// the full structured header.
    pub fn to_row(&self) -> IndexMap<String, String> {
        let mut row = IndexMap::new();
        for column in STRUCTURED_COLUMNS {
            row.insert(
                column.to_string(),
                self.structured_value(column).unwrap_or_default(),
            );
        }
        for (key, value) in &self.details {
            let slot = row.entry(key.clone()).or_default();
            // Details only fill structured columns that are still empty.
            if slot.is_empty() {
                *slot = value.clone();
            }
        }
        row
    }
}

// ── Raw rows (as read from the page) ──────────────────────────────────────────

/// One `.table-history-item`: header cell texts plus change lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawHistoryRow {
    pub cells: Vec<String>,
    pub changes: Vec<String>,
}

impl RawHistoryRow {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
            changes: Vec::new(),
        }
    }

    pub fn with_changes<I, S>(mut self, changes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.changes = changes.into_iter().map(Into::into).collect();
        self
    }
}
