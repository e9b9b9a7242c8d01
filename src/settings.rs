use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Column whose value drives the status filter. Mandatory: a sheet without
/// it is never selectable.
pub const STATUS_COLUMN: &str = "ERF Sched Line Status";

/// Column identifying the responsible party a row is grouped by. Mandatory.
pub const REQUESTER_COLUMN: &str = "Entered by";

/// Columns counted when scoring candidate sheets. Presence is checked
/// verbatim; only [`STATUS_COLUMN`] and [`REQUESTER_COLUMN`] gate
/// eligibility, the rest just rank eligible sheets.
pub const REQUIRED_COLUMNS: [&str; 16] = [
    "Plnt",
    "Ship-To-Plant",
    "ERF Nr",
    "Item",
    "Entered by",
    "Material",
    "Material Description",
    "Unit",
    "ERF Itm Qty",
    "Date Req.",
    "ERF Sched Line Status",
    "PO Due Date",
    "Expeditor",
    "Expeditor Status",
    "Expeditor Remarks",
    "END",
];

/// A sheet is treated as a pivot/summary when more than this share of its
/// column labels is synthetic ("Unnamed: n").
pub const PIVOT_UNNAMED_COLUMN_RATIO: f64 = 0.7;

/// A sheet is treated as a pivot/summary when more than this share of its
/// first data row is empty.
pub const PIVOT_EMPTY_FIRST_ROW_RATIO: f64 = 0.8;

/// Marker phrases that betray a cross-tab report. Matched case-insensitively
/// as substrings within the scan window.
pub const PIVOT_MARKER_PHRASES: [&str; 5] = [
    "column labels",
    "row labels",
    "count of",
    "sum of",
    "grand total",
];

/// Rows and columns of the top-left window scanned for marker phrases.
pub const PIVOT_SCAN_WINDOW: usize = 5;

/// Label prefix the loader assigns to blank column headers.
pub const UNNAMED_COLUMN_PREFIX: &str = "Unnamed:";

/// Header-like token rejected as a mapping identifier.
pub const MAPPING_HEADER_TOKEN: &str = "ENG";

/// Tunable run configuration. Defaults mirror production use; a JSON file
/// can override any subset of fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Display name stamped into digest footers.
    pub sender_name: String,
    /// Status values a row must carry to be included in a digest.
    pub target_statuses: Vec<String>,
    /// How many groups are duplicated to the test addresses in demo mode.
    pub demo_group_limit: usize,
    /// Pause before each external directory lookup, in milliseconds.
    pub directory_pause_ms: u64,
    /// Directory the unmapped-identity report is written into.
    pub export_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sender_name: "Proto4Lab Team".to_string(),
            target_statuses: vec!["On order".to_string(), "Received".to_string()],
            demo_group_limit: 5,
            directory_pause_ms: 200,
            export_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    /// Loads settings from a JSON file, falling back to defaults for any
    /// field the file omits.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_production_statuses() {
        let settings = Settings::default();
        assert_eq!(settings.target_statuses, vec!["On order", "Received"]);
        assert_eq!(settings.demo_group_limit, 5);
    }

    #[test]
    fn partial_json_keeps_defaults_for_omitted_fields() {
        let settings: Settings =
            serde_json::from_str(r#"{"target_statuses": ["Shipped"]}"#).expect("settings parsed");
        assert_eq!(settings.target_statuses, vec!["Shipped"]);
        assert_eq!(settings.directory_pause_ms, 200);
    }

    #[test]
    fn scored_column_list_includes_both_mandatory_columns() {
        assert!(REQUIRED_COLUMNS.contains(&STATUS_COLUMN));
        assert!(REQUIRED_COLUMNS.contains(&REQUESTER_COLUMN));
    }
}
