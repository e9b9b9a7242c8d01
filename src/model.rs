use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single row keyed by column name. Cells absent from the map are treated
/// as empty, mirroring how spreadsheet readers surface ragged rows.
pub type Row = BTreeMap<String, CellValue>;

/// Scalar value held by one spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    /// Plain text cell.
    Text(String),
    /// Numeric cell. Integers are widened to `f64` on load.
    Number(f64),
    /// Boolean cell.
    Bool(bool),
    /// Date or timestamp cell.
    DateTime(chrono::NaiveDateTime),
    /// Blank cell.
    Empty,
}

impl CellValue {
    /// Returns true for blank cells and for text cells that trim to nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(value) => value.trim().is_empty(),
            _ => false,
        }
    }

    /// Text content of the cell, or `None` for non-text cells.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Human-readable rendition used in digests and reports.
    pub fn display(&self) -> String {
        match self {
            CellValue::Text(value) => value.clone(),
            CellValue::Number(value) => {
                if value.fract() == 0.0 && value.abs() < 1e15 {
                    format!("{}", *value as i64)
                } else {
                    value.to_string()
                }
            }
            CellValue::Bool(value) => value.to_string(),
            CellValue::DateTime(value) => value.format("%Y-%m-%d").to_string(),
            CellValue::Empty => String::new(),
        }
    }
}

/// One named sheet of a workbook: an ordered column list plus data rows.
/// Column names are unique within a sheet; the loader synthesises labels for
/// blank or duplicated headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    /// Cell value at the given row for the named column, treating absent
    /// entries as empty.
    pub fn value<'a>(&self, row: &'a Row, column: &str) -> &'a CellValue {
        row.get(column).unwrap_or(&CellValue::Empty)
    }
}

/// An ordered collection of named sheets, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

/// Structural verdict computed for one sheet during selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetScore {
    pub sheet_name: String,
    pub is_pivot: bool,
    pub matched_columns: BTreeSet<String>,
    pub score: usize,
}

impl SheetScore {
    /// Builds a score, keeping `score == matched_columns.len()`.
    pub fn new(sheet_name: impl Into<String>, is_pivot: bool, matched: BTreeSet<String>) -> Self {
        let score = matched.len();
        Self {
            sheet_name: sheet_name.into(),
            is_pivot,
            matched_columns: matched,
            score,
        }
    }
}

/// The sheet chosen by the selector together with its score. Created once
/// per run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedDataset {
    pub sheet: Sheet,
    pub score: SheetScore,
}

/// Why a sheet was excluded from selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectionReason {
    /// The sheet carried no data rows.
    NoRows,
    /// The sheet matched one of the pivot/summary heuristics.
    PivotLike,
    /// One or both mandatory columns were absent.
    MissingMandatory(Vec<String>),
}

/// A sheet the selector turned down, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetRejection {
    pub sheet_name: String,
    pub reason: RejectionReason,
}

impl fmt::Display for SheetRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            RejectionReason::NoRows => write!(f, "'{}' has no rows", self.sheet_name),
            RejectionReason::PivotLike => {
                write!(f, "'{}' looks like a pivot/summary sheet", self.sheet_name)
            }
            RejectionReason::MissingMandatory(columns) => write!(
                f,
                "'{}' is missing mandatory column(s) {}",
                self.sheet_name,
                columns
                    .iter()
                    .map(|c| format!("'{c}'"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

/// Rows that survived the status filter, plus the distinct status values
/// observed in the source sheet (reported when nothing matched).
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredRecords {
    pub rows: Vec<Row>,
    pub observed_statuses: Vec<String>,
}

impl FilteredRecords {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Rows belonging to one requester, in their original sheet order.
#[derive(Debug, Clone, PartialEq)]
pub struct RequesterGroup {
    pub key: String,
    pub rows: Vec<Row>,
}

/// Counters tracking which resolution tier satisfied each lookup. Reset at
/// the start of every dispatch batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    pub mapped: usize,
    pub directory_resolved: usize,
    pub failed: usize,
}

impl ResolutionStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// How a dispatch batch should behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Resolve and report only; the transport is never invoked.
    Preview,
    /// Send copies to operator-supplied test addresses, tagged with the
    /// intended recipient.
    Demo,
    /// Send to the resolved addresses.
    Live,
}

impl DispatchMode {
    /// Tag used in export filenames and report rows.
    pub fn tag(self) -> &'static str {
        match self {
            DispatchMode::Preview => "preview",
            DispatchMode::Demo => "demo",
            DispatchMode::Live => "live",
        }
    }
}

/// A fully rendered message handed to the mail transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub cc: Vec<String>,
    pub attachments: Vec<PathBuf>,
}

impl OutgoingMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html_body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html_body: html_body.into(),
            cc: Vec::new(),
            attachments: Vec::new(),
        }
    }
}

/// Outcome recorded for one requester group in a dispatch batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipientOutcome {
    pub group_key: String,
    pub resolved_address: Option<String>,
    pub sent: bool,
}

/// Aggregate outcome of one dispatch batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchResult {
    pub successful: usize,
    pub failed: usize,
    pub per_recipient: Vec<RecipientOutcome>,
}
