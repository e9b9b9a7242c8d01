//! Sheet selection: tells genuine flat data tables apart from pivot and
//! summary sheets, then ranks the survivors by how many of the expected
//! columns they carry.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::error::{DigestError, Result};
use crate::model::{
    RejectionReason, SelectedDataset, Sheet, SheetRejection, SheetScore, Workbook,
};
use crate::settings::{
    PIVOT_EMPTY_FIRST_ROW_RATIO, PIVOT_MARKER_PHRASES, PIVOT_SCAN_WINDOW,
    PIVOT_UNNAMED_COLUMN_RATIO, REQUESTER_COLUMN, REQUIRED_COLUMNS, STATUS_COLUMN,
    UNNAMED_COLUMN_PREFIX,
};

/// Verdict for a single sheet. Pivot classification runs before the
/// mandatory-column gate: a summary sheet that happens to carry the right
/// column names is still unusable as a data source.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetEvaluation {
    NoRows,
    Pivot,
    MissingMandatory(Vec<String>),
    Eligible(SheetScore),
}

/// Picks the single best data sheet, or reports why every sheet was
/// rejected. Ties keep the first sheet in workbook order.
pub fn select(workbook: &Workbook) -> Result<SelectedDataset> {
    let mut best: Option<SelectedDataset> = None;
    let mut rejections: Vec<SheetRejection> = Vec::new();

    for sheet in &workbook.sheets {
        match evaluate_sheet(sheet) {
            SheetEvaluation::NoRows => {
                debug!(sheet = %sheet.name, "skipping sheet with no rows");
                rejections.push(SheetRejection {
                    sheet_name: sheet.name.clone(),
                    reason: RejectionReason::NoRows,
                });
            }
            SheetEvaluation::Pivot => {
                debug!(sheet = %sheet.name, "rejecting pivot/summary sheet");
                rejections.push(SheetRejection {
                    sheet_name: sheet.name.clone(),
                    reason: RejectionReason::PivotLike,
                });
            }
            SheetEvaluation::MissingMandatory(missing) => {
                debug!(sheet = %sheet.name, ?missing, "rejecting sheet without mandatory columns");
                rejections.push(SheetRejection {
                    sheet_name: sheet.name.clone(),
                    reason: RejectionReason::MissingMandatory(missing),
                });
            }
            SheetEvaluation::Eligible(score) => {
                debug!(
                    sheet = %sheet.name,
                    score = score.score,
                    out_of = REQUIRED_COLUMNS.len(),
                    "sheet is eligible"
                );
                let better = best
                    .as_ref()
                    .map(|current| score.score > current.score.score)
                    .unwrap_or(true);
                if better {
                    best = Some(SelectedDataset {
                        sheet: sheet.clone(),
                        score,
                    });
                }
            }
        }
    }

    match best {
        Some(selected) => {
            info!(
                sheet = %selected.sheet.name,
                score = selected.score.score,
                rows = selected.sheet.rows.len(),
                "selected data sheet"
            );
            Ok(selected)
        }
        None => Err(DigestError::SheetNotFound(rejections)),
    }
}

/// Classifies one sheet: empty, pivot-like, missing a mandatory column, or
/// eligible with its score.
pub fn evaluate_sheet(sheet: &Sheet) -> SheetEvaluation {
    if sheet.rows.is_empty() {
        return SheetEvaluation::NoRows;
    }
    if is_pivot_like(sheet) {
        return SheetEvaluation::Pivot;
    }

    let missing: Vec<String> = [STATUS_COLUMN, REQUESTER_COLUMN]
        .iter()
        .filter(|column| !sheet.columns.iter().any(|c| c == *column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return SheetEvaluation::MissingMandatory(missing);
    }

    SheetEvaluation::Eligible(score_sheet(sheet))
}

/// Structural pivot/summary detection. Any single signal is enough:
/// mostly-synthetic column labels, a mostly-empty first data row, or a
/// cross-tab marker phrase in the top-left scan window.
pub fn is_pivot_like(sheet: &Sheet) -> bool {
    if sheet.columns.is_empty() || sheet.rows.is_empty() {
        return false;
    }

    let unnamed = sheet
        .columns
        .iter()
        .filter(|column| column.starts_with(UNNAMED_COLUMN_PREFIX))
        .count();
    if unnamed as f64 > sheet.columns.len() as f64 * PIVOT_UNNAMED_COLUMN_RATIO {
        return true;
    }

    let first_row = &sheet.rows[0];
    let empty_cells = sheet
        .columns
        .iter()
        .filter(|column| sheet.value(first_row, column).is_empty())
        .count();
    if empty_cells as f64 > sheet.columns.len() as f64 * PIVOT_EMPTY_FIRST_ROW_RATIO {
        return true;
    }

    for row in sheet.rows.iter().take(PIVOT_SCAN_WINDOW) {
        for column in sheet.columns.iter().take(PIVOT_SCAN_WINDOW) {
            let cell_text = sheet.value(row, column).display().to_lowercase();
            if PIVOT_MARKER_PHRASES
                .iter()
                .any(|marker| cell_text.contains(marker))
            {
                return true;
            }
        }
    }

    false
}

/// Counts which of the expected columns are present verbatim.
pub fn score_sheet(sheet: &Sheet) -> SheetScore {
    let matched: BTreeSet<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| sheet.columns.iter().any(|c| c == *column))
        .map(|column| column.to_string())
        .collect();
    SheetScore::new(sheet.name.clone(), false, matched)
}
