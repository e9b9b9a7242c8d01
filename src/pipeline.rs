//! High-level entry points wiring the selection, filtering, and grouping
//! stages together for the command-line interface.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::{info, instrument};

use crate::error::{DigestError, Result};
use crate::filter;
use crate::group;
use crate::io::excel_read;
use crate::model::{RequesterGroup, SelectedDataset};
use crate::select::{self, SheetEvaluation};
use crate::settings::{REQUESTER_COLUMN, STATUS_COLUMN, Settings};

/// Everything the dispatcher needs, plus the figures the CLI reports.
#[derive(Debug)]
pub struct PreparedRun {
    pub dataset: SelectedDataset,
    pub groups: Vec<RequesterGroup>,
    pub total_rows: usize,
    pub filtered_rows: usize,
    pub status_breakdown: BTreeMap<String, usize>,
}

/// Loads the workbook, selects the data sheet, filters by status, and
/// groups by requester. Structural problems (no usable sheet, nothing
/// matching the filter, no usable group keys) abort here with a
/// diagnostic error.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn prepare(input: &Path, settings: &Settings) -> Result<PreparedRun> {
    let workbook = excel_read::load_workbook(input)?;
    info!(sheets = workbook.sheets.len(), "workbook loaded");

    let dataset = select::select(&workbook)?;
    let total_rows = dataset.sheet.rows.len();

    let filtered =
        filter::filter_by_status(&dataset.sheet, STATUS_COLUMN, &settings.target_statuses);
    if filtered.is_empty() {
        return Err(DigestError::NoRowsMatchFilter {
            targets: settings.target_statuses.clone(),
            observed: filtered.observed_statuses,
        });
    }

    let mut status_breakdown: BTreeMap<String, usize> = BTreeMap::new();
    for row in &filtered.rows {
        if let Some(status) = dataset.sheet.value(row, STATUS_COLUMN).as_text() {
            *status_breakdown.entry(status.to_string()).or_insert(0) += 1;
        }
    }

    let filtered_rows = filtered.rows.len();
    let groups = group::group_by_requester(&filtered.rows, REQUESTER_COLUMN)?;

    info!(
        sheet = %dataset.sheet.name,
        total_rows,
        filtered_rows,
        requesters = groups.len(),
        "workbook prepared"
    );

    Ok(PreparedRun {
        dataset,
        groups,
        total_rows,
        filtered_rows,
        status_breakdown,
    })
}

/// Per-sheet verdict for the `inspect` report.
#[derive(Debug)]
pub struct SheetReport {
    pub sheet_name: String,
    pub rows: usize,
    pub evaluation: SheetEvaluation,
}

/// Evaluates every sheet with the same rules the selector applies, so the
/// report can never disagree with an actual run.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn inspect_workbook(input: &Path) -> Result<Vec<SheetReport>> {
    let workbook = excel_read::load_workbook(input)?;
    Ok(workbook
        .sheets
        .iter()
        .map(|sheet| SheetReport {
            sheet_name: sheet.name.clone(),
            rows: sheet.rows.len(),
            evaluation: select::evaluate_sheet(sheet),
        })
        .collect())
}

/// Collects the distinct requester identifiers from the selected data
/// sheet, sorted, for the mapping-template workbook.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn extract_requesters(input: &Path) -> Result<Vec<String>> {
    let workbook = excel_read::load_workbook(input)?;
    let dataset = select::select(&workbook)?;

    let requesters: BTreeSet<String> = dataset
        .sheet
        .rows
        .iter()
        .filter_map(|row| {
            dataset
                .sheet
                .value(row, REQUESTER_COLUMN)
                .as_text()
                .map(|value| value.trim().to_string())
        })
        .filter(|value| !value.is_empty())
        .collect();

    info!(requesters = requesters.len(), "extracted distinct requesters");
    Ok(requesters.into_iter().collect())
}
