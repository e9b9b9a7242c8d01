//! Status filtering: keeps the rows whose status cell matches one of the
//! configured target values, exactly and case-sensitively.

use tracing::info;

use crate::model::{FilteredRecords, Sheet};

/// Restricts the sheet's rows to those whose `status_field` value is a
/// member of `target_statuses`. An empty result is a reported condition,
/// not an error; the caller decides whether it is fatal. The distinct
/// status values observed in the source are always returned to aid
/// diagnosis.
pub fn filter_by_status(
    sheet: &Sheet,
    status_field: &str,
    target_statuses: &[String],
) -> FilteredRecords {
    let mut observed: Vec<String> = Vec::new();

    let rows: Vec<_> = sheet
        .rows
        .iter()
        .filter(|row| {
            let value = sheet.value(row, status_field);
            if let Some(status) = value.as_text() {
                if !observed.iter().any(|seen| seen == status) {
                    observed.push(status.to_string());
                }
                target_statuses.iter().any(|target| target == status)
            } else {
                false
            }
        })
        .cloned()
        .collect();

    info!(
        matched = rows.len(),
        total = sheet.rows.len(),
        ?target_statuses,
        "filtered rows by status"
    );

    FilteredRecords {
        rows,
        observed_statuses: observed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellValue, Row};
    use crate::settings::STATUS_COLUMN;

    fn status_row(status: &str) -> Row {
        let mut row = Row::new();
        row.insert(
            STATUS_COLUMN.to_string(),
            CellValue::Text(status.to_string()),
        );
        row
    }

    fn sheet_with_statuses(statuses: &[&str]) -> Sheet {
        Sheet::new(
            "Export",
            vec![STATUS_COLUMN.to_string()],
            statuses.iter().map(|s| status_row(s)).collect(),
        )
    }

    fn targets(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn keeps_only_exact_status_matches() {
        let sheet = sheet_with_statuses(&["On order", "Cancelled", "Received", "on order"]);
        let filtered = filter_by_status(&sheet, STATUS_COLUMN, &targets(&["On order", "Received"]));
        assert_eq!(filtered.rows.len(), 2);
    }

    #[test]
    fn matching_is_case_sensitive_and_untrimmed() {
        let sheet = sheet_with_statuses(&["ON ORDER", "On order "]);
        let filtered = filter_by_status(&sheet, STATUS_COLUMN, &targets(&["On order"]));
        assert!(filtered.is_empty());
        assert_eq!(filtered.observed_statuses, vec!["ON ORDER", "On order "]);
    }

    #[test]
    fn empty_result_reports_observed_statuses() {
        let sheet = sheet_with_statuses(&["Cancelled", "Draft", "Cancelled"]);
        let filtered = filter_by_status(&sheet, STATUS_COLUMN, &targets(&["On order"]));
        assert!(filtered.is_empty());
        assert_eq!(filtered.observed_statuses, vec!["Cancelled", "Draft"]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let sheet = sheet_with_statuses(&["On order", "Cancelled", "Received"]);
        let target = targets(&["On order", "Received"]);
        let first = filter_by_status(&sheet, STATUS_COLUMN, &target);

        let refiltered_source = Sheet::new("Export", sheet.columns.clone(), first.rows.clone());
        let second = filter_by_status(&refiltered_source, STATUS_COLUMN, &target);
        assert_eq!(first.rows, second.rows);
    }
}
