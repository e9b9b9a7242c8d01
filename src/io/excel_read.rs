use std::collections::HashSet;
use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};

use crate::error::Result;
use crate::model::{CellValue, Row, Sheet, Workbook};
use crate::settings::UNNAMED_COLUMN_PREFIX;

/// Reads every sheet of an `.xlsx` workbook into the in-memory model. The
/// first row of each sheet is taken as the header row; blank and duplicated
/// headers receive synthetic labels so column names stay unique.
pub fn load_workbook(path: &Path) -> Result<Workbook> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_names: Vec<String> = workbook.sheet_names().to_owned();

    let mut sheets = Vec::with_capacity(sheet_names.len());
    for name in sheet_names {
        let range = match workbook.worksheet_range(&name) {
            Some(range_result) => range_result?,
            None => continue,
        };
        sheets.push(sheet_from_range(&name, &range));
    }

    Ok(Workbook { sheets })
}

fn sheet_from_range(name: &str, range: &calamine::Range<DataType>) -> Sheet {
    let mut rows_iter = range.rows();

    let columns = match rows_iter.next() {
        Some(header_row) => {
            let raw: Vec<String> = header_row
                .iter()
                .map(|cell| cell_to_string(cell).trim().to_string())
                .collect();
            label_columns(&raw)
        }
        None => Vec::new(),
    };

    let rows: Vec<Row> = rows_iter
        .map(|data_row| {
            let mut row = Row::new();
            for (idx, cell) in data_row.iter().enumerate() {
                let Some(column) = columns.get(idx) else {
                    break;
                };
                let value = cell_to_value(cell);
                if value != CellValue::Empty {
                    row.insert(column.clone(), value);
                }
            }
            row
        })
        .collect();

    Sheet::new(name, columns, rows)
}

/// Assigns unique labels to a header row: blank headers become
/// `Unnamed: {index}` and duplicates get a numeric suffix.
pub fn label_columns(raw: &[String]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut columns = Vec::with_capacity(raw.len());

    for (idx, header) in raw.iter().enumerate() {
        let base = if header.is_empty() {
            format!("{UNNAMED_COLUMN_PREFIX} {idx}")
        } else {
            header.clone()
        };

        let mut label = base.clone();
        let mut counter = 1;
        while used.contains(&label) {
            label = format!("{base}.{counter}");
            counter += 1;
        }
        used.insert(label.clone());
        columns.push(label);
    }

    columns
}

fn cell_to_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::String(value) => {
            if value.trim().is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(value.clone())
            }
        }
        DataType::Float(value) => CellValue::Number(*value),
        DataType::Int(value) => CellValue::Number(*value as f64),
        DataType::Bool(value) => CellValue::Bool(*value),
        DataType::DateTime(_) => cell
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Empty),
        DataType::Empty | DataType::Error(_) => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}

fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::String(value) => value.clone(),
        DataType::Float(value) => value.to_string(),
        DataType::Int(value) => value.to_string(),
        DataType::Bool(value) => value.to_string(),
        DataType::Empty => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(raw: &[&str]) -> Vec<String> {
        label_columns(&raw.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn blank_headers_get_synthetic_labels() {
        assert_eq!(
            labels(&["ERF Nr", "", "Material"]),
            vec!["ERF Nr", "Unnamed: 1", "Material"]
        );
    }

    #[test]
    fn duplicate_headers_get_numeric_suffixes() {
        assert_eq!(
            labels(&["Status", "Status", "Status"]),
            vec!["Status", "Status.1", "Status.2"]
        );
    }

    #[test]
    fn numeric_cells_do_not_count_as_empty() {
        assert!(!cell_to_value(&DataType::Float(0.0)).is_empty());
        assert!(cell_to_value(&DataType::String("   ".to_string())).is_empty());
    }
}
