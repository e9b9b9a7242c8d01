use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Local};
use rust_xlsxwriter::Workbook;

use crate::error::Result;

/// Writes a single-sheet workbook with a header row followed by string
/// cells, the shape shared by every artifact this tool emits.
pub fn write_table(
    path: &Path,
    sheet_name: &str,
    columns: &[&str],
    rows: &[Vec<String>],
) -> Result<()> {
    let mut workbook_writer = Workbook::new();
    let worksheet = workbook_writer.add_worksheet();
    worksheet.set_name(sheet_name)?;

    for (col_idx, header) in columns.iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, *header)?;
    }

    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            worksheet.write_string((row_idx + 1) as u32, col_idx as u16, cell)?;
        }
    }

    workbook_writer.save(path)?;
    Ok(())
}

/// Writes the unresolved-identity report: one row per identifier that no
/// resolution tier could map, for manual follow-up.
pub fn write_unmapped_report(
    path: &Path,
    identifiers: &BTreeSet<String>,
    mode_tag: &str,
    timestamp: DateTime<Local>,
) -> Result<()> {
    let stamp = timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
    let rows: Vec<Vec<String>> = identifiers
        .iter()
        .map(|identifier| {
            vec![
                identifier.clone(),
                "Email Not Found".to_string(),
                mode_tag.to_string(),
                stamp.clone(),
                "Add to email mapping file or verify username".to_string(),
            ]
        })
        .collect();

    write_table(
        path,
        "Unmapped",
        &["Username", "Status", "Mode", "Timestamp", "Recommended Action"],
        &rows,
    )
}

/// Writes a mapping skeleton for manual completion: identifiers filled in,
/// address column left blank.
pub fn write_mapping_template(path: &Path, identifiers: &[String]) -> Result<()> {
    let rows: Vec<Vec<String>> = identifiers
        .iter()
        .map(|identifier| {
            vec![
                identifier.clone(),
                String::new(),
                "NEEDS_EMAIL".to_string(),
                "Please fill in Email column manually".to_string(),
            ]
        })
        .collect();

    write_table(
        path,
        "Mapping",
        &["Username", "Email", "Status", "Instructions"],
        &rows,
    )
}
