//! Digest rendering: one HTML status summary per requester.

use chrono::{DateTime, Local};

use crate::model::{Row, Sheet};
use crate::settings::STATUS_COLUMN;

/// Columns shown in the digest table, in display order. Columns absent
/// from the selected sheet are simply left out.
const DISPLAY_COLUMNS: [&str; 11] = [
    "ERF Nr",
    "Material",
    "Material Description",
    "ERF Itm Qty",
    "Unit",
    "ERF Sched Line Status",
    "END",
    "PO Due Date",
    "Expeditor",
    "Expeditor Status",
    "Expeditor Remarks",
];

/// Remarks get more room than the rest before truncation.
const REMARKS_COLUMN: &str = "Expeditor Remarks";
const REMARKS_MAX_CHARS: usize = 150;
const CELL_MAX_CHARS: usize = 50;

/// Subject and body of one rendered digest; the dispatcher pairs it with
/// the resolved address.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDigest {
    pub subject: String,
    pub html_body: String,
}

/// Renders the digest for one requester group.
pub fn render_digest(
    requester: &str,
    sheet: &Sheet,
    rows: &[Row],
    target_statuses: &[String],
    sender_name: &str,
    generated_at: DateTime<Local>,
) -> RenderedDigest {
    let total = rows.len();
    let subject = format!("ERF Status Update - {total} Items");

    let mut summary_items = String::new();
    for status in target_statuses {
        let count = rows
            .iter()
            .filter(|row| sheet.value(row, STATUS_COLUMN).as_text() == Some(status.as_str()))
            .count();
        summary_items.push_str(&format!("<li>Items {}: {count}</li>\n", escape_html(status)));
    }

    let table = render_table(sheet, rows);
    let stamp = generated_at.format("%Y-%m-%d %H:%M:%S");

    let html_body = format!(
        r#"<html>
<body style="font-family: Arial, sans-serif; color: #333;">
<h2>Hello {requester},</h2>
<p>This is an automated status update for your ERF items.</p>
<div style="background-color: #f8f9fa; padding: 12px; border-left: 5px solid #4CAF50;">
<h3>Summary</h3>
<ul>
{summary_items}<li>Total Items: {total}</li>
</ul>
</div>
<p>Please find the detailed information in the table below:</p>
{table}
<p>If you have any questions or concerns regarding these items, please don't hesitate to reach out.</p>
<p style="border-top: 1px solid #ddd; padding-top: 10px; font-size: 12px; color: #666;">
Best regards,<br><strong>{sender}</strong><br>
<em>This is an automated email generated on {stamp}</em>
</p>
</body>
</html>
"#,
        requester = escape_html(requester),
        sender = escape_html(sender_name),
    );

    RenderedDigest { subject, html_body }
}

fn render_table(sheet: &Sheet, rows: &[Row]) -> String {
    let columns: Vec<&str> = DISPLAY_COLUMNS
        .iter()
        .copied()
        .filter(|column| sheet.columns.iter().any(|c| c == column))
        .collect();

    let mut html = String::from(
        "<table border=\"1\" cellpadding=\"6\" cellspacing=\"0\" \
         style=\"border-collapse: collapse; font-size: 12px; width: 100%;\">\n<thead>\n\
         <tr style=\"background-color: #4CAF50; color: white;\">\n",
    );
    for column in &columns {
        // The sheet stores the supplier commit under its export name; the
        // digest shows the label requesters know.
        let label = if *column == "PO Due Date" {
            "Commit Date"
        } else {
            *column
        };
        html.push_str(&format!("<th style=\"text-align: left;\">{}</th>\n", escape_html(label)));
    }
    html.push_str("</tr>\n</thead>\n<tbody>\n");

    for row in rows {
        let status = sheet.value(row, STATUS_COLUMN).display();
        let background = match status.as_str() {
            "On order" => "#FFF3CD",
            "Received" => "#D4EDDA",
            _ => "#FFFFFF",
        };
        html.push_str(&format!("<tr style=\"background-color: {background};\">\n"));
        for column in &columns {
            let value = sheet.value(row, column);
            let text = if value.is_empty() {
                "N/A".to_string()
            } else {
                value.display()
            };
            let limit = if *column == REMARKS_COLUMN {
                REMARKS_MAX_CHARS
            } else {
                CELL_MAX_CHARS
            };
            html.push_str(&format!("<td>{}</td>\n", escape_html(&truncate(&text, limit))));
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</tbody>\n</table>\n");
    html
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{cut}...")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellValue;

    fn sheet_and_rows() -> (Sheet, Vec<Row>) {
        let columns = vec![
            "ERF Nr".to_string(),
            "Material".to_string(),
            "ERF Sched Line Status".to_string(),
            "PO Due Date".to_string(),
            "Entered by".to_string(),
        ];
        let mut row = Row::new();
        row.insert("ERF Nr".to_string(), CellValue::Text("4711".to_string()));
        row.insert(
            "ERF Sched Line Status".to_string(),
            CellValue::Text("On order".to_string()),
        );
        row.insert(
            "Entered by".to_string(),
            CellValue::Text("JDOE".to_string()),
        );
        let sheet = Sheet::new("Main data", columns, vec![row.clone()]);
        (sheet, vec![row])
    }

    fn statuses() -> Vec<String> {
        vec!["On order".to_string(), "Received".to_string()]
    }

    #[test]
    fn subject_counts_the_group_rows() {
        let (sheet, rows) = sheet_and_rows();
        let digest = render_digest("JDOE", &sheet, &rows, &statuses(), "Team", Local::now());
        assert_eq!(digest.subject, "ERF Status Update - 1 Items");
    }

    #[test]
    fn body_greets_the_requester_and_summarises_statuses() {
        let (sheet, rows) = sheet_and_rows();
        let digest = render_digest("JDOE", &sheet, &rows, &statuses(), "Team", Local::now());
        assert!(digest.html_body.contains("Hello JDOE"));
        assert!(digest.html_body.contains("Items On order: 1"));
        assert!(digest.html_body.contains("Items Received: 0"));
    }

    #[test]
    fn due_date_column_is_relabelled_commit_date() {
        let (sheet, rows) = sheet_and_rows();
        let digest = render_digest("JDOE", &sheet, &rows, &statuses(), "Team", Local::now());
        assert!(digest.html_body.contains("Commit Date"));
        assert!(!digest.html_body.contains("PO Due Date"));
    }

    #[test]
    fn missing_cells_render_as_na() {
        let (sheet, rows) = sheet_and_rows();
        let digest = render_digest("JDOE", &sheet, &rows, &statuses(), "Team", Local::now());
        // The row has no Material value.
        assert!(digest.html_body.contains("<td>N/A</td>"));
    }

    #[test]
    fn long_values_are_truncated() {
        assert_eq!(truncate("abcdef", 5), "ab...");
        assert_eq!(truncate("abcde", 5), "abcde");
    }
}
