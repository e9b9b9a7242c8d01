use std::path::Path;

use erf_digest::DigestError;
use erf_digest::dispatch::dispatch;
use erf_digest::io::{excel_read, excel_write};
use erf_digest::model::{DispatchMode, OutgoingMessage};
use erf_digest::pipeline;
use erf_digest::resolve::EmailResolver;
use erf_digest::select;
use erf_digest::settings::Settings;
use erf_digest::transport::MailTransport;
use rust_xlsxwriter::Workbook;
use tempfile::tempdir;

#[derive(Default)]
struct RecordingTransport {
    sent: Vec<OutgoingMessage>,
}

impl MailTransport for RecordingTransport {
    fn send(&mut self, message: &OutgoingMessage) -> bool {
        self.sent.push(message.clone());
        true
    }
}

fn write_input_workbook(path: &Path) {
    let mut workbook = Workbook::new();

    // A pivot-style summary that carries both mandatory column names: it
    // must still be rejected before scoring ever happens.
    let summary = workbook.add_worksheet();
    summary.set_name("Summary").expect("sheet name");
    for (col, header) in ["ERF Sched Line Status", "Entered by", "Count"]
        .iter()
        .enumerate()
    {
        summary
            .write_string(0, col as u16, *header)
            .expect("header written");
    }
    summary
        .write_string(1, 0, "Row Labels")
        .expect("cell written");
    summary.write_string(1, 1, "JDOE").expect("cell written");
    summary.write_number(1, 2, 12.0).expect("cell written");

    let main = workbook.add_worksheet();
    main.set_name("Main data").expect("sheet name");
    let headers = [
        "Plnt",
        "ERF Nr",
        "Item",
        "Entered by",
        "Material",
        "Material Description",
        "Unit",
        "ERF Itm Qty",
        "ERF Sched Line Status",
        "PO Due Date",
        "Expeditor",
        "Expeditor Status",
        "Expeditor Remarks",
    ];
    for (col, header) in headers.iter().enumerate() {
        main.write_string(0, col as u16, *header)
            .expect("header written");
    }

    let rows: [(&str, &str, &str); 6] = [
        ("1001", "JDOE", "On order"),
        ("1002", "JDOE", "Received"),
        ("1003", "ASMITH", "On order"),
        ("1004", "", "On order"),
        ("1005", "GHOST", "On order"),
        ("1006", "BBROWN", "Cancelled"),
    ];
    for (idx, (erf_nr, requester, status)) in rows.iter().enumerate() {
        let row = (idx + 1) as u32;
        main.write_string(row, 0, "0001").expect("cell written");
        main.write_string(row, 1, *erf_nr).expect("cell written");
        main.write_number(row, 2, (idx + 1) as f64)
            .expect("cell written");
        if !requester.is_empty() {
            main.write_string(row, 3, *requester).expect("cell written");
        }
        main.write_string(row, 4, "M-100").expect("cell written");
        main.write_string(row, 5, "Gate valve").expect("cell written");
        main.write_string(row, 6, "EA").expect("cell written");
        main.write_number(row, 7, 2.0).expect("cell written");
        main.write_string(row, 8, *status).expect("cell written");
        main.write_string(row, 9, "2026-09-01").expect("cell written");
    }

    workbook.save(path).expect("workbook saved");
}

fn write_mapping_workbook(path: &Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Mapping").expect("sheet name");
    let rows = [
        ("Eng", "Email"),
        ("JDOE", "j.doe@example.com"),
        ("ASMITH", "a.smith@example.com"),
        ("BROKEN", "not-an-address"),
    ];
    for (idx, (identifier, address)) in rows.iter().enumerate() {
        sheet
            .write_string(idx as u32, 0, *identifier)
            .expect("cell written");
        sheet
            .write_string(idx as u32, 1, *address)
            .expect("cell written");
    }
    workbook.save(path).expect("mapping saved");
}

#[test]
fn live_run_selects_filters_resolves_and_dispatches() {
    let temp = tempdir().expect("temporary directory");
    let input_path = temp.path().join("erf_report.xlsx");
    let mapping_path = temp.path().join("email_mapping.xlsx");
    write_input_workbook(&input_path);
    write_mapping_workbook(&mapping_path);

    let settings = Settings {
        export_dir: temp.path().to_path_buf(),
        ..Settings::default()
    };

    let prepared = pipeline::prepare(&input_path, &settings).expect("pipeline prepared");
    assert_eq!(prepared.dataset.sheet.name, "Main data");
    assert_eq!(prepared.total_rows, 6);
    // The Cancelled row is filtered out; the blank requester survives the
    // filter and is dropped by grouping.
    assert_eq!(prepared.filtered_rows, 5);
    assert_eq!(prepared.status_breakdown.get("On order"), Some(&4));
    assert_eq!(prepared.status_breakdown.get("Received"), Some(&1));

    let keys: Vec<&str> = prepared.groups.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, vec!["JDOE", "ASMITH", "GHOST"]);

    let mut resolver = EmailResolver::from_mapping_file(&mapping_path);
    assert_eq!(resolver.mapping_len(), 2);

    let mut transport = RecordingTransport::default();
    let result = dispatch(
        &prepared.dataset.sheet,
        &prepared.groups,
        DispatchMode::Live,
        &[],
        &mut resolver,
        &mut transport,
        &settings,
    )
    .expect("live dispatch");

    assert_eq!(result.successful, 2);
    assert_eq!(result.failed, 0);
    assert_eq!(transport.sent.len(), 2);
    assert_eq!(transport.sent[0].to, "j.doe@example.com");
    assert_eq!(transport.sent[0].subject, "ERF Status Update - 2 Items");
    assert!(transport.sent[0].html_body.contains("Hello JDOE"));

    // GHOST could not be resolved and must end up in the export artifact.
    assert_eq!(resolver.unmapped().len(), 1);
    assert!(resolver.unmapped().contains("GHOST"));
    let export_written = std::fs::read_dir(temp.path())
        .expect("read export dir")
        .any(|entry| {
            entry
                .expect("dir entry")
                .file_name()
                .to_string_lossy()
                .starts_with("unmapped_users_live_")
        });
    assert!(export_written);
}

#[test]
fn preview_run_resolves_without_sending() {
    let temp = tempdir().expect("temporary directory");
    let input_path = temp.path().join("erf_report.xlsx");
    write_input_workbook(&input_path);

    let settings = Settings {
        export_dir: temp.path().to_path_buf(),
        ..Settings::default()
    };
    let prepared = pipeline::prepare(&input_path, &settings).expect("pipeline prepared");

    let mut resolver = EmailResolver::new();
    resolver.add_manual_mapping("JDOE", "j.doe@example.com");
    let mut transport = RecordingTransport::default();

    let result = dispatch(
        &prepared.dataset.sheet,
        &prepared.groups,
        DispatchMode::Preview,
        &[],
        &mut resolver,
        &mut transport,
        &settings,
    )
    .expect("preview dispatch");

    assert!(transport.sent.is_empty());
    assert_eq!(result.per_recipient.len(), 3);
    assert_eq!(
        result.per_recipient[0].resolved_address,
        Some("j.doe@example.com".to_string())
    );
}

#[test]
fn workbook_without_a_data_sheet_reports_every_rejection() {
    let temp = tempdir().expect("temporary directory");
    let input_path = temp.path().join("pivots_only.xlsx");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Totals").expect("sheet name");
    sheet.write_string(0, 0, "Material").expect("header written");
    sheet
        .write_string(1, 0, "Grand Total")
        .expect("cell written");
    workbook.save(&input_path).expect("workbook saved");

    let loaded = excel_read::load_workbook(&input_path).expect("workbook loaded");
    match select::select(&loaded) {
        Err(DigestError::SheetNotFound(rejections)) => {
            assert_eq!(rejections.len(), 1);
            assert_eq!(rejections[0].sheet_name, "Totals");
        }
        other => panic!("expected SheetNotFound, got {other:?}"),
    }
}

#[test]
fn mapping_template_round_trips_through_the_resolver() {
    let temp = tempdir().expect("temporary directory");
    let input_path = temp.path().join("erf_report.xlsx");
    write_input_workbook(&input_path);

    let requesters = pipeline::extract_requesters(&input_path).expect("requesters extracted");
    assert_eq!(requesters, vec!["ASMITH", "BBROWN", "GHOST", "JDOE"]);

    let template_path = temp.path().join("mapping_template.xlsx");
    excel_write::write_mapping_template(&template_path, &requesters).expect("template written");

    // Fill the template the way an operator would and feed it back in.
    let loaded = excel_read::load_workbook(&template_path).expect("template loaded");
    let sheet = loaded.sheets.first().expect("template sheet");
    assert_eq!(sheet.columns[0], "Username");
    assert_eq!(sheet.rows.len(), 4);

    let mut resolver = EmailResolver::new();
    resolver.add_manual_mapping("GHOST", "ghost@example.com");
    assert_eq!(
        resolver.resolve("ghost"),
        Some("ghost@example.com".to_string())
    );
}
