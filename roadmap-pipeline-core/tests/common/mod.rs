#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use zip::write::FileOptions;
use zip::ZipWriter;

fn column_letter(index: usize) -> char {
    (b'A' + index as u8) as char
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Worksheet xml with inline string cells; empty strings leave the cell out.
pub fn sheet_xml(rows: &[Vec<&str>]) -> String {
    let mut body = String::new();
    for (r, row) in rows.iter().enumerate() {
        let n = r + 1;
        body.push_str(&format!("<row r=\"{n}\">"));
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            body.push_str(&format!(
                "<c r=\"{}{n}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                column_letter(c),
                escape(value)
            ));
        }
        body.push_str("</row>");
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>{body}</sheetData></worksheet>"
    )
}

/// Write a workbook whose sheets are given in order; `active` selects the active tab.
pub fn write_workbook(path: &Path, sheets: &[String], active: usize) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default();

    let sheet_entries: String = (1..=sheets.len())
        .map(|n| format!("<sheet name=\"Sheet{n}\" sheetId=\"{n}\" r:id=\"rId{n}\"/>"))
        .collect();
    let rels: String = (1..=sheets.len())
        .map(|n| {
            format!(
                "<Relationship Id=\"rId{n}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet{n}.xml\"/>"
            )
        })
        .collect();

    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(b"<?xml version=\"1.0\"?><Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\"/>")
        .unwrap();
    zip.start_file("xl/workbook.xml", options).unwrap();
    zip.write_all(
        format!(
            "<?xml version=\"1.0\"?><workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
             xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
             <bookViews><workbookView activeTab=\"{active}\"/></bookViews><sheets>{sheet_entries}</sheets></workbook>"
        )
        .as_bytes(),
    )
    .unwrap();
    zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
    zip.write_all(
        format!(
            "<?xml version=\"1.0\"?><Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">{rels}</Relationships>"
        )
        .as_bytes(),
    )
    .unwrap();
    for (i, sheet) in sheets.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)
            .unwrap();
        zip.write_all(sheet.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Single-sheet inventory workbook: a header row followed by `rows`.
pub fn write_inventory(path: &Path, rows: &[Vec<&str>]) {
    let mut all = vec![vec![
        "Device",
        "Owner",
        "Platform",
        "Tier",
        "Status",
        "Recommendation",
    ]];
    all.extend(rows.iter().cloned());
    write_workbook(path, &[sheet_xml(&all)], 0);
}

/// Inventory bytes, for serving from a mock HTTP server.
pub fn inventory_bytes(rows: &[Vec<&str>]) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventory.xlsx");
    write_inventory(&path, rows);
    std::fs::read(path).unwrap()
}
