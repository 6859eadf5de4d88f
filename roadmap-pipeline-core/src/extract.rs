//! Record extraction: read device rows from recognized inventory spreadsheets.
//!
//! Only files tagged with one of [`RECOGNIZED_TYPES`] are opened. Row one is a header and is
//! always skipped; columns A, C, D, E and F map to name, platform, tier, status and
//! recommendation. A missing cell yields an empty field. A workbook that cannot be opened is
//! skipped and reported, and extraction continues with the next file.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, error, info};
use zip::ZipArchive;

use crate::contract::{DeviceRecord, ExtractionReport, InputFile, SkippedFile};

/// Spreadsheet categories that carry device inventory rows.
pub const RECOGNIZED_TYPES: [&str; 2] = ["gap_hw", "gap_sw"];

const DEFAULT_SHEET: &str = "xl/worksheets/sheet1.xml";

// Widest column reference a worksheet can hold (`XFD`).
const MAX_COLUMN_LETTERS: usize = 3;

// Zero-based column positions for each record field.
const COL_NAME: usize = 0;
const COL_PLATFORM: usize = 2;
const COL_TIER: usize = 3;
const COL_STATUS: usize = 4;
const COL_RECOMMENDATION: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("file was never downloaded")]
    NotAcquired,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a readable workbook: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("malformed sheet xml: {0}")]
    Xml(#[from] quick_xml::Error),
}

pub fn is_recognized(file_type: &str) -> bool {
    RECOGNIZED_TYPES.contains(&file_type)
}

/// Concatenate device records of all recognized files, in file order then row order.
pub fn extract(files: &[InputFile]) -> ExtractionReport {
    let mut report = ExtractionReport::default();

    for file in files.iter().filter(|f| is_recognized(&f.file_type)) {
        let result = match &file.local_path {
            Some(path) => read_devices(path),
            None => Err(ExtractError::NotAcquired),
        };
        match result {
            Ok(devices) => {
                info!(
                    file = %file.file_name,
                    rows = devices.len(),
                    "[EXTRACT] Read device rows"
                );
                report.devices.extend(devices);
            }
            Err(e) => {
                error!(file = %file.file_name, error = ?e, "[EXTRACT] Skipping unreadable workbook");
                report.skipped.push(SkippedFile::new(&file.file_name, e.to_string()));
            }
        }
    }

    info!(
        devices = report.devices.len(),
        skipped = report.skipped.len(),
        "[EXTRACT] Extraction finished"
    );
    report
}

/// Read every data row of the workbook's active sheet as a device record.
pub fn read_devices(path: &Path) -> Result<Vec<DeviceRecord>, ExtractError> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    let rows = read_active_sheet(&mut archive)?;
    Ok(rows
        .into_iter()
        .filter(|(index, _)| *index > 1)
        .map(|(_, cells)| row_to_device(&cells))
        .collect())
}

fn row_to_device(cells: &HashMap<usize, String>) -> DeviceRecord {
    let cell = |col: usize| cells.get(&col).cloned().unwrap_or_default();
    DeviceRecord {
        name: cell(COL_NAME),
        platform: cell(COL_PLATFORM),
        tier: cell(COL_TIER),
        status: cell(COL_STATUS),
        recommendation: cell(COL_RECOMMENDATION),
    }
}

type Row = (u32, HashMap<usize, String>);

fn read_active_sheet<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<Row>, ExtractError> {
    let shared = match read_part(archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let sheet_path = active_sheet_path(archive)?;
    debug!(sheet = %sheet_path, shared_strings = shared.len(), "Resolved active worksheet");
    let sheet = read_part(archive, &sheet_path)?
        .ok_or(zip::result::ZipError::FileNotFound)?;
    parse_sheet(&sheet, &shared)
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, ExtractError> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut xml = String::new();
    part.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

/// Resolve `workbookView/@activeTab` to its worksheet part, falling back to the first sheet.
fn active_sheet_path<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String, ExtractError> {
    let Some(workbook) = read_part(archive, "xl/workbook.xml")? else {
        return Ok(DEFAULT_SHEET.to_string());
    };
    let Some(rels) = read_part(archive, "xl/_rels/workbook.xml.rels")? else {
        return Ok(DEFAULT_SHEET.to_string());
    };

    let mut active_tab = 0usize;
    let mut sheet_rel_ids = Vec::new();
    let mut reader = Reader::from_str(&workbook);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"workbookView" => {
                    if let Some(tab) = attr(&e, b"activeTab").and_then(|v| v.parse().ok()) {
                        active_tab = tab;
                    }
                }
                b"sheet" => {
                    if let Some(id) = attr(&e, b"r:id") {
                        sheet_rel_ids.push(id);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let Some(rel_id) = sheet_rel_ids.get(active_tab).or(sheet_rel_ids.first()) else {
        return Ok(DEFAULT_SHEET.to_string());
    };

    let mut reader = Reader::from_str(&rels);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attr(&e, b"Id").as_deref() == Some(rel_id.as_str()) {
                    if let Some(target) = attr(&e, b"Target") {
                        return Ok(resolve_target(&target));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(DEFAULT_SHEET.to_string())
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{target}"),
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Resolve a predefined or numeric entity reference (`amp`, `#38`, `#x26`).
fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, ExtractError> {
    let mut strings = Vec::new();
    let mut reader = Reader::from_str(xml);
    let mut current: Option<String> = None;
    let mut in_text = false;
    // Phonetic runs (<rPh>) repeat the text and are not part of the value.
    let mut in_phonetic = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = !in_phonetic,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(t) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::GeneralRef(r) if in_text => {
                if let (Some(s), Some(c)) =
                    (current.as_mut(), resolve_entity(&String::from_utf8_lossy(&r)))
                {
                    s.push(c);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(current.take().unwrap_or_default()),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

/// Zero-based column index from a cell reference such as `C12`; `None` past `XFD`.
fn column_index(reference: &str) -> Option<usize> {
    let letters: String = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() || letters.len() > MAX_COLUMN_LETTERS {
        return None;
    }
    let col = letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1));
    Some(col - 1)
}

#[derive(Default)]
struct PendingCell {
    column: usize,
    kind: String,
    value: String,
    capture: bool,
}

fn parse_sheet(xml: &str, shared: &[String]) -> Result<Vec<Row>, ExtractError> {
    let mut rows: Vec<Row> = Vec::new();
    let mut reader = Reader::from_str(xml);
    let mut row: Option<Row> = None;
    let mut cell: Option<PendingCell> = None;
    let mut next_row = 1u32;
    let mut next_col = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    let index = attr(&e, b"r").and_then(|r| r.parse().ok()).unwrap_or(next_row);
                    next_row = index.saturating_add(1);
                    next_col = 0;
                    row = Some((index, HashMap::new()));
                }
                b"c" => {
                    let column = attr(&e, b"r")
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next_col);
                    next_col = column + 1;
                    cell = Some(PendingCell {
                        column,
                        kind: attr(&e, b"t").unwrap_or_default(),
                        ..Default::default()
                    });
                }
                b"v" | b"t" => {
                    if let Some(c) = cell.as_mut() {
                        c.capture = true;
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    let index = attr(&e, b"r").and_then(|r| r.parse().ok()).unwrap_or(next_row);
                    next_row = index.saturating_add(1);
                    rows.push((index, HashMap::new()));
                }
                b"c" => {
                    next_col = attr(&e, b"r")
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next_col)
                        + 1;
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some(c) = cell.as_mut().filter(|c| c.capture) {
                    c.value.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::GeneralRef(r) => {
                if let Some(c) = cell.as_mut().filter(|c| c.capture) {
                    if let Some(ch) = resolve_entity(&String::from_utf8_lossy(&r)) {
                        c.value.push(ch);
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => {
                    if let Some(c) = cell.as_mut() {
                        c.capture = false;
                    }
                }
                b"c" => {
                    if let (Some(c), Some((_, cells))) = (cell.take(), row.as_mut()) {
                        cells.insert(c.column, cell_value(&c, shared));
                    }
                }
                b"row" => {
                    if let Some(r) = row.take() {
                        rows.push(r);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rows)
}

fn cell_value(cell: &PendingCell, shared: &[String]) -> String {
    match cell.kind.as_str() {
        "s" => cell
            .value
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i).cloned())
            .unwrap_or_default(),
        "b" => match cell.value.trim() {
            "1" => "TRUE".to_string(),
            "0" => "FALSE".to_string(),
            other => other.to_string(),
        },
        _ => cell.value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters_map_to_indices() {
        assert_eq!(column_index("A1"), Some(0));
        assert_eq!(column_index("F22"), Some(5));
        assert_eq!(column_index("AA3"), Some(26));
        assert_eq!(column_index("12"), None);
        assert_eq!(column_index("XFD1"), Some(16_383));
        assert_eq!(column_index("ZZZZZZZZZZZZZZZ2"), None);
    }

    #[test]
    fn shared_strings_join_rich_runs_and_skip_phonetics() {
        let xml = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
            <si><t>Plain</t></si>
            <si><r><t>Rich </t></r><r><t>Text</t></r></si>
            <si><t>A&amp;B</t><rPh><t>ignored</t></rPh></si>
            <si/>
        </sst>"#;
        let strings = parse_shared_strings(xml).unwrap();
        assert_eq!(strings, vec!["Plain", "Rich Text", "A&B", ""]);
    }

    #[test]
    fn sheet_cells_resolve_by_reference() {
        let shared = vec!["router-1".to_string(), "Cisco".to_string()];
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="inlineStr"><is><t>Name</t></is></c></row>
            <row r="2">
                <c r="A2" t="s"><v>0</v></c>
                <c r="C2" t="s"><v>1</v></c>
                <c r="D2"><v>2</v></c>
                <c r="E2" t="b"><v>1</v></c>
            </row>
        </sheetData></worksheet>"#;
        let rows = parse_sheet(xml, &shared).unwrap();
        assert_eq!(rows.len(), 2);
        let device = row_to_device(&rows[1].1);
        assert_eq!(device.name, "router-1");
        assert_eq!(device.platform, "Cisco");
        assert_eq!(device.tier, "2");
        assert_eq!(device.status, "TRUE");
        assert_eq!(device.recommendation, "");
    }

    #[test]
    fn cells_without_reference_take_next_position() {
        let xml = r#"<worksheet><sheetData>
            <row><c t="inlineStr"><is><t>a</t></is></c><c/><c t="inlineStr"><is><t>c</t></is></c></row>
        </sheetData></worksheet>"#;
        let rows = parse_sheet(xml, &[]).unwrap();
        assert_eq!(rows[0].0, 1);
        assert_eq!(rows[0].1.get(&0).map(String::as_str), Some("a"));
        assert_eq!(rows[0].1.get(&2).map(String::as_str), Some("c"));
    }

    #[test]
    fn last_possible_row_index_does_not_wrap() {
        let xml = r#"<worksheet><sheetData>
            <row r="4294967295"><c r="A4294967295" t="inlineStr"><is><t>last</t></is></c></row>
            <row><c t="inlineStr"><is><t>after</t></is></c></row>
        </sheetData></worksheet>"#;
        let rows = parse_sheet(xml, &[]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, u32::MAX);
        assert_eq!(rows[1].0, u32::MAX);
    }

    #[test]
    fn resolves_relationship_targets() {
        assert_eq!(resolve_target("worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
        assert_eq!(resolve_target("/xl/worksheets/sheet3.xml"), "xl/worksheets/sheet3.xml");
    }

    #[test]
    fn unrecognized_types_are_not_opened() {
        let mut file = InputFile::new("notes.xlsx", "budget", "http://example.invalid");
        file.local_path = Some("/definitely/not/here.xlsx".into());
        let report = extract(&[file]);
        assert!(report.devices.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn unreadable_workbook_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip").unwrap();
        let mut file = InputFile::new("broken.xlsx", "gap_hw", "http://example.invalid");
        file.local_path = Some(path);
        let report = extract(&[file]);
        assert!(report.devices.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].file_name, "broken.xlsx");
    }
}
