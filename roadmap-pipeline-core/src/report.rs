//! Report renderer: the narrative roadmap document (WordprocessingML).
//!
//! The document is first assembled as a [`ReportDocument`] of ordered [`Block`]s and then
//! serialised. Section order is fixed. The change-ticket section covers at most
//! [`MAX_CHANGE_TICKETS`] devices and the epic/story section at most [`MAX_STORIES`].

use std::path::PathBuf;

use tracing::info;

use crate::contract::DeviceRecord;
use crate::ooxml::{escape, write_package, Part, RenderError, XML_DECLARATION};
use crate::workspace::SessionWorkspace;

pub const REPORT_FILE_NAME: &str = "IT_Transformation_Roadmap.docx";
pub const REPORT_FILE_TYPE: &str = "docx_roadmap";

pub const MAX_CHANGE_TICKETS: usize = 10;
pub const MAX_STORIES: usize = 5;

pub const MATRIX_HEADER: [&str; 5] = [
    "Device",
    "Current Platform",
    "Tier",
    "Recommendation",
    "Status",
];
pub const MISSING_RECOMMENDATION: &str = "N/A";
pub const DEFAULT_JUSTIFICATION: &str = "Recommended upgrade";
pub const EPIC_TITLE: &str = "Epic: Hardware Modernization";

const EXECUTIVE_SUMMARY: &str = "This roadmap defines phases, timelines, epics, and configuration changes aligned with the organization's modernization goals.";
const PROJECT_PLAN: &str = "Phased approach with estimated timelines:";
const RISK_AND_MITIGATION: &str = "Risk: Data loss during migration\nMitigation: Implement snapshot and rollback plan before all major hardware changes.";

/// One top-level element of the report body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Title(String),
    /// A paragraph rendered in bold.
    Emphasis(String),
    Heading(String),
    /// A paragraph; embedded newlines become line breaks.
    Paragraph(String),
    Table {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportDocument {
    pub blocks: Vec<Block>,
}

/// "Normal" when the status mentions obsolescence in any letter case, otherwise "Standard".
pub fn ticket_type(status: &str) -> &'static str {
    if status.to_lowercase().contains("obsolete") {
        "Normal"
    } else {
        "Standard"
    }
}

pub fn change_ticket(number: usize, device: &DeviceRecord) -> String {
    format!(
        "Change Ticket #{number}\n\
         - CI: {}\n\
         - Type: {}\n\
         - Justification: {}\n\
         - Schedule: Phase 1 (Month 1-2)\n\
         - Impact: Moderate",
        device.name,
        ticket_type(&device.status),
        device.recommendation().unwrap_or(DEFAULT_JUSTIFICATION),
    )
}

pub fn user_story(device: &DeviceRecord) -> String {
    format!(" - Story: Upgrade {} to meet performance targets.", device.name)
}

fn matrix_row(device: &DeviceRecord) -> Vec<String> {
    vec![
        device.name.clone(),
        device.platform.clone(),
        device.tier.clone(),
        device
            .recommendation()
            .unwrap_or(MISSING_RECOMMENDATION)
            .to_string(),
        device.status.clone(),
    ]
}

pub fn build_report(session_id: &str, devices: &[DeviceRecord]) -> ReportDocument {
    let mut blocks = vec![
        Block::Title("IT Transformation Roadmap".into()),
        Block::Emphasis(format!("Session: {session_id}")),
        Block::Heading("1. Executive Summary".into()),
        Block::Paragraph(EXECUTIVE_SUMMARY.into()),
        Block::Heading("2. Project Plan".into()),
        Block::Paragraph(PROJECT_PLAN.into()),
        Block::Heading("3. Device Transformation Matrix".into()),
        Block::Table {
            header: MATRIX_HEADER.iter().map(|h| h.to_string()).collect(),
            rows: devices.iter().map(matrix_row).collect(),
        },
        Block::Heading("4. Change Tickets".into()),
    ];

    blocks.extend(
        devices
            .iter()
            .take(MAX_CHANGE_TICKETS)
            .enumerate()
            .map(|(i, d)| Block::Paragraph(change_ticket(i + 1, d))),
    );

    blocks.push(Block::Heading("5. Agile Epics and Stories".into()));
    blocks.push(Block::Paragraph(EPIC_TITLE.into()));
    blocks.extend(
        devices
            .iter()
            .take(MAX_STORIES)
            .map(|d| Block::Paragraph(user_story(d))),
    );

    blocks.push(Block::Heading("6. Risk and Mitigation".into()));
    blocks.push(Block::Paragraph(RISK_AND_MITIGATION.into()));

    ReportDocument { blocks }
}

/// Build the report for `devices` and save it as [`REPORT_FILE_NAME`] in the workspace.
pub fn render_report(
    workspace: &SessionWorkspace,
    devices: &[DeviceRecord],
) -> Result<PathBuf, RenderError> {
    let document = build_report(workspace.session_id(), devices);
    let path = workspace.path_for(REPORT_FILE_NAME);
    write_package(&path, &docx_parts(&document))?;
    info!(
        path = %path.display(),
        devices = devices.len(),
        blocks = document.blocks.len(),
        "Rendered roadmap report"
    );
    Ok(path)
}

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const CELL_WIDTH: u32 = 1870;

fn docx_parts(document: &ReportDocument) -> Vec<Part> {
    vec![
        Part::new("[Content_Types].xml", CONTENT_TYPES),
        Part::new("_rels/.rels", PACKAGE_RELS),
        Part::new("word/_rels/document.xml.rels", DOCUMENT_RELS),
        Part::new("word/styles.xml", styles_xml()),
        Part::new("word/document.xml", document_xml(document)),
    ]
}

fn runs(text: &str, bold: bool) -> String {
    let props = if bold { "<w:rPr><w:b/></w:rPr>" } else { "" };
    text.split('\n')
        .enumerate()
        .map(|(i, line)| {
            let br = if i > 0 { "<w:br/>" } else { "" };
            format!(
                "<w:r>{props}{br}<w:t xml:space=\"preserve\">{}</w:t></w:r>",
                escape(line)
            )
        })
        .collect()
}

fn paragraph(style: Option<&str>, text: &str, bold: bool) -> String {
    let props = style
        .map(|s| format!("<w:pPr><w:pStyle w:val=\"{s}\"/></w:pPr>"))
        .unwrap_or_default();
    format!("<w:p>{props}{}</w:p>", runs(text, bold))
}

fn table_row(cells: &[String], bold: bool) -> String {
    let cells: String = cells
        .iter()
        .map(|c| {
            format!(
                "<w:tc><w:tcPr><w:tcW w:w=\"{CELL_WIDTH}\" w:type=\"dxa\"/></w:tcPr>{}</w:tc>",
                paragraph(None, c, bold)
            )
        })
        .collect();
    format!("<w:tr>{cells}</w:tr>")
}

fn table(header: &[String], rows: &[Vec<String>]) -> String {
    let grid: String = header
        .iter()
        .map(|_| format!("<w:gridCol w:w=\"{CELL_WIDTH}\"/>"))
        .collect();
    let body: String = rows.iter().map(|r| table_row(r, false)).collect();
    format!(
        "<w:tbl><w:tblPr><w:tblStyle w:val=\"TableGrid\"/><w:tblW w:w=\"0\" w:type=\"auto\"/></w:tblPr>\
         <w:tblGrid>{grid}</w:tblGrid>{}{body}</w:tbl>",
        table_row(header, true)
    )
}

fn document_xml(document: &ReportDocument) -> String {
    let body: String = document
        .blocks
        .iter()
        .map(|block| match block {
            Block::Title(t) => paragraph(Some("Title"), t, false),
            Block::Emphasis(t) => paragraph(None, t, true),
            Block::Heading(t) => paragraph(Some("Heading1"), t, false),
            Block::Paragraph(t) => paragraph(None, t, false),
            Block::Table { header, rows } => table(header, rows),
        })
        .collect();
    format!(
        "{XML_DECLARATION}<w:document xmlns:w=\"{W_NS}\"><w:body>{body}\
         <w:sectPr><w:pgSz w:w=\"12240\" w:h=\"15840\"/>\
         <w:pgMar w:top=\"1440\" w:right=\"1440\" w:bottom=\"1440\" w:left=\"1440\" w:header=\"720\" w:footer=\"720\" w:gutter=\"0\"/>\
         </w:sectPr></w:body></w:document>"
    )
}

fn styles_xml() -> String {
    format!(
        "{XML_DECLARATION}<w:styles xmlns:w=\"{W_NS}\">\
         <w:style w:type=\"paragraph\" w:default=\"1\" w:styleId=\"Normal\"><w:name w:val=\"Normal\"/>\
         <w:rPr><w:sz w:val=\"22\"/></w:rPr></w:style>\
         <w:style w:type=\"paragraph\" w:styleId=\"Title\"><w:name w:val=\"Title\"/><w:basedOn w:val=\"Normal\"/>\
         <w:next w:val=\"Normal\"/><w:pPr><w:spacing w:after=\"240\"/></w:pPr>\
         <w:rPr><w:b/><w:sz w:val=\"52\"/></w:rPr></w:style>\
         <w:style w:type=\"paragraph\" w:styleId=\"Heading1\"><w:name w:val=\"heading 1\"/><w:basedOn w:val=\"Normal\"/>\
         <w:next w:val=\"Normal\"/><w:pPr><w:keepNext/><w:spacing w:before=\"360\" w:after=\"120\"/><w:outlineLvl w:val=\"0\"/></w:pPr>\
         <w:rPr><w:b/><w:sz w:val=\"32\"/></w:rPr></w:style>\
         <w:style w:type=\"table\" w:styleId=\"TableGrid\"><w:name w:val=\"Table Grid\"/>\
         <w:tblPr><w:tblBorders>\
         <w:top w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
         <w:left w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
         <w:bottom w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
         <w:right w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
         <w:insideH w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
         <w:insideV w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
         </w:tblBorders></w:tblPr></w:style>\
         </w:styles>"
    )
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;
