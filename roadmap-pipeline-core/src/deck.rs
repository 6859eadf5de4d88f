//! Deck renderer: the transformation timeline slides (PresentationML).
//!
//! A title slide carrying the session id is followed by three bulleted slides. The epic and
//! transition slides list at most [`MAX_SUMMARY_DEVICES`] devices.

use std::path::PathBuf;

use tracing::info;

use crate::contract::DeviceRecord;
use crate::ooxml::{escape, write_package, Part, RenderError, XML_DECLARATION};
use crate::workspace::SessionWorkspace;

pub const DECK_FILE_NAME: &str = "IT_Transformation_Timeline.pptx";
pub const DECK_FILE_TYPE: &str = "pptx_roadmap";

pub const MAX_SUMMARY_DEVICES: usize = 5;
pub const DECK_TITLE: &str = "Transformation Timeline";
pub const TRANSITION_PLACEHOLDER: &str = "Optimized";

pub const PHASES: [&str; 3] = [
    "Phase 1: Infra upgrade (Month 1-3)",
    "Phase 2: App Modernization (Month 4-6)",
    "Phase 3: Cloud Migration (Month 7-12)",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slide {
    Title { title: String, subtitle: String },
    Bullets { title: String, bullets: Vec<String> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deck {
    pub slides: Vec<Slide>,
}

pub fn transition_bullet(device: &DeviceRecord) -> String {
    format!(
        "{} → {}",
        device.name,
        device.recommendation().unwrap_or(TRANSITION_PLACEHOLDER)
    )
}

pub fn build_deck(session_id: &str, devices: &[DeviceRecord]) -> Deck {
    let summary = &devices[..devices.len().min(MAX_SUMMARY_DEVICES)];
    Deck {
        slides: vec![
            Slide::Title {
                title: DECK_TITLE.into(),
                subtitle: format!("Session: {session_id}"),
            },
            Slide::Bullets {
                title: "Phase Timeline".into(),
                bullets: PHASES.iter().map(|p| p.to_string()).collect(),
            },
            Slide::Bullets {
                title: "Epic Summary".into(),
                bullets: summary.iter().map(|d| format!("Upgrade {}", d.name)).collect(),
            },
            Slide::Bullets {
                title: "CI Transitions".into(),
                bullets: summary.iter().map(transition_bullet).collect(),
            },
        ],
    }
}

/// Build the deck for `devices` and save it as [`DECK_FILE_NAME`] in the workspace.
pub fn render_deck(
    workspace: &SessionWorkspace,
    devices: &[DeviceRecord],
) -> Result<PathBuf, RenderError> {
    let deck = build_deck(workspace.session_id(), devices);
    let path = workspace.path_for(DECK_FILE_NAME);
    write_package(&path, &pptx_parts(&deck))?;
    info!(path = %path.display(), slides = deck.slides.len(), "Rendered timeline deck");
    Ok(path)
}

const NS: &str = "xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" \
                  xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\" \
                  xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\"";
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const CT_PML: &str = "application/vnd.openxmlformats-officedocument.presentationml";

// Slide geometry (EMU) for a 4:3 deck.
const SLIDE_CX: u64 = 9_144_000;
const SLIDE_CY: u64 = 6_858_000;
const MARGIN_X: u64 = 457_200;

fn pptx_parts(deck: &Deck) -> Vec<Part> {
    let count = deck.slides.len();
    let mut parts = vec![
        Part::new("[Content_Types].xml", content_types(count)),
        Part::new("_rels/.rels", relationships(&[(
            "rId1",
            "officeDocument",
            "ppt/presentation.xml",
        )])),
        Part::new("ppt/presentation.xml", presentation_xml(count)),
        Part::new("ppt/_rels/presentation.xml.rels", presentation_rels(count)),
        Part::new("ppt/slideMasters/slideMaster1.xml", master_xml()),
        Part::new(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            relationships(&[
                ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
                ("rId2", "slideLayout", "../slideLayouts/slideLayout2.xml"),
                ("rId3", "theme", "../theme/theme1.xml"),
            ]),
        ),
        Part::new("ppt/slideLayouts/slideLayout1.xml", layout_xml("title", "Title Slide")),
        Part::new("ppt/slideLayouts/slideLayout2.xml", layout_xml("obj", "Title and Content")),
        Part::new("ppt/theme/theme1.xml", THEME),
    ];
    for n in 1..=2 {
        parts.push(Part::new(
            format!("ppt/slideLayouts/_rels/slideLayout{n}.xml.rels"),
            relationships(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]),
        ));
    }
    for (i, slide) in deck.slides.iter().enumerate() {
        let n = i + 1;
        let layout = match slide {
            Slide::Title { .. } => "../slideLayouts/slideLayout1.xml",
            Slide::Bullets { .. } => "../slideLayouts/slideLayout2.xml",
        };
        parts.push(Part::new(format!("ppt/slides/slide{n}.xml"), slide_xml(slide)));
        parts.push(Part::new(
            format!("ppt/slides/_rels/slide{n}.xml.rels"),
            relationships(&[("rId1", "slideLayout", layout)]),
        ));
    }
    parts
}

fn relationships(rels: &[(&str, &str, &str)]) -> String {
    let body: String = rels
        .iter()
        .map(|(id, kind, target)| {
            format!("<Relationship Id=\"{id}\" Type=\"{REL_TYPE}/{kind}\" Target=\"{target}\"/>")
        })
        .collect();
    format!("{XML_DECLARATION}<Relationships xmlns=\"{REL_NS}\">{body}</Relationships>")
}

fn content_types(slides: usize) -> String {
    let slide_overrides: String = (1..=slides)
        .map(|n| {
            format!("<Override PartName=\"/ppt/slides/slide{n}.xml\" ContentType=\"{CT_PML}.slide+xml\"/>")
        })
        .collect();
    format!(
        "{XML_DECLARATION}<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
         <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
         <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
         <Override PartName=\"/ppt/presentation.xml\" ContentType=\"{CT_PML}.presentation.main+xml\"/>\
         <Override PartName=\"/ppt/slideMasters/slideMaster1.xml\" ContentType=\"{CT_PML}.slideMaster+xml\"/>\
         <Override PartName=\"/ppt/slideLayouts/slideLayout1.xml\" ContentType=\"{CT_PML}.slideLayout+xml\"/>\
         <Override PartName=\"/ppt/slideLayouts/slideLayout2.xml\" ContentType=\"{CT_PML}.slideLayout+xml\"/>\
         <Override PartName=\"/ppt/theme/theme1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.theme+xml\"/>\
         {slide_overrides}</Types>"
    )
}

fn presentation_xml(slides: usize) -> String {
    let ids: String = (0..slides)
        .map(|i| format!("<p:sldId id=\"{}\" r:id=\"rId{}\"/>", 256 + i, i + 3))
        .collect();
    format!(
        "{XML_DECLARATION}<p:presentation {NS}>\
         <p:sldMasterIdLst><p:sldMasterId id=\"2147483648\" r:id=\"rId1\"/></p:sldMasterIdLst>\
         <p:sldIdLst>{ids}</p:sldIdLst>\
         <p:sldSz cx=\"{SLIDE_CX}\" cy=\"{SLIDE_CY}\" type=\"screen4x3\"/>\
         <p:notesSz cx=\"{SLIDE_CY}\" cy=\"{SLIDE_CX}\"/>\
         </p:presentation>"
    )
}

fn presentation_rels(slides: usize) -> String {
    let slide_targets: Vec<String> = (1..=slides).map(|n| format!("slides/slide{n}.xml")).collect();
    let slide_ids: Vec<String> = (0..slides).map(|i| format!("rId{}", i + 3)).collect();
    let mut rels = vec![
        ("rId1", "slideMaster", "slideMasters/slideMaster1.xml"),
        ("rId2", "theme", "theme/theme1.xml"),
    ];
    rels.extend(
        slide_ids
            .iter()
            .zip(&slide_targets)
            .map(|(id, target)| (id.as_str(), "slide", target.as_str())),
    );
    relationships(&rels)
}

const EMPTY_TREE: &str = "<p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>\
     <p:grpSpPr><a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"0\" cy=\"0\"/><a:chOff x=\"0\" y=\"0\"/><a:chExt cx=\"0\" cy=\"0\"/></a:xfrm></p:grpSpPr>";

fn master_xml() -> String {
    format!(
        "{XML_DECLARATION}<p:sldMaster {NS}>\
         <p:cSld><p:spTree>{EMPTY_TREE}</p:spTree></p:cSld>\
         <p:clrMap bg1=\"lt1\" tx1=\"dk1\" bg2=\"lt2\" tx2=\"dk2\" accent1=\"accent1\" accent2=\"accent2\" \
         accent3=\"accent3\" accent4=\"accent4\" accent5=\"accent5\" accent6=\"accent6\" hlink=\"hlink\" folHlink=\"folHlink\"/>\
         <p:sldLayoutIdLst><p:sldLayoutId id=\"2147483649\" r:id=\"rId1\"/><p:sldLayoutId id=\"2147483650\" r:id=\"rId2\"/></p:sldLayoutIdLst>\
         </p:sldMaster>"
    )
}

fn layout_xml(kind: &str, name: &str) -> String {
    format!(
        "{XML_DECLARATION}<p:sldLayout {NS} type=\"{kind}\" preserve=\"1\">\
         <p:cSld name=\"{name}\"><p:spTree>{EMPTY_TREE}</p:spTree></p:cSld>\
         <p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"
    )
}

fn text_shape(id: u32, name: &str, (x, y, cx, cy): (u64, u64, u64, u64), paragraphs: &str) -> String {
    format!(
        "<p:sp><p:nvSpPr><p:cNvPr id=\"{id}\" name=\"{name}\"/><p:cNvSpPr txBox=\"1\"/><p:nvPr/></p:nvSpPr>\
         <p:spPr><a:xfrm><a:off x=\"{x}\" y=\"{y}\"/><a:ext cx=\"{cx}\" cy=\"{cy}\"/></a:xfrm>\
         <a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr>\
         <p:txBody><a:bodyPr wrap=\"square\"><a:normAutofit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"
    )
}

fn text_paragraph(text: &str, size: u32, bold: bool, align: &str) -> String {
    let b = if bold { " b=\"1\"" } else { "" };
    format!(
        "<a:p><a:pPr algn=\"{align}\"/><a:r><a:rPr lang=\"en-US\" sz=\"{size}\"{b} dirty=\"0\"/><a:t>{}</a:t></a:r></a:p>",
        escape(text)
    )
}

fn bullet_paragraph(text: &str) -> String {
    format!(
        "<a:p><a:pPr marL=\"342900\" indent=\"-342900\"><a:buFont typeface=\"Arial\"/><a:buChar char=\"•\"/></a:pPr>\
         <a:r><a:rPr lang=\"en-US\" sz=\"2400\" dirty=\"0\"/><a:t>{}</a:t></a:r></a:p>",
        escape(text)
    )
}

fn slide_xml(slide: &Slide) -> String {
    let width = SLIDE_CX - 2 * MARGIN_X;
    let shapes = match slide {
        Slide::Title { title, subtitle } => {
            text_shape(2, "Title 1", (685_800, 2_130_425, 7_772_400, 1_470_025), &text_paragraph(title, 4400, true, "ctr"))
                + &text_shape(3, "Subtitle 2", (1_371_600, 3_886_200, 6_400_800, 1_752_600), &text_paragraph(subtitle, 2800, false, "ctr"))
        }
        Slide::Bullets { title, bullets } => {
            let body: String = if bullets.is_empty() {
                "<a:p><a:endParaRPr lang=\"en-US\"/></a:p>".to_string()
            } else {
                bullets.iter().map(|b| bullet_paragraph(b)).collect()
            };
            text_shape(2, "Title 1", (MARGIN_X, 274_638, width, 1_143_000), &text_paragraph(title, 3600, true, "l"))
                + &text_shape(3, "Content 2", (MARGIN_X, 1_600_200, width, 4_525_963), &body)
        }
    };
    format!(
        "{XML_DECLARATION}<p:sld {NS}><p:cSld><p:spTree>{EMPTY_TREE}{shapes}</p:spTree></p:cSld>\
         <p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"
    )
}

const THEME: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme"><a:themeElements><a:clrScheme name="Office"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="1F497D"/></a:dk2><a:lt2><a:srgbClr val="EEECE1"/></a:lt2><a:accent1><a:srgbClr val="4F81BD"/></a:accent1><a:accent2><a:srgbClr val="C0504D"/></a:accent2><a:accent3><a:srgbClr val="9BBB59"/></a:accent3><a:accent4><a:srgbClr val="8064A2"/></a:accent4><a:accent5><a:srgbClr val="4BACC6"/></a:accent5><a:accent6><a:srgbClr val="F79646"/></a:accent6><a:hlink><a:srgbClr val="0000FF"/></a:hlink><a:folHlink><a:srgbClr val="800080"/></a:folHlink></a:clrScheme><a:fontScheme name="Office"><a:majorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst><a:lnStyleLst><a:ln w="9525"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="25400"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="38100"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst></a:fmtScheme></a:themeElements><a:objectDefaults/><a:extraClrSchemeLst/></a:theme>"#;
