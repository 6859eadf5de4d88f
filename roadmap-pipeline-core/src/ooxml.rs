//! Minimal Office Open XML package writer shared by the report and deck renderers.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const XML_DECLARATION: &str =
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("output path {0} has no parent directory")]
    NoParent(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Escape text for use in element content or attribute values.
pub fn escape(text: &str) -> String {
    quick_xml::escape::escape(text).into_owned()
}

/// A named part inside the package, e.g. `word/document.xml`.
#[derive(Debug, Clone)]
pub struct Part {
    pub name: String,
    pub content: String,
}

impl Part {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Write `parts` as a zip package at `dest`.
///
/// The archive is built in a temp file next to `dest` and moved into place once complete,
/// so a partially written package never appears under the final name.
pub fn write_package(dest: &Path, parts: &[Part]) -> Result<(), RenderError> {
    let dir = dest
        .parent()
        .ok_or_else(|| RenderError::NoParent(dest.to_path_buf()))?;
    let mut tmp = NamedTempFile::new_in(dir)?;

    {
        let mut zip = ZipWriter::new(tmp.as_file_mut());
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for part in parts {
            zip.start_file(part.name.as_str(), options)?;
            zip.write_all(part.content.as_bytes())?;
        }
        zip.finish()?;
    }

    tmp.persist(dest).map_err(|e| RenderError::Io(e.error))?;
    debug!(path = %dest.display(), parts = parts.len(), "Wrote OOXML package");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(escape("R&D <core> \"x\""), "R&amp;D &lt;core&gt; &quot;x&quot;");
    }

    #[test]
    fn writes_readable_archive() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.docx");
        write_package(
            &dest,
            &[
                Part::new("[Content_Types].xml", "<Types/>"),
                Part::new("word/document.xml", "<doc/>"),
            ],
        )
        .unwrap();

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&dest).unwrap()).unwrap();
        let mut body = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "<doc/>");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
