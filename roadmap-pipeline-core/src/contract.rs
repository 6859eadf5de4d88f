//! # contract: data model and seams shared by every pipeline step
//!
//! This module holds the plain data types that flow through a run
//! ([`InputFile`], [`DeviceRecord`], [`FolderHandle`]), the per-step reports that carry
//! skipped items alongside successful results, and the [`RemoteStore`] trait used for
//! publication.
//!
//! ## Mocking & Testing
//! - [`RemoteStore`] is annotated for `mockall`, so tests can script folder creation and
//!   per-file upload outcomes without any network access.
//!
//! ## Adding New Store Destinations
//! - Implement [`RemoteStore`] for the destination.
//! - `ensure_folder` surfaces failures as [`StoreError`]; `upload` must never fail past its
//!   boundary and reports any problem as `None` after logging it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// One file referenced by the triggering request.
///
/// `local_path` is set by acquisition; `file_url` is rewritten by publication (and becomes
/// `None` when the upload failed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    pub file_name: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
}

impl InputFile {
    pub fn new(file_name: &str, file_type: &str, file_url: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            file_type: file_type.to_string(),
            file_url: Some(file_url.to_string()),
            local_path: None,
        }
    }

    /// The source URL, if present and non-blank.
    pub fn source_url(&self) -> Option<&str> {
        self.file_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// One data row of a recognized inventory spreadsheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,
    pub platform: String,
    pub tier: String,
    pub status: String,
    pub recommendation: String,
}

impl DeviceRecord {
    /// The recommendation, or `None` when the cell was empty.
    pub fn recommendation(&self) -> Option<&str> {
        if self.recommendation.is_empty() {
            None
        } else {
            Some(&self.recommendation)
        }
    }
}

/// A remote folder that uploads are placed into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderHandle {
    pub id: String,
    pub name: String,
}

/// An item a step could not handle, with the reason it was left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub file_name: String,
    pub reason: String,
}

impl SkippedFile {
    pub fn new(file_name: &str, reason: impl Into<String>) -> Self {
        Self {
            file_name: file_name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Output of file acquisition: the successfully fetched files, in input order, and what was dropped.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionReport {
    pub acquired: Vec<InputFile>,
    pub skipped: Vec<SkippedFile>,
}

/// Output of record extraction: all device rows, in file then row order, and unreadable workbooks.
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub devices: Vec<DeviceRecord>,
    pub skipped: Vec<SkippedFile>,
}

/// Output of publication: every entry after its upload attempt, and the names that came back without a URL.
#[derive(Debug, Clone, Default)]
pub struct PublicationReport {
    pub entries: Vec<InputFile>,
    pub failed: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("remote store is not configured: {0}")]
    Unavailable(String),
    #[error("invalid store credentials: {0}")]
    Credentials(String),
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store returned an unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Folder-oriented object storage keyed by session identifier.
///
/// The trait is implemented by the Drive client, by the disabled store installed when
/// credentials are missing, and by test mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Look up the folder named exactly `session_id`, creating it when absent.
    ///
    /// Lookup-then-create is not atomic: concurrent callers may create duplicate folders.
    async fn ensure_folder(&self, session_id: &str) -> Result<FolderHandle, StoreError>;

    /// Upload a local file into `folder` and return a viewable URL, or `None` on any failure.
    async fn upload(&self, local_path: &Path, folder: &FolderHandle) -> Option<String>;
}
