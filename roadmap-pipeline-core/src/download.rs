//! File acquisition: fetch every referenced input into the session workspace.
//!
//! A file without a source URL, or whose fetch fails, is left out of the acquired list and
//! recorded in [`AcquisitionReport::skipped`]; the rest of the batch proceeds. There are no retries.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::contract::{AcquisitionReport, InputFile, SkippedFile};
use crate::workspace::{sanitize_file_name, SessionWorkspace};

#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("missing source URL")]
    MissingUrl,
    #[error("file name {0:?} has no usable component")]
    InvalidName(String),
    #[error("fetch failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Downloads input files over HTTP with a bounded per-file timeout.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpDownloader {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Fetch each file to `workspace/<file_name>` in input order.
    pub async fn acquire(
        &self,
        files: Vec<InputFile>,
        workspace: &SessionWorkspace,
    ) -> AcquisitionReport {
        let mut report = AcquisitionReport::default();

        for mut file in files {
            match self.acquire_one(&file, workspace).await {
                Ok((path, bytes)) => {
                    info!(
                        file = %file.file_name,
                        path = %path.display(),
                        bytes,
                        "[ACQUIRE] Downloaded input file"
                    );
                    file.local_path = Some(path);
                    report.acquired.push(file);
                }
                Err(AcquireError::MissingUrl) => {
                    warn!(file = %file.file_name, "[ACQUIRE] Skipping file with missing URL");
                    report
                        .skipped
                        .push(SkippedFile::new(&file.file_name, AcquireError::MissingUrl.to_string()));
                }
                Err(e) => {
                    error!(file = %file.file_name, error = ?e, "[ACQUIRE] Download failed");
                    report.skipped.push(SkippedFile::new(&file.file_name, e.to_string()));
                }
            }
        }

        info!(
            acquired = report.acquired.len(),
            skipped = report.skipped.len(),
            "[ACQUIRE] Acquisition finished"
        );
        report
    }

    async fn acquire_one(
        &self,
        file: &InputFile,
        workspace: &SessionWorkspace,
    ) -> Result<(PathBuf, usize), AcquireError> {
        let url = file.source_url().ok_or(AcquireError::MissingUrl)?;
        let name = sanitize_file_name(&file.file_name)
            .ok_or_else(|| AcquireError::InvalidName(file.file_name.clone()))?;
        let path = workspace.path_for(&name);

        let bytes = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        write_file(&path, &bytes).await?;
        Ok((path, bytes.len()))
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), AcquireError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| AcquireError::Write {
            path: path.to_path_buf(),
            source,
        })
}
