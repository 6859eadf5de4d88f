//! High-level pipeline: orchestrates acquisition → extraction → rendering → publication → relay.
//!
//! A run is strictly sequential and not resumable. Per-item problems (a file that cannot be
//! fetched, a workbook that cannot be read, an upload that fails) are recorded in the step
//! reports and the run continues. Any other failure ends the run: [`Pipeline::execute`]
//! returns it, and [`Pipeline::run`] logs it without propagating, because the caller has
//! already been acknowledged.
//!
//! # Navigation
//! - Main entrypoints: [`Pipeline::execute`], [`Pipeline::run`], [`spawn_run`]
//! - Supporting types: [`RunRequest`], [`RunReport`]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Instrument};

use crate::config::PipelineConfig;
use crate::contract::{FolderHandle, InputFile, PublicationReport, RemoteStore, SkippedFile};
use crate::deck::{render_deck, DECK_FILE_TYPE};
use crate::download::HttpDownloader;
use crate::extract::extract;
use crate::ooxml::RenderError;
use crate::relay::{relay_manifest, ManifestPayload, RelayError, COMPLETE_STATUS};
use crate::report::{render_report, REPORT_FILE_TYPE};
use crate::workspace::{SessionWorkspace, WorkspaceError};

/// Everything one run needs from the triggering request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub session_id: String,
    pub email: String,
    pub files: Vec<InputFile>,
}

/// What a completed run did, for logs and tests.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub session_id: String,
    pub workspace: PathBuf,
    pub skipped_downloads: Vec<SkippedFile>,
    pub skipped_workbooks: Vec<SkippedFile>,
    pub device_count: usize,
    pub report_path: PathBuf,
    pub deck_path: PathBuf,
    pub manifest: Vec<InputFile>,
    pub failed_uploads: Vec<String>,
    pub relay_status: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error("rendering failed: {0}")]
    Render(#[from] RenderError),
    #[error(transparent)]
    Relay(#[from] RelayError),
}

pub struct Pipeline {
    config: PipelineConfig,
    client: reqwest::Client,
    store: Arc<dyn RemoteStore>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, store: Arc<dyn RemoteStore>) -> Self {
        Self::with_client(config, reqwest::Client::new(), store)
    }

    pub fn with_client(
        config: PipelineConfig,
        client: reqwest::Client,
        store: Arc<dyn RemoteStore>,
    ) -> Self {
        Self {
            config,
            client,
            store,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn workspace_for(&self, session_id: &str) -> SessionWorkspace {
        SessionWorkspace::new(&self.config.base_dir, session_id)
    }

    /// Run the pipeline and swallow any failure after logging it.
    pub async fn run(&self, request: RunRequest) {
        let session_id = request.session_id.clone();
        match self.execute(request).await {
            Ok(report) => info!(
                session_id = %session_id,
                devices = report.device_count,
                manifest = report.manifest.len(),
                failed_uploads = report.failed_uploads.len(),
                relay_status = report.relay_status,
                "[RUN] Roadmap run complete"
            ),
            Err(e) => error!(session_id = %session_id, error = ?e, "[RUN][ERROR] Roadmap run failed"),
        }
    }

    /// Run every step in order and report what happened.
    pub async fn execute(&self, request: RunRequest) -> Result<RunReport, PipelineError> {
        let RunRequest {
            session_id,
            email,
            files,
        } = request;
        info!(session_id = %session_id, files = files.len(), "[RUN] Starting roadmap run");

        let workspace = self.workspace_for(&session_id);
        workspace.ensure()?;

        let downloader = HttpDownloader::new(self.client.clone(), self.config.fetch_timeout());
        let acquisition = downloader.acquire(files, &workspace).await;

        let extraction = extract(&acquisition.acquired);

        let report_path = render_report(&workspace, &extraction.devices)?;
        let deck_path = render_deck(&workspace, &extraction.devices)?;

        let publication = self
            .publish(&session_id, &report_path, &deck_path, acquisition.acquired)
            .await;

        let payload = ManifestPayload {
            session_id: &session_id,
            email: &email,
            gpt_module: &self.config.gpt_module,
            files: &publication.entries,
            status: COMPLETE_STATUS,
        };
        let relay_status =
            relay_manifest(&self.client, &self.config.downstream_url, &payload).await?;

        Ok(RunReport {
            workspace: workspace.root().to_path_buf(),
            skipped_downloads: acquisition.skipped,
            skipped_workbooks: extraction.skipped,
            device_count: extraction.devices.len(),
            report_path,
            deck_path,
            manifest: publication.entries,
            failed_uploads: publication.failed,
            relay_status,
            session_id,
        })
    }

    /// Upload the report, the deck and every acquired input, in that order, and assemble the manifest.
    ///
    /// Every entry is attempted; a failed upload (or a folder that could not be ensured)
    /// leaves that entry's URL empty instead of dropping it.
    pub async fn publish(
        &self,
        session_id: &str,
        report_path: &Path,
        deck_path: &Path,
        acquired: Vec<InputFile>,
    ) -> PublicationReport {
        let folder = match self.store.ensure_folder(session_id).await {
            Ok(folder) => Some(folder),
            Err(e) => {
                error!(session_id, error = ?e, "[PUBLISH] Could not ensure remote folder; entries will carry no URL");
                None
            }
        };

        let mut report = PublicationReport::default();
        let report_url = self.upload(folder.as_ref(), report_path).await;
        let deck_url = self.upload(folder.as_ref(), deck_path).await;

        for mut file in acquired {
            let url = match &file.local_path {
                Some(path) => self.upload(folder.as_ref(), path).await,
                None => None,
            };
            file.file_url = url;
            report.entries.push(file);
        }
        report
            .entries
            .push(artifact_entry(report_path, REPORT_FILE_TYPE, report_url));
        report
            .entries
            .push(artifact_entry(deck_path, DECK_FILE_TYPE, deck_url));

        report.failed = report
            .entries
            .iter()
            .filter(|e| e.file_url.is_none())
            .map(|e| e.file_name.clone())
            .collect();
        if !report.failed.is_empty() {
            warn!(session_id, failed = ?report.failed, "[PUBLISH] Some uploads produced no URL");
        }
        info!(
            session_id,
            entries = report.entries.len(),
            failed = report.failed.len(),
            "[PUBLISH] Publication finished"
        );
        report
    }

    async fn upload(&self, folder: Option<&FolderHandle>, path: &Path) -> Option<String> {
        self.store.upload(path, folder?).await
    }
}

fn artifact_entry(path: &Path, file_type: &str, url: Option<String>) -> InputFile {
    InputFile {
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        file_type: file_type.to_string(),
        file_url: url,
        local_path: None,
    }
}

/// Start a run on its own task; the caller does not wait for it.
pub fn spawn_run(pipeline: Arc<Pipeline>, request: RunRequest) -> JoinHandle<()> {
    let span = tracing::info_span!("roadmap_run", session_id = %request.session_id);
    tokio::spawn(async move { pipeline.run(request).await }.instrument(span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{MockRemoteStore, StoreError};

    fn pipeline_with(store: MockRemoteStore, base: &Path) -> Pipeline {
        let config = PipelineConfig {
            base_dir: base.to_path_buf(),
            downstream_url: "http://127.0.0.1:9/unused".into(),
            ..Default::default()
        };
        Pipeline::new(config, Arc::new(store))
    }

    fn acquired(name: &str, dir: &Path) -> InputFile {
        let path = dir.join(name);
        std::fs::write(&path, name).unwrap();
        InputFile {
            file_name: name.into(),
            file_type: "other".into(),
            file_url: Some(format!("https://source/{name}")),
            local_path: Some(path),
        }
    }

    #[tokio::test]
    async fn failed_upload_nulls_only_that_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MockRemoteStore::new();
        store.expect_ensure_folder().times(1).returning(|s| {
            Ok(FolderHandle {
                id: "folder".into(),
                name: s.to_string(),
            })
        });
        store.expect_upload().returning(|path, _| {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            if name == "b.xlsx" {
                None
            } else {
                Some(format!("https://drive/{name}"))
            }
        });

        let pipeline = pipeline_with(store, dir.path());
        let files = vec![
            acquired("a.xlsx", dir.path()),
            acquired("b.xlsx", dir.path()),
            acquired("c.xlsx", dir.path()),
        ];
        let report = pipeline
            .publish("s", &dir.path().join("r.docx"), &dir.path().join("d.pptx"), files)
            .await;

        assert_eq!(report.entries.len(), 5);
        assert_eq!(report.failed, vec!["b.xlsx".to_string()]);
        assert_eq!(report.entries[1].file_url, None);
        assert_eq!(report.entries[0].file_url.as_deref(), Some("https://drive/a.xlsx"));
        assert_eq!(report.entries[3].file_type, "docx_roadmap");
        assert_eq!(report.entries[3].file_url.as_deref(), Some("https://drive/r.docx"));
        assert_eq!(report.entries[4].file_type, "pptx_roadmap");
        assert!(report.entries[3].local_path.is_none());
    }

    #[tokio::test]
    async fn folder_failure_keeps_every_entry_without_url() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MockRemoteStore::new();
        store
            .expect_ensure_folder()
            .returning(|_| Err(StoreError::Unavailable("no credentials".into())));
        store.expect_upload().never();

        let pipeline = pipeline_with(store, dir.path());
        let report = pipeline
            .publish(
                "s",
                &dir.path().join("r.docx"),
                &dir.path().join("d.pptx"),
                vec![acquired("a.xlsx", dir.path())],
            )
            .await;

        assert_eq!(report.entries.len(), 3);
        assert!(report.entries.iter().all(|e| e.file_url.is_none()));
        assert_eq!(report.failed.len(), 3);
    }

    #[tokio::test]
    async fn uploads_report_and_deck_before_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = order.clone();

        let mut store = MockRemoteStore::new();
        store.expect_ensure_folder().returning(|s| {
            Ok(FolderHandle {
                id: "f".into(),
                name: s.to_string(),
            })
        });
        store.expect_upload().returning(move |path, _| {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            seen.lock().unwrap().push(name.clone());
            Some(name)
        });

        let pipeline = pipeline_with(store, dir.path());
        pipeline
            .publish(
                "s",
                &dir.path().join("r.docx"),
                &dir.path().join("d.pptx"),
                vec![acquired("a.xlsx", dir.path())],
            )
            .await;

        assert_eq!(*order.lock().unwrap(), vec!["r.docx", "d.pptx", "a.xlsx"]);
    }
}
