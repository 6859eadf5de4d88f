/// `load_config` module: loads the static YAML service configuration and injects environment secrets.
///
/// # Responsibilities
/// - Parse the optional YAML file into typed sections, with defaults for anything omitted
/// - Apply environment overrides (`PORT`)
/// - Build the remote store from `GOOGLE_SERVICE_ACCOUNT_JSON`, falling back to a disabled
///   store that records why publication is unavailable
///
/// # Errors
/// Read and parse failures are reported as `anyhow::Error` and surface at the CLI boundary.
/// Missing or invalid credentials are not an error: runs still complete with empty URLs.
use anyhow::Result;
use roadmap_pipeline_core::config::{
    PipelineConfig, DEFAULT_BASE_DIR, DEFAULT_DOWNSTREAM_URL, DEFAULT_FETCH_TIMEOUT_SECS,
    DEFAULT_GPT_MODULE,
};
use roadmap_pipeline_core::contract::RemoteStore;
use roadmap_pipeline_core::store::{DisabledStore, DriveEndpoints, DriveStore};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const SERVICE_ACCOUNT_ENV: &str = "GOOGLE_SERVICE_ACCOUNT_JSON";
pub const PORT_ENV: &str = "PORT";
pub const DEFAULT_PORT: u16 = 14000;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub workspace: WorkspaceSection,
    pub acquisition: AcquisitionSection,
    pub relay: RelaySection,
    pub store: StoreSection,
    pub server: ServerSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WorkspaceSection {
    pub base_dir: PathBuf,
}

impl Default for WorkspaceSection {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AcquisitionSection {
    pub timeout_secs: u64,
}

impl Default for AcquisitionSection {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RelaySection {
    pub downstream_url: String,
    pub gpt_module: String,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            downstream_url: DEFAULT_DOWNSTREAM_URL.to_string(),
            gpt_module: DEFAULT_GPT_MODULE.to_string(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    GoogleDrive,
    Disabled,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub kind: StoreKind,
    pub api_base: Option<String>,
    pub upload_base: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

impl ServiceConfig {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            base_dir: self.workspace.base_dir.clone(),
            fetch_timeout_secs: self.acquisition.timeout_secs,
            downstream_url: self.relay.downstream_url.clone(),
            gpt_module: self.relay.gpt_module.clone(),
        }
    }
}

/// Loads the YAML config at `path` (or defaults when `None`) and applies environment overrides.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<ServiceConfig> {
    let mut config = match path {
        Some(path) => read_config_file(path.as_ref())?,
        None => {
            info!("No config file given, using defaults");
            ServiceConfig::default()
        }
    };

    if let Ok(raw) = std::env::var(PORT_ENV) {
        match raw.parse::<u16>() {
            Ok(port) => {
                info!(port, "PORT found in env, overriding server.port");
                config.server.port = port;
            }
            Err(e) => {
                error!(error = ?e, raw = %raw, "PORT must be a valid port number");
                return Err(anyhow::anyhow!("PORT must be a valid port number: {e}"));
            }
        }
    }

    info!(
        base_dir = %config.workspace.base_dir.display(),
        downstream_url = %config.relay.downstream_url,
        store = ?config.store.kind,
        port = config.server.port,
        "Config loaded and merged successfully"
    );
    Ok(config)
}

fn read_config_file(path_ref: &Path) -> Result<ServiceConfig> {
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    match serde_yaml::from_str::<Option<ServiceConfig>>(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf.unwrap_or_default())
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Builds the remote store for `section`, reading credentials from the environment.
pub fn build_store(section: &StoreSection, client: reqwest::Client) -> Arc<dyn RemoteStore> {
    if section.kind == StoreKind::Disabled {
        info!("Remote store disabled by configuration");
        return Arc::new(DisabledStore::new("disabled by configuration"));
    }

    let key_json = match std::env::var(SERVICE_ACCOUNT_ENV) {
        Ok(json) if !json.trim().is_empty() => json,
        _ => {
            warn!("{SERVICE_ACCOUNT_ENV} not set; uploads will produce no URLs");
            return Arc::new(DisabledStore::new(format!("{SERVICE_ACCOUNT_ENV} not set")));
        }
    };

    let defaults = DriveEndpoints::default();
    let endpoints = DriveEndpoints {
        api_base: section.api_base.clone().unwrap_or(defaults.api_base),
        upload_base: section.upload_base.clone().unwrap_or(defaults.upload_base),
    };
    match DriveStore::from_service_account_json(client, &key_json, endpoints) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(error = ?e, "Google Drive setup failed; uploads will produce no URLs");
            Arc::new(DisabledStore::new(e.to_string()))
        }
    }
}
