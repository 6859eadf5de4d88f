use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_BASE_DIR: &str = "temp_sessions";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_DOWNSTREAM_URL: &str = "https://it-financials-api.onrender.com/start_it_financials";
pub const DEFAULT_GPT_MODULE: &str = "roadmap";

/// Settings the pipeline needs for one run; shared read-only by concurrent runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory under which every session workspace is created.
    pub base_dir: PathBuf,
    /// Per-file timeout for source downloads.
    pub fetch_timeout_secs: u64,
    /// Endpoint receiving the manifest once a run completes.
    pub downstream_url: String,
    /// Module tag sent with the manifest.
    pub gpt_module: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            downstream_url: DEFAULT_DOWNSTREAM_URL.to_string(),
            gpt_module: DEFAULT_GPT_MODULE.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn trace_loaded(&self) {
        info!(
            base_dir = %self.base_dir.display(),
            fetch_timeout_secs = self.fetch_timeout_secs,
            downstream_url = %self.downstream_url,
            "Loaded PipelineConfig"
        );
        debug!(?self, "PipelineConfig loaded (full debug)");
    }
}
