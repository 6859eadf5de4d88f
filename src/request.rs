//! The inbound trigger payload and its presence checks.

use roadmap_pipeline_core::contract::InputFile;
use roadmap_pipeline_core::pipeline::RunRequest;
use serde::{Deserialize, Serialize};

/// Request body accepted by the front door and by `run --request`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub files: Vec<InputFile>,
    #[serde(default)]
    pub gpt_module: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl StartRequest {
    /// A run request when `session_id`, `email` and at least one file are present.
    pub fn into_run_request(self) -> Option<RunRequest> {
        let session_id = present(self.session_id)?;
        let email = present(self.email)?;
        if self.files.is_empty() {
            return None;
        }
        Some(RunRequest {
            session_id,
            email,
            files: self.files,
        })
    }
}
