//! Downstream relay: a single POST of the run manifest, with no response validation beyond transport errors.

use serde::Serialize;
use tracing::{debug, info};

use crate::contract::InputFile;

pub const COMPLETE_STATUS: &str = "complete";

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("relay request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Body sent to the downstream stage once a run completes.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestPayload<'a> {
    pub session_id: &'a str,
    pub email: &'a str,
    pub gpt_module: &'a str,
    pub files: &'a [InputFile],
    pub status: &'a str,
}

/// POST the manifest and return the HTTP status the downstream stage answered with.
pub async fn relay_manifest(
    client: &reqwest::Client,
    url: &str,
    payload: &ManifestPayload<'_>,
) -> Result<u16, RelayError> {
    debug!(
        payload = %serde_json::to_string(payload).unwrap_or_default(),
        "[RELAY] Manifest payload"
    );
    let response = client.post(url).json(payload).send().await?;
    let status = response.status().as_u16();
    info!(
        url,
        status,
        files = payload.files.len(),
        session_id = payload.session_id,
        "[RELAY] Manifest relayed downstream"
    );
    Ok(status)
}
