//! HTTP front door: validates the trigger request, acknowledges it and starts the pipeline detached.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use roadmap_pipeline_core::pipeline::{spawn_run, Pipeline};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::request::StartRequest;

pub const HEALTH_MESSAGE: &str = "Roadmap pipeline is live";

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/start_roadmap", post(start_roadmap))
        .with_state(pipeline)
}

async fn health() -> &'static str {
    HEALTH_MESSAGE
}

async fn start_roadmap(
    State(pipeline): State<Arc<Pipeline>>,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            error!(error = %rejection, "Rejected malformed roadmap request");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": rejection.body_text() })),
            );
        }
    };
    info!(
        session_id = ?request.session_id,
        files = request.files.len(),
        gpt_module = ?request.gpt_module,
        status = ?request.status,
        "Incoming roadmap request"
    );

    let Some(run) = request.into_run_request() else {
        error!("Missing required fields in payload");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing required fields" })),
        );
    };

    let workspace = pipeline.workspace_for(&run.session_id);
    if let Err(e) = workspace.ensure() {
        error!(error = ?e, "Failed to prepare session workspace");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        );
    }

    let session_id = run.session_id.clone();
    spawn_run(pipeline, run);
    info!(session_id = %session_id, "Roadmap run started");

    (
        StatusCode::OK,
        Json(json!({ "message": "Roadmap generation started" })),
    )
}

/// Serve the front door on `0.0.0.0:<port>` until ctrl-c.
pub async fn serve(pipeline: Arc<Pipeline>, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "Roadmap API listening");
    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = ?e, "Failed to listen for shutdown signal");
            }
        })
        .await?;
    Ok(())
}
