use anyhow::Result;
use clap::{Parser, Subcommand};
use roadmap_pipeline_core::pipeline::Pipeline;
use std::path::PathBuf;
use std::sync::Arc;

use crate::load_config::{build_store, load_config, ServiceConfig};
use crate::request::StartRequest;
use crate::server::serve;

/// CLI for roadmap-pipeline: turn inventory spreadsheets into a published roadmap.
#[derive(Parser)]
#[clap(
    name = "roadmap-pipeline",
    version,
    about = "Generate a transformation roadmap report and timeline deck from device inventories"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the HTTP front door that accepts roadmap requests
    Serve {
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Port to listen on, overriding config and PORT
        #[clap(long)]
        port: Option<u16>,
    },
    /// Run the pipeline once, in the foreground, for a request JSON file
    Run {
        /// Path to a JSON file shaped like the /start_roadmap body
        #[clap(long)]
        request: PathBuf,
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

fn build_pipeline(config: &ServiceConfig) -> Arc<Pipeline> {
    let client = reqwest::Client::new();
    let store = build_store(&config.store, client.clone());
    Arc::new(Pipeline::with_client(
        config.pipeline_config(),
        client,
        store,
    ))
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emitted first so every invocation is traceable, even ones that fail on config.
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Serve { config, port } => {
            let config = load_config(config)?;
            let port = port.unwrap_or(config.server.port);
            config.pipeline_config().trace_loaded();
            serve(build_pipeline(&config), port).await
        }
        Commands::Run { request, config } => {
            let raw = std::fs::read_to_string(&request).map_err(|e| {
                anyhow::anyhow!("Failed to read request file {:?}: {}", request, e)
            })?;
            let start: StartRequest = serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("Invalid request JSON: {e}"))?;
            let run_request = start
                .into_run_request()
                .ok_or_else(|| anyhow::anyhow!("Missing required fields"))?;

            let config = load_config(config)?;
            let pipeline = build_pipeline(&config);
            println!("Roadmap run starting...");
            match pipeline.execute(run_request).await {
                Ok(report) => {
                    println!("Roadmap run complete.\nReport:");
                    println!("{:#?}", report);
                    Ok(())
                }
                Err(e) => {
                    eprintln!("[ERROR] Roadmap run failed: {}", e);
                    Err(anyhow::Error::new(e))
                }
            }
        }
    }
}
