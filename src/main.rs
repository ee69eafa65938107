mod cli;
mod dhis2;
mod entities;
mod jobs;
mod model;
mod output_dir;
mod params;
mod postprocess;
mod table;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dhis2_extract=info")),
        )
        .init();

    let args = cli::Cli::parse();
    let is_json = args.json;

    match cli::run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if is_json {
                // Keep stdout machine-readable for callers parsing the manifest
                println!("{}", serde_json::json!({ "error": format!("{e:#}") }));
                std::process::exit(1);
            } else {
                Err(e)
            }
        }
    }
}
