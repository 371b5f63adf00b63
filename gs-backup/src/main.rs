use anyhow::Result;
use clap::Parser;
use gs_backup::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    tracing::info!("gs-backup startup: tracing initialised, environment loaded");

    let cli = Cli::parse();
    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("gs-backup completed successfully"),
        Err(e) => tracing::error!(severity = "fatal", error = %e, "gs-backup exited with error"),
    }
    result
}
