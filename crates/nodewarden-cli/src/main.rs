//! nodewarden CLI
//!
//! Synchronizes the worker-node inventory with a Kubernetes cluster and runs
//! node lifecycle operations.

use clap::Parser;

use nodewarden_cli::Cli;
use nodewarden_common::telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_telemetry(&TelemetryConfig {
        json: cli.global.log_json,
        ..Default::default()
    })?;

    cli.run().await?;
    Ok(())
}
