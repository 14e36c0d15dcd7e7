//! Internal CLI/test harness for the acquisition runtime.
//!
//! This binary is the headless entry point: it brings up a [`Runtime`],
//! applies a configuration (inline defaults or a JSON file), runs one
//! acquisition to completion, and reports the resulting metadata. It is not
//! a production daemon — it exists to drive the runtime end to end the way
//! an integration test would, with human-readable output.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use rust_daq::{DeviceIdentifier, DeviceKind, Runtime, RuntimeProperties, VideoStreamProperties};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rust_daq", about = "Multi-stream video acquisition runtime")]
struct Cli {
    /// Path to a JSON file holding a `RuntimeProperties` configuration.
    /// When omitted, a single stream using the built-in simulated camera
    /// and a trash sink is configured.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Wall-clock seconds to wait for acquisition to finish before aborting.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rust_daq::init_logging();
    let cli = Cli::parse();

    let mut properties = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)?
        }
        None => default_properties(),
    };

    let mut runtime = Runtime::init()?;
    runtime.configure(&mut properties).await?;

    let metadata = runtime.get_configuration_metadata();
    for (stream_id, stream) in metadata.streams.iter().enumerate() {
        info!(stream_id, camera = %stream.camera.name, storage = %stream.storage.name, "stream configured");
    }

    runtime.start().await?;

    let stop = tokio::time::timeout(Duration::from_secs(cli.timeout_secs), runtime.stop()).await;
    match stop {
        Ok(result) => result?,
        Err(_) => {
            info!(timeout_secs = cli.timeout_secs, "acquisition exceeded timeout, aborting");
            runtime.abort().await?;
        }
    }

    runtime.shutdown().await?;
    Ok(())
}

fn default_properties() -> RuntimeProperties {
    let mut properties = RuntimeProperties::with_capacity(1);
    properties.streams[0] = VideoStreamProperties {
        camera_id: DeviceIdentifier::new(DeviceKind::Camera, "simulated: uniform random"),
        storage_id: DeviceIdentifier::new(DeviceKind::Storage, "trash"),
        max_frame_count: 100,
        ..Default::default()
    };
    properties
}
