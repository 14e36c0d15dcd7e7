//! The multi-stream video acquisition runtime for scientific microscopy.
//!
//! This crate assembles the device kit, frame ring, pipeline, and
//! controller crates into the single [`Runtime`] a host application drives.
//! It re-exports the public API so callers depend on one crate rather than
//! the workspace members directly.

pub use daq_core::{
    CameraProperties, DeviceIdentifier, DeviceKind, DeviceState, ImageShape, PropertyMetadata,
    RuntimeError, RuntimeProperties, RuntimeResult, SampleType, StorageProperties,
    StreamMetadata, VideoStreamProperties,
};
pub use daq_plugin_api::{Camera, DeviceManager, Storage};
pub use daq_runtime::{Runtime, RuntimeSettings};

/// Install the process-wide `tracing` subscriber, driven by `RUST_LOG`.
///
/// Idempotent: a second call is a no-op rather than a panic, so test
/// binaries that each bring up their own [`Runtime`] can call this freely.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
