//! Process-level runtime settings: ring sizing policy and the join
//! timeout used to escalate a polite stop into a forced abort.
//!
//! Distinct from [`daq_core::RuntimeProperties`], which are per-acquisition
//! parameters a caller supplies through `configure`. Loaded from an
//! optional `rust_daq.toml` layered with `RUST_DAQ__*` environment
//! overrides (e.g. `RUST_DAQ__JOIN_TIMEOUT_MS=2000`).

use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use daq_core::{aligned_record_bytes, ImageShape, RuntimeResult};

/// Default number of in-flight frames a stream's ring is sized to hold
/// before the consumer must keep up.
const DEFAULT_RING_QUEUE_DEPTH_FRAMES: u64 = 64;

/// Default time the controller waits for a polite stop to join before
/// escalating to a forced abort.
const DEFAULT_JOIN_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSettings {
    /// How many of a stream's maximum-aligned frames its ring should hold
    /// before the gating consumer starts forcing drops.
    #[serde(default = "default_ring_queue_depth_frames")]
    pub ring_queue_depth_frames: u64,
    pub join_timeout_ms: u64,
}

fn default_ring_queue_depth_frames() -> u64 {
    DEFAULT_RING_QUEUE_DEPTH_FRAMES
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        RuntimeSettings {
            ring_queue_depth_frames: DEFAULT_RING_QUEUE_DEPTH_FRAMES,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
        }
    }
}

impl RuntimeSettings {
    /// Load settings, layering an optional `rust_daq.toml` in the current
    /// directory under `RUST_DAQ__*` environment overrides over the
    /// built-in defaults. Absence of the file is not an error.
    pub fn load() -> RuntimeResult<Self> {
        let config = Config::builder()
            .set_default("ring_queue_depth_frames", DEFAULT_RING_QUEUE_DEPTH_FRAMES)?
            .set_default("join_timeout_ms", DEFAULT_JOIN_TIMEOUT_MS)?
            .add_source(File::with_name("rust_daq").required(false))
            .add_source(Environment::with_prefix("RUST_DAQ").separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Ring capacity for a stream whose camera produces `shape`-sized
    /// frames: a power of two multiple of the maximum aligned frame size,
    /// sized to hold `ring_queue_depth_frames` of them.
    pub fn ring_capacity_for(&self, shape: ImageShape) -> RuntimeResult<u64> {
        let record_bytes = aligned_record_bytes(shape)?;
        let target = record_bytes.saturating_mul(self.ring_queue_depth_frames.max(1));
        Ok(target.next_power_of_two())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_positive() {
        let settings = RuntimeSettings::default();
        assert!(settings.ring_queue_depth_frames > 0);
        assert!(settings.join_timeout_ms > 0);
    }

    #[test]
    fn load_without_a_config_file_falls_back_to_defaults() {
        let settings = RuntimeSettings::load().unwrap();
        assert_eq!(settings.ring_queue_depth_frames, DEFAULT_RING_QUEUE_DEPTH_FRAMES);
    }

    #[test]
    fn ring_capacity_is_a_power_of_two_multiple_of_the_aligned_frame_size() {
        use daq_core::SampleType;

        let settings = RuntimeSettings::default();
        let shape = ImageShape::contiguous(640, 480, 1, SampleType::U16).unwrap();
        let capacity = settings.ring_capacity_for(shape).unwrap();
        assert!(capacity.is_power_of_two());

        let record_bytes = aligned_record_bytes(shape).unwrap();
        assert!(capacity >= record_bytes * settings.ring_queue_depth_frames);
    }
}
