//! Per-stream and runtime-wide property records, and the metadata record
//! reconciliation reports back to the caller.

use serde::{Deserialize, Serialize};

use crate::camera_props::CameraProperties;
use crate::identifier::DeviceIdentifier;
use crate::shape::ImageShape;
use crate::storage_props::StorageProperties;

/// Minimum number of streams a runtime must support concurrently.
pub const MIN_STREAM_CAPACITY: usize = 2;

/// One camera+storage pipeline's requested configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamProperties {
    /// Requested camera identifier (kind + pattern/name).
    pub camera_id: DeviceIdentifier,
    /// Camera configuration.
    pub camera: CameraProperties,
    /// Requested storage identifier.
    pub storage_id: DeviceIdentifier,
    /// Storage configuration.
    pub storage: StorageProperties,
    /// Frame cap for this acquisition; 0 means unbounded.
    pub max_frame_count: u64,
    /// Number of frames to average together before committing one record
    /// (1 means no averaging).
    pub frame_average_factor: u32,
}

impl VideoStreamProperties {
    /// `true` when neither a camera nor a storage device has been requested
    /// — the stream is inactive and reconciliation leaves it untouched.
    pub fn is_inactive(&self) -> bool {
        self.camera_id.is_none() && self.storage_id.is_none()
    }
}

/// Default camera selected when a stream requests storage but no camera.
pub const DEFAULT_CAMERA_NAME: &str = "simulated: uniform random";
/// Default storage selected when a stream requests a camera but no storage.
pub const DEFAULT_STORAGE_NAME: &str = "trash";

/// The full, fixed-length set of stream configurations a runtime owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeProperties {
    /// One entry per stream slot.
    pub streams: Vec<VideoStreamProperties>,
}

impl RuntimeProperties {
    /// Build an all-inactive configuration with `capacity` stream slots.
    pub fn with_capacity(capacity: usize) -> Self {
        RuntimeProperties {
            streams: (0..capacity.max(MIN_STREAM_CAPACITY))
                .map(|_| VideoStreamProperties::default())
                .collect(),
        }
    }
}

/// What reconciliation discovered about one stream's devices: names after
/// selection, the camera's observable shape range, supported trigger
/// sources, and the storage sink's capability flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    /// Camera identifier as resolved by device selection.
    pub camera: DeviceIdentifier,
    /// Storage identifier as resolved by device selection.
    pub storage: DeviceIdentifier,
    /// Minimum/maximum frame shape the camera supports.
    pub shape_range: Option<(ImageShape, ImageShape)>,
    /// Trigger sources the camera reports support for.
    pub supported_trigger_sources: Vec<String>,
    /// Whether the storage sink supports chunked layouts.
    pub supports_chunking: bool,
    /// Whether the storage sink supports sharded layouts.
    pub supports_sharding: bool,
    /// Whether the storage sink supports a multiscale pyramid.
    pub supports_multiscale: bool,
    /// Whether the storage sink supports an S3 destination.
    pub supports_s3: bool,
}

/// Metadata for every stream, reported by `get_configuration_metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyMetadata {
    /// One entry per stream slot, matching [`RuntimeProperties::streams`].
    pub streams: Vec<StreamMetadata>,
}
