//! The `Camera` and `Storage` capability traits every driver device
//! implements, plus the shared state machine and metadata records they
//! report through `get_meta`.

use async_trait::async_trait;

use daq_core::{
    CameraProperties, DeviceIdentifier, DeviceState, FrameTimestamp, ImageShape, RuntimeResult,
    StorageProperties,
};

/// What a camera reports about frame readiness when polled.
pub enum FramePoll {
    /// A frame of `nbytes` was copied into the caller's buffer.
    Ready {
        /// Bytes written into the caller-supplied buffer.
        nbytes: usize,
        /// Timestamps for the frame.
        timestamp: FrameTimestamp,
    },
    /// No frame is ready yet; the caller should yield briefly and retry.
    Again,
    /// The camera hit an unrecoverable error; it has transitioned to
    /// `AwaitingConfiguration`.
    Error(String),
}

/// What a camera reports about its observable ranges and supported
/// trigger sources.
#[derive(Debug, Clone, Default)]
pub struct CameraMetadata {
    /// Minimum/maximum frame shape the device supports.
    pub shape_range: Option<(ImageShape, ImageShape)>,
    /// Trigger source names the device supports.
    pub supported_trigger_sources: Vec<String>,
}

/// What a storage sink reports about its capabilities.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageMetadata {
    pub supports_chunking: bool,
    pub supports_sharding: bool,
    pub supports_multiscale: bool,
    pub supports_s3: bool,
}

/// A frame source. Implementations are driven exclusively by the
/// producer task of the stream they're assigned to: single-task affinity
/// to the camera.
#[async_trait]
pub trait Camera: Send + Sync {
    /// This device's identifier.
    fn identifier(&self) -> DeviceIdentifier;

    /// Validate and apply `properties`. Returns `Armed` on success or
    /// `AwaitingConfiguration` if the properties were rejected — the
    /// device's previous configuration is left in place on rejection.
    async fn set(&mut self, properties: CameraProperties) -> DeviceState;

    /// The device's current effective configuration (may differ from what
    /// was last requested, e.g. exposure quantization).
    fn get(&self) -> CameraProperties;

    /// Observable ranges and trigger-source support.
    fn get_meta(&self) -> CameraMetadata;

    /// The shape of frames this device currently produces.
    fn get_shape(&self) -> ImageShape;

    /// Transition `Armed -> Running`.
    async fn start(&mut self) -> DeviceState;

    /// Transition `Running -> Armed`. Must not be followed by any further
    /// `get_frame` call until the next `start`.
    async fn stop(&mut self) -> DeviceState;

    /// Force one triggered acquisition (only meaningful when triggering is
    /// configured).
    async fn execute_trigger(&mut self) -> RuntimeResult<()>;

    /// Poll for the next frame, copying its payload into `buffer`.
    /// `buffer` is guaranteed to be at least `get_shape().bytes_of_image()`
    /// bytes.
    async fn get_frame(&mut self, buffer: &mut [u8]) -> FramePoll;
}

/// A frame sink. Implementations are driven exclusively by the consumer
/// task of the stream they're assigned to.
#[async_trait]
pub trait Storage: Send + Sync {
    /// This device's identifier.
    fn identifier(&self) -> DeviceIdentifier;

    /// Validate and apply `properties`. Returns `Armed` on success or
    /// `AwaitingConfiguration` if the properties were rejected.
    async fn set(&mut self, properties: StorageProperties) -> DeviceState;

    /// The device's current effective configuration, with any `file://`
    /// prefix already stripped from the reported URI.
    fn get(&self) -> StorageProperties;

    /// Capability flags and any other reportable metadata.
    fn get_meta(&self) -> StorageMetadata;

    /// Transition `Armed -> Running`; called only after `reserve_image_shape`.
    async fn start(&mut self) -> DeviceState;

    /// Transition `Running -> Armed`.
    async fn stop(&mut self) -> DeviceState;

    /// Append one frame record. Returns the device's state after the call
    /// (anything other than `Running` terminates the consumer) and the
    /// number of bytes actually written.
    async fn append(&mut self, frame: &[u8]) -> (DeviceState, usize);

    /// Inform the sink of the image shape it will be asked to store, so it
    /// can size chunks/shards. Called during `configure`, never during
    /// `start`.
    fn reserve_image_shape(&mut self, shape: ImageShape);

    /// Release any resources held by this sink (close files, flush
    /// buffers). Called once, when the runtime releases the device.
    async fn destroy(&mut self);
}
