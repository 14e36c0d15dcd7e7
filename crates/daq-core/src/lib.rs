//! Property types, sample/shape model and error taxonomy shared by every
//! layer of the acquisition runtime (device kit, frame ring, pipeline,
//! controller).

pub mod camera_props;
pub mod device_state;
pub mod error;
pub mod frame;
pub mod identifier;
pub mod sample;
pub mod shape;
pub mod storage_props;
pub mod stream_props;

pub use camera_props::{CameraProperties, ReadoutDirection, TriggerConfig, TriggerEdge, TriggerKind, TriggerSource};
pub use device_state::DeviceState;
pub use error::{RuntimeError, RuntimeResult};
pub use frame::{align_up, aligned_record_bytes, header_bytes, FrameTimestamp, VideoFrameHeader, FRAME_ALIGN};
pub use identifier::{DeviceIdentifier, DeviceKind};
pub use sample::SampleType;
pub use shape::{ImageShape, Strides, MAX_DIMENSION};
pub use storage_props::{StorageDimension, StorageDimensionKind, StorageProperties};
pub use stream_props::{
    PropertyMetadata, RuntimeProperties, StreamMetadata, VideoStreamProperties,
    DEFAULT_CAMERA_NAME, DEFAULT_STORAGE_NAME, MIN_STREAM_CAPACITY,
};
