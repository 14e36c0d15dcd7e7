//! The `"tiff"` sink: one BigTIFF file, per-frame metadata embedded in
//! each frame's `ImageDescription` tag as JSON.

use std::fs::File;
use std::io;

use async_trait::async_trait;
use tiff::encoder::{colortype, TiffEncoder, TiffKindBig};
use tiff::tags::Tag;
use tracing::error;

use daq_core::{
    DeviceIdentifier, DeviceKind, DeviceState, ImageShape, RuntimeError, RuntimeResult, SampleType,
    StorageProperties,
};
use daq_plugin_api::{Storage, StorageMetadata};

fn io_err(e: tiff::TiffError) -> RuntimeError {
    RuntimeError::StorageIoFailure(io::Error::new(io::ErrorKind::Other, e.to_string()))
}

pub(super) fn write_frame(
    encoder: &mut TiffEncoder<File, TiffKindBig>,
    shape: &ImageShape,
    payload: &[u8],
    description: &str,
) -> RuntimeResult<()> {
    match shape.sample_type {
        SampleType::U8 | SampleType::I8 => {
            let mut img = encoder.new_image::<colortype::Gray8>(shape.width, shape.height).map_err(io_err)?;
            img.encoder().write_tag(Tag::ImageDescription, description).map_err(io_err)?;
            img.write_data(payload).map_err(io_err)?;
        }
        SampleType::U16 | SampleType::I16 | SampleType::U10 | SampleType::U12 | SampleType::U14 => {
            let samples: Vec<u16> = payload
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            let mut img = encoder.new_image::<colortype::Gray16>(shape.width, shape.height).map_err(io_err)?;
            img.encoder().write_tag(Tag::ImageDescription, description).map_err(io_err)?;
            img.write_data(&samples).map_err(io_err)?;
        }
        SampleType::F32 => {
            let samples: Vec<f32> = payload
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            let mut img = encoder.new_image::<colortype::Gray32Float>(shape.width, shape.height).map_err(io_err)?;
            img.encoder().write_tag(Tag::ImageDescription, description).map_err(io_err)?;
            img.write_data(&samples).map_err(io_err)?;
        }
    }
    Ok(())
}

pub struct TiffStorage {
    state: DeviceState,
    props: StorageProperties,
    encoder: Option<TiffEncoder<File, TiffKindBig>>,
    frame_count: u64,
}

impl TiffStorage {
    pub fn new() -> Self {
        TiffStorage {
            state: DeviceState::AwaitingConfiguration,
            props: StorageProperties::default(),
            encoder: None,
            frame_count: 0,
        }
    }
}

#[async_trait]
impl Storage for TiffStorage {
    fn identifier(&self) -> DeviceIdentifier {
        DeviceIdentifier::new(DeviceKind::Storage, "tiff")
    }

    async fn set(&mut self, properties: StorageProperties) -> DeviceState {
        if properties.normalized_uri().is_empty() {
            self.state = DeviceState::AwaitingConfiguration;
            return self.state;
        }
        self.props = properties;
        self.state = DeviceState::Armed;
        self.state
    }

    fn get(&self) -> StorageProperties {
        let mut props = self.props.clone();
        props.uri = self.props.normalized_uri().to_string();
        props
    }

    fn get_meta(&self) -> StorageMetadata {
        StorageMetadata {
            supports_multiscale: false,
            ..StorageMetadata::default()
        }
    }

    async fn start(&mut self) -> DeviceState {
        self.frame_count = 0;
        let opened = std::fs::File::create(self.props.normalized_uri())
            .map_err(RuntimeError::StorageIoFailure)
            .and_then(|file| TiffEncoder::new_big(file).map_err(io_err));
        match opened {
            Ok(encoder) => {
                self.encoder = Some(encoder);
                self.state = DeviceState::Running;
            }
            Err(e) => {
                error!(uri = self.props.normalized_uri(), error = %e, "tiff sink failed to open file");
                self.state = DeviceState::AwaitingConfiguration;
            }
        }
        self.state
    }

    async fn stop(&mut self) -> DeviceState {
        self.encoder = None;
        self.state = DeviceState::Armed;
        self.state
    }

    async fn append(&mut self, frame: &[u8]) -> (DeviceState, usize) {
        let Some(encoder) = self.encoder.as_mut() else {
            return (DeviceState::AwaitingConfiguration, 0);
        };
        let (header, payload) = match daq_core::VideoFrameHeader::from_record_bytes(frame) {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "tiff sink could not parse frame header");
                self.state = DeviceState::AwaitingConfiguration;
                return (self.state, 0);
            }
        };
        let description = serde_json::json!({
            "frame_id": header.frame_id,
            "stream_id": header.stream_id,
            "hardware_ns": header.timestamp.hardware_ns,
            "system_ns": header.timestamp.system_ns,
            "external": self.props.metadata_json,
        })
        .to_string();

        match write_frame(encoder, &header.shape, payload, &description) {
            Ok(()) => {
                self.frame_count += 1;
                (self.state, frame.len())
            }
            Err(e) => {
                error!(error = %e, "tiff sink append failed");
                self.state = DeviceState::AwaitingConfiguration;
                (self.state, 0)
            }
        }
    }

    fn reserve_image_shape(&mut self, _shape: ImageShape) {}

    async fn destroy(&mut self) {
        self.encoder = None;
    }
}
