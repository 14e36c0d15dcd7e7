//! The `"tiff-json"` (side-by-side TIFF) sink: a directory holding
//! `data.tif` (the frame stream) and `metadata.json` (external metadata,
//! written once at `start`).

use std::fs::File;
use std::path::PathBuf;

use async_trait::async_trait;
use tiff::encoder::TiffEncoder;
use tracing::error;

use daq_core::{
    DeviceIdentifier, DeviceKind, DeviceState, ImageShape, RuntimeError, StorageProperties,
};
use daq_plugin_api::{Storage, StorageMetadata};

use super::tiff::write_frame;

pub struct SideBySideTiffStorage {
    state: DeviceState,
    props: StorageProperties,
    encoder: Option<TiffEncoder<File, tiff::encoder::TiffKindBig>>,
}

impl SideBySideTiffStorage {
    pub fn new() -> Self {
        SideBySideTiffStorage {
            state: DeviceState::AwaitingConfiguration,
            props: StorageProperties::default(),
            encoder: None,
        }
    }
}

#[async_trait]
impl Storage for SideBySideTiffStorage {
    fn identifier(&self) -> DeviceIdentifier {
        DeviceIdentifier::new(DeviceKind::Storage, "tiff-json")
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
        let dir = PathBuf::from(self.props.normalized_uri());
        let opened = std::fs::create_dir_all(&dir)
            .and_then(|()| {
                if !self.props.metadata_json.is_empty() {
                    std::fs::write(dir.join("metadata.json"), &self.props.metadata_json)?;
                }
                File::create(dir.join("data.tif"))
            })
            .map_err(RuntimeError::StorageIoFailure)
            .and_then(|file| {
                TiffEncoder::new_big(file).map_err(|e| {
                    RuntimeError::StorageIoFailure(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        e.to_string(),
                    ))
                })
            });
        match opened {
            Ok(encoder) => {
                self.encoder = Some(encoder);
                self.state = DeviceState::Running;
            }
            Err(e) => {
                error!(uri = %dir.display(), error = %e, "side-by-side tiff sink failed to open");
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
                error!(error = %e, "side-by-side tiff sink could not parse frame header");
                self.state = DeviceState::AwaitingConfiguration;
                return (self.state, 0);
            }
        };
        // No per-frame description: frame metadata lives in metadata.json.
        match write_frame(encoder, &header.shape, payload, "") {
            Ok(()) => (self.state, frame.len()),
            Err(e) => {
                error!(error = %e, "side-by-side tiff sink append failed");
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
