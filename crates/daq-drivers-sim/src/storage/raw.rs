//! The `"raw"` sink: concatenates `VideoFrame` records (header + payload)
//! verbatim into one file.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::error;

use daq_core::{DeviceIdentifier, DeviceKind, DeviceState, ImageShape, StorageProperties};
use daq_plugin_api::{Storage, StorageMetadata};

pub struct RawStorage {
    state: DeviceState,
    props: StorageProperties,
    file: Option<tokio::fs::File>,
}

impl RawStorage {
    pub fn new() -> Self {
        RawStorage {
            state: DeviceState::AwaitingConfiguration,
            props: StorageProperties::default(),
            file: None,
        }
    }
}

#[async_trait]
impl Storage for RawStorage {
    fn identifier(&self) -> DeviceIdentifier {
        DeviceIdentifier::new(DeviceKind::Storage, "raw")
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
        StorageMetadata::default()
    }

    async fn start(&mut self) -> DeviceState {
        match tokio::fs::File::create(self.props.normalized_uri()).await {
            Ok(file) => {
                self.file = Some(file);
                self.state = DeviceState::Running;
            }
            Err(e) => {
                error!(uri = self.props.normalized_uri(), error = %e, "raw sink failed to open file");
                self.state = DeviceState::AwaitingConfiguration;
            }
        }
        self.state
    }

    async fn stop(&mut self) -> DeviceState {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush().await;
        }
        self.state = DeviceState::Armed;
        self.state
    }

    async fn append(&mut self, frame: &[u8]) -> (DeviceState, usize) {
        let Some(file) = self.file.as_mut() else {
            return (DeviceState::AwaitingConfiguration, 0);
        };
        match file.write_all(frame).await {
            Ok(()) => (self.state, frame.len()),
            Err(e) => {
                error!(error = %e, "raw sink append failed");
                self.state = DeviceState::AwaitingConfiguration;
                (self.state, 0)
            }
        }
    }

    fn reserve_image_shape(&mut self, _shape: ImageShape) {}

    async fn destroy(&mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush().await;
        }
    }
}
