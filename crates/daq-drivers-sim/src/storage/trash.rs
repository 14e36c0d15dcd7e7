//! The `"trash"` sink: discards every appended frame untouched.

use async_trait::async_trait;
use daq_core::{DeviceIdentifier, DeviceKind, DeviceState, ImageShape, StorageProperties};
use daq_plugin_api::{Storage, StorageMetadata};

pub struct TrashStorage {
    state: DeviceState,
    props: StorageProperties,
}

impl TrashStorage {
    pub fn new() -> Self {
        TrashStorage {
            state: DeviceState::AwaitingConfiguration,
            props: StorageProperties::default(),
        }
    }
}

#[async_trait]
impl Storage for TrashStorage {
    fn identifier(&self) -> DeviceIdentifier {
        DeviceIdentifier::new(DeviceKind::Storage, "trash")
    }

    async fn set(&mut self, properties: StorageProperties) -> DeviceState {
        self.props = properties;
        self.state = DeviceState::Armed;
        DeviceState::Armed
    }

    fn get(&self) -> StorageProperties {
        self.props.clone()
    }

    fn get_meta(&self) -> StorageMetadata {
        StorageMetadata::default()
    }

    async fn start(&mut self) -> DeviceState {
        self.state = DeviceState::Running;
        DeviceState::Running
    }

    async fn stop(&mut self) -> DeviceState {
        self.state = DeviceState::Armed;
        DeviceState::Armed
    }

    async fn append(&mut self, frame: &[u8]) -> (DeviceState, usize) {
        (self.state, frame.len())
    }

    fn reserve_image_shape(&mut self, _shape: ImageShape) {}

    async fn destroy(&mut self) {}
}
