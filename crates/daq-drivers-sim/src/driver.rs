//! The two built-in drivers registered unconditionally at runtime init:
//! one exposing the three simulated cameras, one exposing the four
//! built-in storage sinks.

use daq_core::{DeviceIdentifier, DeviceKind, RuntimeResult};
use daq_plugin_api::{Driver, OpenedDevice};

use crate::cameras::SimCamera;
use crate::storage::raw::RawStorage;
use crate::storage::tiff::TiffStorage;
use crate::storage::tiff_json::SideBySideTiffStorage;
use crate::storage::trash::TrashStorage;

const CAMERA_NAMES: [&str; 3] = [
    "simulated: uniform random",
    "simulated: radial sin",
    "simulated: empty",
];

/// Driver exposing the three built-in simulated cameras.
pub struct SimCameraDriver;

impl Driver for SimCameraDriver {
    fn device_count(&self) -> usize {
        CAMERA_NAMES.len()
    }

    fn describe(&self, index: usize) -> DeviceIdentifier {
        DeviceIdentifier::new(DeviceKind::Camera, CAMERA_NAMES[index])
    }

    fn open(&self, index: usize) -> RuntimeResult<OpenedDevice> {
        let camera: Box<dyn daq_plugin_api::Camera> = match index {
            0 => Box::new(SimCamera::uniform_random()),
            1 => Box::new(SimCamera::radial_sin()),
            _ => Box::new(SimCamera::empty()),
        };
        Ok(OpenedDevice::Camera(camera))
    }
}

const STORAGE_NAMES: [&str; 4] = ["trash", "raw", "tiff", "tiff-json"];

/// Driver exposing the four built-in storage sinks.
pub struct SimStorageDriver;

impl Driver for SimStorageDriver {
    fn device_count(&self) -> usize {
        STORAGE_NAMES.len()
    }

    fn describe(&self, index: usize) -> DeviceIdentifier {
        DeviceIdentifier::new(DeviceKind::Storage, STORAGE_NAMES[index])
    }

    fn open(&self, index: usize) -> RuntimeResult<OpenedDevice> {
        let storage: Box<dyn daq_plugin_api::Storage> = match index {
            0 => Box::new(TrashStorage::new()),
            1 => Box::new(RawStorage::new()),
            2 => Box::new(TiffStorage::new()),
            _ => Box::new(SideBySideTiffStorage::new()),
        };
        Ok(OpenedDevice::Storage(storage))
    }
}
