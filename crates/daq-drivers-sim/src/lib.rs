//! Built-in camera simulators and storage sinks, registered unconditionally
//! at runtime init alongside any externally loaded drivers.

pub mod cameras;
pub mod driver;
pub mod storage;

pub use cameras::SimCamera;
pub use driver::{SimCameraDriver, SimStorageDriver};

use daq_plugin_api::DeviceManager;

/// Register both built-in drivers into `manager`.
pub fn register_builtin_drivers(manager: &mut DeviceManager) {
    manager.register(Box::new(SimCameraDriver));
    manager.register(Box::new(SimStorageDriver));
}
