//! Driver: a factory exposing a fixed set of devices of one kind.
//!
//! A driver is discovered once at registration, describes its devices, and
//! opens them on demand. Drivers are plain Rust trait objects registered
//! into a static table rather than dynamically loaded libraries — there is
//! no dynamic-library loading requirement in this runtime's scope.

use daq_core::{DeviceIdentifier, RuntimeResult};

use crate::capability::{Camera, Storage};

/// A device a driver just opened.
pub enum OpenedDevice {
    Camera(Box<dyn Camera>),
    Storage(Box<dyn Storage>),
}

/// A factory exposing a fixed-size, ordered set of devices of one kind.
pub trait Driver: Send + Sync {
    /// Number of devices this driver exposes.
    fn device_count(&self) -> usize;

    /// Identifier of the device at `index` (`0..device_count()`).
    fn describe(&self, index: usize) -> DeviceIdentifier;

    /// Instantiate the device at `index`.
    fn open(&self, index: usize) -> RuntimeResult<OpenedDevice>;

    /// Release any driver-wide resources. Built-in drivers have none.
    fn shutdown(&self) {}
}
