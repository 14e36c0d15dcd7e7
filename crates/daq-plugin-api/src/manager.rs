//! The flat device table every loaded driver's devices are enumerated
//! into, and `select`'s regex-against-name matching.

use std::collections::HashSet;

use regex::Regex;

use daq_core::{DeviceIdentifier, DeviceKind, RuntimeError, RuntimeResult};

use crate::driver::{Driver, OpenedDevice};

/// Registry of drivers, flattened into one enumeration table for
/// `select`. Tie-break on ambiguous patterns is driver-registration
/// order, then intra-driver enumeration order (`describe` index).
pub struct DeviceManager {
    drivers: Vec<Box<dyn Driver>>,
    /// Identifiers currently open and held exclusively.
    open: HashSet<DeviceIdentifier>,
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceManager {
    /// An empty manager with no drivers registered.
    pub fn new() -> Self {
        DeviceManager {
            drivers: Vec::new(),
            open: HashSet::new(),
        }
    }

    /// Register a driver. Drivers are appended, so registration order is
    /// preserved for tie-breaking.
    pub fn register(&mut self, driver: Box<dyn Driver>) {
        self.drivers.push(driver);
    }

    /// Every identifier currently enumerated, in (driver order, intra-driver
    /// order).
    pub fn list(&self) -> Vec<DeviceIdentifier> {
        self.drivers
            .iter()
            .flat_map(|d| (0..d.device_count()).map(move |i| d.describe(i)))
            .collect()
    }

    /// Resolve `(kind, pattern)` to the first matching device identifier,
    /// without regard to whether that device is currently open. Used by
    /// property reconciliation to test a previously-opened identifier
    /// against a freshly requested pattern before deciding whether to
    /// reuse it (`select` would otherwise report it busy to itself).
    ///
    /// An empty pattern means "first device of this kind". A non-empty
    /// pattern is compiled as a case-sensitive regular expression and
    /// matched against each candidate device's name, in enumeration order.
    pub fn resolve(&self, kind: DeviceKind, pattern: &str) -> RuntimeResult<DeviceIdentifier> {
        let regex = if pattern.is_empty() {
            None
        } else {
            Some(Regex::new(pattern).map_err(|source| RuntimeError::MalformedPattern {
                pattern: pattern.to_string(),
                source,
            })?)
        };

        for driver in &self.drivers {
            for index in 0..driver.device_count() {
                let id = driver.describe(index);
                if id.kind != kind {
                    continue;
                }
                let matches = match &regex {
                    None => true,
                    Some(re) => re.is_match(&id.name),
                };
                if matches {
                    return Ok(id);
                }
            }
        }

        Err(RuntimeError::DeviceNotFound {
            kind: format!("{kind:?}"),
            pattern: pattern.to_string(),
        })
    }

    /// Resolve `(kind, pattern)` to the first matching device identifier
    /// that is not already held exclusively.
    pub fn select(&self, kind: DeviceKind, pattern: &str) -> RuntimeResult<DeviceIdentifier> {
        let id = self.resolve(kind, pattern)?;
        if self.open.contains(&id) {
            return Err(RuntimeError::DeviceBusy(id));
        }
        Ok(id)
    }

    /// Open the device named by `id`, marking it exclusively held until
    /// [`DeviceManager::close`] is called.
    pub fn open(&mut self, id: &DeviceIdentifier) -> RuntimeResult<OpenedDevice> {
        if self.open.contains(id) {
            return Err(RuntimeError::DeviceBusy(id.clone()));
        }
        for driver in &self.drivers {
            for index in 0..driver.device_count() {
                if &driver.describe(index) == id {
                    let opened = driver.open(index)?;
                    self.open.insert(id.clone());
                    return Ok(opened);
                }
            }
        }
        Err(RuntimeError::DeviceNotFound {
            kind: format!("{:?}", id.kind),
            pattern: id.name.clone(),
        })
    }

    /// Release exclusivity on a previously opened device. The runtime
    /// never dereferences the device's state after this call.
    pub fn close(&mut self, id: &DeviceIdentifier) {
        self.open.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Camera, CameraMetadata, FramePoll};
    use async_trait::async_trait;
    use daq_core::{CameraProperties, DeviceState, ImageShape, SampleType};

    struct StubCamera {
        id: DeviceIdentifier,
        props: CameraProperties,
    }

    #[async_trait]
    impl Camera for StubCamera {
        fn identifier(&self) -> DeviceIdentifier {
            self.id.clone()
        }
        async fn set(&mut self, properties: CameraProperties) -> DeviceState {
            self.props = properties;
            DeviceState::Armed
        }
        fn get(&self) -> CameraProperties {
            self.props
        }
        fn get_meta(&self) -> CameraMetadata {
            CameraMetadata::default()
        }
        fn get_shape(&self) -> ImageShape {
            ImageShape::contiguous(1, 1, 1, SampleType::U8).unwrap()
        }
        async fn start(&mut self) -> DeviceState {
            DeviceState::Running
        }
        async fn stop(&mut self) -> DeviceState {
            DeviceState::Armed
        }
        async fn execute_trigger(&mut self) -> RuntimeResult<()> {
            Ok(())
        }
        async fn get_frame(&mut self, _buffer: &mut [u8]) -> FramePoll {
            FramePoll::Again
        }
    }

    struct StubDriver {
        names: Vec<&'static str>,
    }

    impl Driver for StubDriver {
        fn device_count(&self) -> usize {
            self.names.len()
        }
        fn describe(&self, index: usize) -> DeviceIdentifier {
            DeviceIdentifier::new(DeviceKind::Camera, self.names[index])
        }
        fn open(&self, index: usize) -> RuntimeResult<OpenedDevice> {
            Ok(OpenedDevice::Camera(Box::new(StubCamera {
                id: self.describe(index),
                props: CameraProperties::default(),
            })))
        }
    }

    fn manager() -> DeviceManager {
        let mut m = DeviceManager::new();
        m.register(Box::new(StubDriver {
            names: vec!["simulated: uniform random", "simulated: radial sin", "simulated: empty"],
        }));
        m
    }

    #[test]
    fn empty_pattern_selects_first_of_kind() {
        let m = manager();
        let id = m.select(DeviceKind::Camera, "").unwrap();
        assert_eq!(id.name, "simulated: uniform random");
    }

    #[test]
    fn regex_pattern_matches_by_name() {
        let m = manager();
        let id = m.select(DeviceKind::Camera, "simulated.*sin").unwrap();
        assert_eq!(id.name, "simulated: radial sin");
    }

    #[test]
    fn no_match_is_device_not_found() {
        let m = manager();
        let err = m.select(DeviceKind::Storage, "").unwrap_err();
        assert!(matches!(err, RuntimeError::DeviceNotFound { .. }));
    }

    #[test]
    fn malformed_pattern_is_rejected() {
        let m = manager();
        let err = m.select(DeviceKind::Camera, "(unterminated").unwrap_err();
        assert!(matches!(err, RuntimeError::MalformedPattern { .. }));
    }

    #[test]
    fn open_then_select_again_reports_busy() {
        let mut m = manager();
        let id = m.select(DeviceKind::Camera, "").unwrap();
        let _opened = m.open(&id).unwrap();
        let err = m.select(DeviceKind::Camera, "").unwrap_err();
        assert!(matches!(err, RuntimeError::DeviceBusy(_)));
        m.close(&id);
        assert!(m.select(DeviceKind::Camera, "").is_ok());
    }
}
