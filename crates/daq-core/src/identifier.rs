//! Device identity: the `(kind, name)` pair the device manager indexes on.

use serde::{Deserialize, Serialize};

/// The two device roles the runtime drives through a common state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// No device selected.
    None,
    /// A frame source.
    Camera,
    /// A frame sink.
    Storage,
}

impl Default for DeviceKind {
    fn default() -> Self {
        DeviceKind::None
    }
}

/// Names a device to the [`DeviceManager`](crate::DeviceManager): a role plus
/// a printable name, e.g. `(Camera, "simulated: uniform random")`.
///
/// The default identifier has `kind == DeviceKind::None` and an empty name —
/// "unspecified" — which triggers default device selection during
/// reconciliation rather than naming a concrete device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentifier {
    /// The device's role.
    pub kind: DeviceKind,
    /// The device's printable name, unique within its kind.
    pub name: String,
}

impl DeviceIdentifier {
    /// Build an identifier for the given kind and name.
    pub fn new(kind: DeviceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// True when this identifier names no device ("unspecified").
    pub fn is_none(&self) -> bool {
        self.kind == DeviceKind::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_identifier_is_none() {
        let id = DeviceIdentifier::default();
        assert!(id.is_none());
        assert_eq!(id.name, "");
    }

    #[test]
    fn equality_is_by_kind_and_name() {
        let a = DeviceIdentifier::new(DeviceKind::Camera, "simulated: uniform random");
        let b = DeviceIdentifier::new(DeviceKind::Camera, "simulated: uniform random");
        let c = DeviceIdentifier::new(DeviceKind::Storage, "simulated: uniform random");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
