//! The device lifecycle state machine shared by camera and storage
//! capability implementations.
//!
//! Devices cycle through `AwaitingConfiguration → Armed → Running →
//! Armed → Closed` in steady state, with `AwaitingConfiguration`
//! reachable from anywhere on a failed `set`.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one camera or storage device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    /// Not yet configured, or configuration was rejected. A device in this
    /// state must have `set` called again (with corrected properties)
    /// before it will accept `start`.
    AwaitingConfiguration,
    /// Configured and ready to start.
    Armed,
    /// Actively producing (camera) or consuming (storage) frames.
    Running,
    /// Closed; no further operations are valid.
    Closed,
}

impl DeviceState {
    /// `true` if a `start()` call is legal from this state.
    pub fn can_start(self) -> bool {
        matches!(self, DeviceState::Armed)
    }

    /// `true` if a `stop()` call is legal from this state.
    pub fn can_stop(self) -> bool {
        matches!(self, DeviceState::Running)
    }
}
