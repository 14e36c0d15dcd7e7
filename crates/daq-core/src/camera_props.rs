//! Camera source configuration: exposure, binning, shape, and trigger setup.

use serde::{Deserialize, Serialize};

use crate::sample::SampleType;

/// Edge polarity a trigger input reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerEdge {
    Rising,
    Falling,
}

/// Where a trigger signal originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerSource {
    /// No external trigger; the camera free-runs or is software-triggered.
    Software,
    /// An external line input.
    Line(u8),
}

/// What kind of trigger is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerKind {
    /// No triggering; free-run.
    None,
    /// One input event arms one frame.
    FrameStart,
    /// One input event arms continuous exposure until the next edge.
    ExposureActive,
}

/// Input-trigger configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub edge: TriggerEdge,
    pub source: TriggerSource,
    pub kind: TriggerKind,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        TriggerConfig {
            edge: TriggerEdge::Rising,
            source: TriggerSource::Software,
            kind: TriggerKind::None,
        }
    }
}

/// Sensor readout direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadoutDirection {
    TopToBottom,
    BottomToTop,
}

impl Default for ReadoutDirection {
    fn default() -> Self {
        ReadoutDirection::TopToBottom
    }
}

/// Configuration accepted by a camera device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraProperties {
    /// Horizontal/vertical binning factor.
    pub binning: (u8, u8),
    /// Pixel sample type.
    pub sample_type: SampleType,
    /// Frame width/height in samples, before binning is applied.
    pub frame_shape_px: (u32, u32),
    /// Exposure time in microseconds.
    pub exposure_us: u64,
    /// Line interval in microseconds (rolling-shutter readout spacing).
    pub line_interval_us: u64,
    /// Input trigger configuration.
    pub trigger: TriggerConfig,
    /// Sensor readout direction.
    pub readout_direction: ReadoutDirection,
}

impl Default for CameraProperties {
    fn default() -> Self {
        CameraProperties {
            binning: (1, 1),
            sample_type: SampleType::U8,
            frame_shape_px: (0, 0),
            exposure_us: 0,
            line_interval_us: 0,
            trigger: TriggerConfig::default(),
            readout_direction: ReadoutDirection::default(),
        }
    }
}
