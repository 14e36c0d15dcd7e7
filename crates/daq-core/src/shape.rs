//! Image shape, strides and the checked byte-size arithmetic over them.

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;
use crate::sample::SampleType;

/// Maximum supported width/height/plane extent, in samples.
///
/// A ceiling on any single camera frame dimension, applied here to every
/// extent `ImageShape` carries.
pub const MAX_DIMENSION: u32 = 65_536;

/// Row/plane strides, measured in samples (not bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct Strides {
    /// Samples between adjacent pixels within a row.
    pub pixel: u32,
    /// Samples between adjacent rows.
    pub row: u32,
    /// Samples between adjacent planes. Invariant:
    /// `plane == channels * height * row`.
    pub plane: u64,
}

/// The shape and sample type of one video frame's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct ImageShape {
    /// Width in samples.
    pub width: u32,
    /// Height in samples.
    pub height: u32,
    /// Number of planes (e.g. z-slices).
    pub planes: u32,
    /// Number of channels (e.g. color components).
    pub channels: u32,
    /// Explicit stride record.
    pub strides: Strides,
    /// Per-sample type.
    pub sample_type: SampleType,
}

impl ImageShape {
    /// Build a contiguous, single-plane shape of `width x height` samples
    /// with `channels` interleaved channels, deriving strides so that
    /// `strides.plane == channels * height * row`.
    pub fn contiguous(
        width: u32,
        height: u32,
        channels: u32,
        sample_type: SampleType,
    ) -> Result<Self, RuntimeError> {
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(RuntimeError::FrameDimensionsTooLarge {
                width,
                height,
                max_dimension: MAX_DIMENSION,
            });
        }
        let pixel = channels.max(1);
        let row = pixel
            .checked_mul(width)
            .ok_or(RuntimeError::SizeOverflow { context: "row stride" })?;
        let plane = (row as u64)
            .checked_mul(height as u64)
            .ok_or(RuntimeError::SizeOverflow { context: "plane stride" })?;
        Ok(ImageShape {
            width,
            height,
            planes: 1,
            channels: pixel,
            strides: Strides { pixel, row, plane },
            sample_type,
        })
    }

    /// `bytes_of_image(shape) = strides.planes * planes * bytes_of_type(type)`.
    ///
    /// Every multiplication is checked; an unmapped sample type or an
    /// overflowing extent is reported as a typed error, never silently
    /// truncated or zeroed.
    pub fn bytes_of_image(&self) -> Result<u64, RuntimeError> {
        let per_plane_samples = self.strides.plane;
        let total_samples = per_plane_samples
            .checked_mul(self.planes as u64)
            .ok_or(RuntimeError::SizeOverflow {
                context: "total sample count",
            })?;
        total_samples
            .checked_mul(self.sample_type.bytes() as u64)
            .ok_or(RuntimeError::SizeOverflow {
                context: "image byte size",
            })
    }
}
