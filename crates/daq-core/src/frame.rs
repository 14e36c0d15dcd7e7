//! The `VideoFrame` header: fixed metadata immediately followed by the
//! pixel payload in the frame ring (see `daq-ring`).

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;
use crate::shape::ImageShape;

/// Round `n` up to the next multiple of `align` (`align` must be a power of two).
pub const fn align_up(n: u64, align: u64) -> u64 {
    (n + align - 1) & !(align - 1)
}

/// Alignment every `VideoFrame` record in the ring is held to.
pub const FRAME_ALIGN: u64 = 8;

/// Two clocks stamped on every frame: the camera's own acquisition clock,
/// and the host's system clock at the moment the frame was copied out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct FrameTimestamp {
    /// Camera/acquisition-clock nanoseconds, monotonic but not necessarily
    /// comparable across streams.
    pub hardware_ns: u64,
    /// Host system-clock nanoseconds (e.g. since `UNIX_EPOCH`).
    pub system_ns: u64,
}

/// Fixed header preceding a frame's pixel payload in the ring.
///
/// Invariant: `bytes_of_frame == align_up(size_of::<VideoFrameHeader>() as
/// u64 + shape.bytes_of_image(), FRAME_ALIGN)`. The header never encodes a
/// frame whose computed size disagrees with this; `VideoFrameHeader::new`
/// is the only constructor and it enforces the invariant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct VideoFrameHeader {
    /// Total record size including this header, padded to 8 bytes.
    pub bytes_of_frame: u64,
    /// Shape of the pixel payload that follows this header.
    pub shape: ImageShape,
    /// Which stream this frame belongs to.
    pub stream_id: usize,
    /// Monotonically increasing per-stream frame counter, starting at 0.
    pub frame_id: u64,
    /// Acquisition/system clock readings.
    pub timestamp: FrameTimestamp,
}

/// Size of [`VideoFrameHeader`] as stored in the ring. Kept as a function
/// (rather than relying on `size_of` at arbitrary call sites) so every
/// caller agrees on one number even if the struct's Rust layout has
/// padding the wire format doesn't.
pub const fn header_bytes() -> u64 {
    std::mem::size_of::<VideoFrameHeader>() as u64
}

/// The ring footprint of one `shape`-sized frame record: header plus
/// payload, aligned to [`FRAME_ALIGN`]. The ring sizing rule is a power of
/// two multiple of this value.
pub fn aligned_record_bytes(shape: ImageShape) -> Result<u64, RuntimeError> {
    let payload = shape.bytes_of_image()?;
    let raw = header_bytes()
        .checked_add(payload)
        .ok_or(RuntimeError::SizeOverflow {
            context: "frame record size",
        })?;
    Ok(align_up(raw, FRAME_ALIGN))
}

impl VideoFrameHeader {
    /// Build a header for `shape`, computing `bytes_of_frame` and enforcing
    /// the alignment invariant. Returns an error rather than silently
    /// truncating if the image's byte size can't be computed or would
    /// overflow the record-size arithmetic.
    pub fn new(
        shape: ImageShape,
        stream_id: usize,
        frame_id: u64,
        timestamp: FrameTimestamp,
    ) -> Result<Self, RuntimeError> {
        let payload = shape.bytes_of_image()?;
        let raw = header_bytes()
            .checked_add(payload)
            .ok_or(RuntimeError::SizeOverflow {
                context: "frame record size",
            })?;
        let bytes_of_frame = align_up(raw, FRAME_ALIGN);
        Ok(VideoFrameHeader {
            bytes_of_frame,
            shape,
            stream_id,
            frame_id,
            timestamp,
        })
    }

    /// Number of payload bytes following this header (`bytes_of_frame`
    /// minus the header itself, minus any trailing alignment pad).
    pub fn payload_bytes(&self) -> Result<u64, RuntimeError> {
        self.shape.bytes_of_image()
    }

    /// Raw-copy this header followed by `payload` into `dst`, which must
    /// be at least `self.bytes_of_frame` bytes (the ring record reserved
    /// for it). Any trailing bytes past the header and payload are the
    /// record's 8-byte alignment pad and are left untouched.
    pub fn write_into(&self, dst: &mut [u8], payload: &[u8]) {
        let hdr_bytes = header_bytes() as usize;
        // SAFETY: `VideoFrameHeader` is `#[repr(C)]` plain data; `dst` is
        // at least `hdr_bytes` long by the caller's contract.
        unsafe {
            std::ptr::write_unaligned(dst.as_mut_ptr() as *mut VideoFrameHeader, *self);
        }
        dst[hdr_bytes..hdr_bytes + payload.len()].copy_from_slice(payload);
    }

    /// Recover a header and its payload slice from raw record bytes (as
    /// handed back by a ring `map_read`). Fails only if the header's own
    /// `shape` can't report a byte size, never on malformed input from
    /// this crate's own writer.
    pub fn from_record_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), RuntimeError> {
        let hdr_bytes = header_bytes() as usize;
        // SAFETY: `VideoFrameHeader` is `#[repr(C)]` plain data and
        // `bytes` originates from a record this module itself wrote.
        let header = unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const VideoFrameHeader) };
        let image_len = header.shape.bytes_of_image()? as usize;
        let payload = &bytes[hdr_bytes..hdr_bytes + image_len];
        Ok((header, payload))
    }
}
