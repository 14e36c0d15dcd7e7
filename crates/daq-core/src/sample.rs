//! Pixel sample types and their on-disk/in-memory byte widths.

use serde::{Deserialize, Serialize};

/// The sample types a camera can produce and a storage sink can persist.
///
/// Sub-byte packed types (`U10`/`U12`/`U14`) always occupy two bytes per
/// sample, with the measurement carried in the low bits; there is no 1-byte
/// packed representation in this runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
#[repr(u8)]
pub enum SampleType {
    U8,
    U16,
    I8,
    I16,
    F32,
    /// 10-bit sample, packed into 2 bytes.
    U10,
    /// 12-bit sample, packed into 2 bytes.
    U12,
    /// 14-bit sample, packed into 2 bytes.
    U14,
}

impl SampleType {
    /// Byte width of one sample of this type. Never zero: an unmapped
    /// sample type is a programming error, not a silent 0.
    pub fn bytes(self) -> usize {
        match self {
            SampleType::U8 | SampleType::I8 => 1,
            SampleType::U16 | SampleType::I16 => 2,
            SampleType::F32 => 4,
            SampleType::U10 | SampleType::U12 | SampleType::U14 => 2,
        }
    }
}
