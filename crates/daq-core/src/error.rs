//! Centralized error type for the acquisition runtime.
//!
//! `RuntimeError` consolidates every recoverable failure the runtime can
//! report: configuration rejected by a device, a device the manager could
//! not locate, lifecycle misuse, and I/O failures surfaced by a storage
//! sink. Fatal/invariant-violation conditions are not represented here —
//! they are checked with `assert!` at their single construction site
//! instead, since a caller could not meaningfully recover from them.

use thiserror::Error;

/// Convenience alias for results using [`RuntimeError`].
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

/// Every recoverable failure the runtime's public API can report.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A device's `set` rejected the requested properties (returned to
    /// `AwaitingConfiguration`), or a property was malformed before it
    /// even reached the device.
    #[error("configuration rejected: {0}")]
    ConfigurationRejected(String),

    /// `DeviceManager::select` could not find a device matching the
    /// requested `(kind, pattern)`.
    #[error("no device found for kind {kind:?} matching {pattern:?}")]
    DeviceNotFound {
        /// The device kind that was requested.
        kind: String,
        /// The regex pattern (or empty string) that failed to match.
        pattern: String,
    },

    /// The pattern passed to `select` did not compile as a regular
    /// expression.
    #[error("malformed device selection pattern {pattern:?}: {source}")]
    MalformedPattern {
        /// The offending pattern.
        pattern: String,
        /// The underlying regex compile error.
        #[source]
        source: regex::Error,
    },

    /// The caller invoked a controller operation that is not legal in the
    /// runtime's current lifecycle state (e.g. `start` while `Running`).
    #[error("lifecycle misuse: {0}")]
    LifecycleMisuse(String),

    /// A storage sink failed during `append`; the stream has transitioned
    /// out of `Running` as a result.
    #[error("storage I/O failure: {0}")]
    StorageIoFailure(#[from] std::io::Error),

    /// A checked arithmetic operation in the frame-size computation would
    /// have overflowed.
    #[error("size overflow computing {context}")]
    SizeOverflow {
        /// What was being computed when the overflow occurred.
        context: &'static str,
    },

    /// Requested frame dimensions exceed what the runtime will allocate.
    #[error("frame dimensions {width}x{height} exceed the maximum of {max_dimension}")]
    FrameDimensionsTooLarge {
        /// Requested width in samples.
        width: u32,
        /// Requested height in samples.
        height: u32,
        /// The configured maximum per-dimension extent.
        max_dimension: u32,
    },

    /// The stream index passed to a per-stream operation is out of range.
    #[error("stream index {0} out of range")]
    StreamIndexOutOfRange(usize),

    /// `select` matched a device that is already open and exclusive.
    #[error("device already open and exclusive: {0:?}")]
    DeviceBusy(crate::identifier::DeviceIdentifier),

    /// `unmap_read` was asked to advance a reader cursor by a byte count
    /// that is not a multiple of the ring's alignment.
    #[error("unmap_read byte count {0} is not a multiple of the ring alignment")]
    UnmapNotAligned(u64),

    /// Process-level settings (ring capacity, join timeout, ...) failed to
    /// load from file/environment.
    #[error("runtime settings error: {0}")]
    Settings(#[from] config::ConfigError),
}
