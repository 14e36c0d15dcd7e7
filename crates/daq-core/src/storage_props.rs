//! Storage sink configuration: URI, dimensions, and the chunk/shard model
//! sinks that support chunked/sharded layouts consult.

use serde::{Deserialize, Serialize};

/// The semantic role of one [`StorageDimension`] axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageDimensionKind {
    /// A spatial axis (x, y, z, ...).
    Space,
    /// A channel axis.
    Channel,
    /// The append axis (time).
    Time,
    /// Anything else.
    Other,
}

/// One named axis of a storage array. The last-listed dimension in a
/// [`StorageProperties::dimensions`] array is the append dimension; the
/// first is the fastest-varying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageDimension {
    /// Axis name, e.g. `"x"`, `"channel"`, `"t"`.
    pub name: String,
    /// Axis role.
    pub kind: StorageDimensionKind,
    /// Total extent in pixels.
    pub array_size_px: u64,
    /// Chunk extent in pixels.
    pub chunk_size_px: u64,
    /// Shard extent in chunks.
    pub shard_size_chunks: u64,
}

impl StorageDimension {
    /// Validate and build one dimension slot. Fails (returning `None`, so
    /// the caller's slot is left unset) when `name` is empty, since an
    /// owned `String` can't be null.
    pub fn new(
        name: impl Into<String>,
        kind: StorageDimensionKind,
        array_size_px: u64,
        chunk_size_px: u64,
        shard_size_chunks: u64,
    ) -> Option<Self> {
        let name = name.into();
        if name.is_empty() {
            return None;
        }
        Some(StorageDimension {
            name,
            kind,
            array_size_px,
            chunk_size_px,
            shard_size_chunks,
        })
    }
}

/// Configuration accepted by a storage sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageProperties {
    /// Destination URI, optionally prefixed `file://`. Reconciliation
    /// strips the prefix before the sink sees it.
    pub uri: String,
    /// Arbitrary external metadata, written by sinks that support it
    /// (side-by-side TIFF's `metadata.json`).
    pub metadata_json: String,
    /// S3 access key id, for sinks that support an S3 destination.
    pub s3_access_key_id: String,
    /// S3 secret access key.
    pub s3_secret_access_key: String,
    /// Pixel scale, e.g. microns per pixel along (x, y).
    pub pixel_scale_um: (f32, f32),
    /// Named axes; the last entry is the append dimension.
    pub dimensions: Vec<StorageDimension>,
    /// Whether the sink should also write a multiscale pyramid.
    pub multiscale: bool,
    /// Reserved for file rollover; unused by the four built-in sinks,
    /// carried and round-tripped only.
    pub first_frame_id: u64,
}

impl StorageProperties {
    /// Strip a leading `file://` from `uri`, returning the normalized
    /// form. Byte-exact on anything that isn't `file://`-prefixed.
    pub fn normalized_uri(&self) -> &str {
        self.uri.strip_prefix("file://").unwrap_or(&self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_prefix_is_stripped() {
        let mut props = StorageProperties::default();
        props.uri = "file:///tmp/out.bin".to_string();
        assert_eq!(props.normalized_uri(), "/tmp/out.bin");
    }

    #[test]
    fn uri_without_prefix_is_unchanged() {
        let mut props = StorageProperties::default();
        props.uri = "/tmp/out.bin".to_string();
        assert_eq!(props.normalized_uri(), "/tmp/out.bin");
    }

    #[test]
    fn empty_dimension_name_is_rejected() {
        assert!(StorageDimension::new("", StorageDimensionKind::Time, 1, 1, 1).is_none());
        assert!(StorageDimension::new("t", StorageDimensionKind::Time, 1, 1, 1).is_some());
    }
}
