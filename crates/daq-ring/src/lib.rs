//! Single-producer, dual-reader frame ring.
//!
//! Backed by an anonymous `memmap2` mapping (no backing file: the ring
//! never needs to outlive the process or be inspected from another
//! process). One producer task
//! writes variable-size records; a gating storage reader and an optional
//! non-gating monitor reader drain them independently.
//!
//! Every record starts at an 8-byte aligned offset and is prefixed by an
//! 8-byte ring-level length field, distinct from the `VideoFrameHeader`
//! the payload itself carries: the ring needs its own framing to emit a
//! skippable pad entry when a record would otherwise straddle the end of
//! the backing region.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use memmap2::{MmapMut, MmapOptions};
use tokio::sync::Notify;
use tracing::warn;

use daq_core::RuntimeError;

/// Alignment every record (and every ring-level length prefix) is held to.
pub const RING_ALIGN: u64 = 8;

/// Size of the ring-level length prefix preceding every record and pad.
const PREFIX_BYTES: u64 = 8;

/// High bit of a length prefix: this entry is padding, not a record.
const PAD_BIT: u64 = 1 << 63;

/// Which of a stream's two readers a cursor operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderKind {
    /// The storage consumer. Gates producer progress: the writer will not
    /// overwrite data this reader has not yet consumed.
    Consumer,
    /// The optional live-preview tap. Never gates the producer; its
    /// cursor is silently clamped forward if it falls too far behind.
    Monitor,
}

/// One entry read back out of a `map_read` slice: either a skippable pad
/// or a real record's payload bytes (header + frame, as the producer
/// wrote them).
#[derive(Debug)]
pub enum RingEntry<'a> {
    /// `total_len` ring-level bytes (including the 8-byte prefix) to skip.
    Pad {
        /// Bytes to advance the cursor by via `unmap_read`, prefix included.
        total_len: u64,
    },
    /// A committed record's payload.
    Record {
        /// The header + frame bytes exactly as the producer wrote them.
        payload: &'a [u8],
        /// Bytes to advance the cursor by via `unmap_read`, prefix included.
        total_len: u64,
    },
}

/// Walk a `map_read` slice entry-by-entry.
///
/// Stops (returns `None`) once fewer than [`PREFIX_BYTES`] bytes remain,
/// which happens at the end of whatever contiguous slice `map_read`
/// handed back (readers may need more than one `map_read`/`unmap_read`
/// round trip to drain across a wrap point).
pub fn next_entry<'a>(slice: &'a [u8]) -> Option<RingEntry<'a>> {
    if (slice.len() as u64) < PREFIX_BYTES {
        return None;
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&slice[0..8]);
    let prefix = u64::from_le_bytes(raw);
    if prefix & PAD_BIT != 0 {
        let skip = prefix & !PAD_BIT;
        Some(RingEntry::Pad {
            total_len: PREFIX_BYTES + skip,
        })
    } else {
        let len = prefix;
        let end = (PREFIX_BYTES + len) as usize;
        if end > slice.len() {
            return None;
        }
        Some(RingEntry::Record {
            payload: &slice[8..end],
            total_len: PREFIX_BYTES + len,
        })
    }
}

/// A bounded, memory-mapped ring of 8-byte-aligned variable-size records.
pub struct FrameRing {
    /// Kept alive only to keep the mapping valid; never read directly.
    _mmap: MmapMut,
    data_ptr: *mut u8,
    capacity: u64,
    stream_id: usize,

    write_head: AtomicU64,
    write_epoch: AtomicU64,
    consumer_tail: AtomicU64,
    monitor_tail: AtomicU64,
    monitor_active: AtomicBool,
    dropped: AtomicU64,

    notify: Notify,
}

// SAFETY: `data_ptr` points into `_mmap`, which lives exactly as long as
// `self`. All reads/writes through it go through the atomics above
// (single producer, per-reader tail) so no two calls ever touch
// overlapping bytes concurrently in a way that races.
unsafe impl Send for FrameRing {}
unsafe impl Sync for FrameRing {}

impl FrameRing {
    /// Create a ring with `capacity_bytes` of record storage. Rounded
    /// down to a multiple of [`RING_ALIGN`] is not required by the
    /// caller; the ring itself never needs `capacity_bytes` to be
    /// aligned.
    pub fn new(capacity_bytes: u64, stream_id: usize) -> Result<Self, RuntimeError> {
        let mut mmap = MmapOptions::new()
            .len(capacity_bytes as usize)
            .map_anon()
            .map_err(RuntimeError::StorageIoFailure)?;
        let data_ptr = mmap.as_mut_ptr();
        Ok(FrameRing {
            _mmap: mmap,
            data_ptr,
            capacity: capacity_bytes,
            stream_id,
            write_head: AtomicU64::new(0),
            write_epoch: AtomicU64::new(0),
            consumer_tail: AtomicU64::new(0),
            monitor_tail: AtomicU64::new(0),
            monitor_active: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            notify: Notify::new(),
        })
    }

    /// The ring's total byte capacity, as given to `new`.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn tail_atomic(&self, reader: ReaderKind) -> &AtomicU64 {
        match reader {
            ReaderKind::Consumer => &self.consumer_tail,
            ReaderKind::Monitor => &self.monitor_tail,
        }
    }

    /// Reset a reader's cursor to the ring's current write position.
    /// Called when the monitor tap is first acquired: a monitor that
    /// attaches mid-stream sees only frames produced from then on.
    pub fn reset_cursor(&self, reader: ReaderKind) {
        let head = self.write_head.load(Ordering::Acquire);
        self.tail_atomic(reader).store(head, Ordering::Release);
        if reader == ReaderKind::Monitor {
            self.monitor_active.store(true, Ordering::Relaxed);
        }
    }

    /// Number of frames dropped so far because the gating reader could
    /// not keep up.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    unsafe fn write_prefix(&self, offset: u64, value: u64) {
        let dst = self.data_ptr.add(offset as usize) as *mut [u8; 8];
        *dst = value.to_le_bytes();
    }

    /// Reserve space for one `payload_len`-byte record (already
    /// `align_up`-ed to [`RING_ALIGN`] by the caller — this is exactly
    /// `VideoFrameHeader::bytes_of_frame`), fill it via `fill`, and
    /// publish it. Returns `false` without calling `fill` if the gating
    /// reader (the storage consumer) has not drained enough space; the
    /// caller must count this as a drop.
    ///
    /// Combines reserving space and filling it into one call: there is
    /// exactly one producer per ring, so there is nothing a separate
    /// "commit" call could let the caller do that this closure can't.
    pub fn write_record(&self, payload_len: u64, fill: impl FnOnce(&mut [u8])) -> bool {
        debug_assert_eq!(payload_len % RING_ALIGN, 0, "caller must pre-align records");

        let slot_len = PREFIX_BYTES + payload_len;
        let head = self.write_head.load(Ordering::Relaxed);
        let tail = self.consumer_tail.load(Ordering::Acquire);
        let used = head - tail;
        let free = self.capacity.saturating_sub(used);

        let offset = head % self.capacity;
        let until_wrap = self.capacity - offset;

        let (write_offset, advance) = if until_wrap < slot_len {
            let needed = until_wrap + slot_len;
            if free < needed {
                self.record_drop();
                return false;
            }
            (0, needed)
        } else {
            if free < slot_len {
                self.record_drop();
                return false;
            }
            (offset, slot_len)
        };

        self.write_epoch.fetch_add(1, Ordering::AcqRel);

        // SAFETY: `write_offset + slot_len <= capacity`, and `used < capacity`
        // guarantees nothing in `[write_offset, write_offset + slot_len)`
        // is still owned by a reader.
        unsafe {
            if write_offset == 0 && until_wrap < slot_len {
                self.write_prefix(offset, PAD_BIT | (until_wrap - PREFIX_BYTES));
            }
            self.write_prefix(write_offset, payload_len);
            let payload_ptr = self.data_ptr.add((write_offset + PREFIX_BYTES) as usize);
            let payload = std::slice::from_raw_parts_mut(payload_ptr, payload_len as usize);
            fill(payload);
        }

        self.write_head.fetch_add(advance, Ordering::Release);
        self.write_epoch.fetch_add(1, Ordering::Release);
        self.notify.notify_waiters();
        true
    }

    fn record_drop(&self) {
        let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(stream_id = self.stream_id, dropped = n, "Dropped {n}");
    }

    /// The contiguous slice of unread bytes for `reader`, from its cursor
    /// up to either the writer's current head or the end of the backing
    /// region, whichever comes first. Empty if nothing is unread.
    ///
    /// For the monitor, the cursor is clamped forward to the writer's
    /// oldest-still-valid boundary first if it has fallen behind by more
    /// than the ring's capacity: the monitor skips ahead, it is never
    /// blocked and never errors.
    pub fn map_read(&self, reader: ReaderKind) -> &[u8] {
        let head = self.write_head.load(Ordering::Acquire);

        if reader == ReaderKind::Monitor {
            let oldest_valid = head.saturating_sub(self.capacity);
            let tail = self.monitor_tail.load(Ordering::Acquire);
            if tail < oldest_valid {
                self.monitor_tail.store(oldest_valid, Ordering::Release);
            }
        }

        let tail = self.tail_atomic(reader).load(Ordering::Acquire);
        let avail = head.saturating_sub(tail);
        if avail == 0 {
            return &[];
        }

        let offset = (tail % self.capacity) as usize;
        let until_wrap = self.capacity as usize - offset;
        let len = avail.min(until_wrap as u64) as usize;

        // SAFETY: `offset + len <= capacity`, and `avail` bytes starting
        // at `tail` have already been committed (`write_head` only
        // advances past a record after `fill` has run).
        unsafe { std::slice::from_raw_parts(self.data_ptr.add(offset), len) }
    }

    /// Advance `reader`'s cursor by `nbytes`, which must be a multiple of
    /// [`RING_ALIGN`].
    pub fn unmap_read(&self, reader: ReaderKind, nbytes: u64) -> Result<(), RuntimeError> {
        if nbytes % RING_ALIGN != 0 {
            return Err(RuntimeError::UnmapNotAligned(nbytes));
        }
        self.tail_atomic(reader).fetch_add(nbytes, Ordering::Release);
        Ok(())
    }

    /// Wait until a commit has happened since this call started, or
    /// return immediately if data is already available to `reader`.
    pub async fn wait_for_data(&self, reader: ReaderKind) {
        if !self.map_read(reader).is_empty() {
            return;
        }
        self.notify.notified().await;
    }

    /// `true` if a monitor has ever attached (`reset_cursor(Monitor)` was
    /// called). Lets the pipeline avoid walking the monitor cursor at all
    /// until the host has asked for one.
    pub fn monitor_active(&self) -> bool {
        self.monitor_active.load(Ordering::Relaxed)
    }

    /// Snapshot the consumer's unread bytes into an owned `Vec`,
    /// retrying if a write was in progress mid-read. Used only by tests
    /// and diagnostics; the pipeline drains via `map_read`/`unmap_read`.
    #[cfg(test)]
    fn read_snapshot_for_test(&self, reader: ReaderKind) -> Vec<u8> {
        use std::sync::atomic::fence;
        loop {
            let epoch_before = self.write_epoch.load(Ordering::Acquire);
            if epoch_before % 2 != 0 {
                std::hint::spin_loop();
                continue;
            }
            let slice = self.map_read(reader);
            let copy = slice.to_vec();
            fence(Ordering::SeqCst);
            let epoch_after = self.write_epoch.load(Ordering::Acquire);
            if epoch_before == epoch_after {
                return copy;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daq_core::align_up;

    fn write_one(ring: &FrameRing, payload: &[u8]) -> bool {
        let len = align_up(payload.len() as u64, RING_ALIGN);
        ring.write_record(len, |dst| {
            dst[..payload.len()].copy_from_slice(payload);
        })
    }

    #[test]
    fn records_land_on_eight_byte_boundaries() {
        let ring = FrameRing::new(4096, 0).unwrap();
        assert!(write_one(&ring, b"hello"));
        assert!(write_one(&ring, b"a bit longer payload"));

        let slice = ring.map_read(ReaderKind::Consumer);
        let mut offset = 0u64;
        let mut seen = 0;
        let mut remaining = slice;
        while let Some(entry) = next_entry(remaining) {
            assert_eq!(offset % RING_ALIGN, 0);
            if let RingEntry::Record { total_len, .. } = entry {
                seen += 1;
                offset += total_len;
                remaining = &remaining[total_len as usize..];
            } else {
                unreachable!("no pad expected in a fresh, non-wrapping ring");
            }
        }
        assert_eq!(seen, 2);
    }

    #[test]
    fn unmap_read_rejects_misaligned_count() {
        let ring = FrameRing::new(4096, 0).unwrap();
        assert!(write_one(&ring, b"hello"));
        let err = ring.unmap_read(ReaderKind::Consumer, 7).unwrap_err();
        assert!(matches!(err, RuntimeError::UnmapNotAligned(7)));
    }

    #[test]
    fn wrap_around_inserts_a_skippable_pad() {
        // Small ring: a second 48-byte record won't fit before the end,
        // forcing a pad-then-wrap.
        let ring = FrameRing::new(64, 0).unwrap();
        let payload = vec![0xABu8; 40];
        assert!(write_one(&ring, &payload));
        // Drain so the gating reader doesn't block the next write.
        let n = ring.map_read(ReaderKind::Consumer).len() as u64;
        ring.unmap_read(ReaderKind::Consumer, n).unwrap();

        assert!(write_one(&ring, &payload));
        let slice = ring.map_read(ReaderKind::Consumer);
        let first = next_entry(slice).unwrap();
        assert!(matches!(first, RingEntry::Pad { .. }) || matches!(first, RingEntry::Record { .. }));
    }

    #[test]
    fn writer_drops_frame_when_consumer_has_not_drained() {
        let ring = FrameRing::new(64, 0).unwrap();
        let payload = vec![0u8; 48];
        assert!(write_one(&ring, &payload));
        // Consumer never drains: the next record can't fit.
        assert!(!write_one(&ring, &payload));
        assert_eq!(ring.dropped_count(), 1);
    }

    #[test]
    fn monitor_skips_ahead_without_blocking_or_erroring() {
        let ring = FrameRing::new(256, 0).unwrap();
        ring.reset_cursor(ReaderKind::Monitor);
        assert!(ring.monitor_active());

        let payload = vec![0u8; 48];
        for _ in 0..10 {
            assert!(write_one(&ring, &payload));
            let n = ring.map_read(ReaderKind::Consumer).len() as u64;
            ring.unmap_read(ReaderKind::Consumer, n).unwrap();
        }

        // Monitor never called map_read while the writer lapped it
        // repeatedly; it must still succeed and simply see a clamped,
        // non-empty (or empty, if fully caught up) slice, never panic
        // or block.
        let slice = ring.map_read(ReaderKind::Monitor);
        let _ = slice.len();
    }

    #[test]
    fn read_snapshot_round_trips_payload() {
        let ring = FrameRing::new(4096, 0).unwrap();
        assert!(write_one(&ring, b"round trip me"));
        let snapshot = ring.read_snapshot_for_test(ReaderKind::Consumer);
        match next_entry(&snapshot).unwrap() {
            RingEntry::Record { payload, .. } => {
                assert_eq!(&payload[..b"round trip me".len()], b"round trip me");
            }
            RingEntry::Pad { .. } => panic!("expected a record"),
        }
    }
}
