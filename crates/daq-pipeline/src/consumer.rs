//! The consumer task: drains a stream's ring into its storage sink.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use daq_core::DeviceState;
use daq_plugin_api::Storage;
use daq_ring::{next_entry, FrameRing, ReaderKind, RingEntry};

/// What the consumer hands back once its loop exits, so the caller can
/// resume driving the storage sink's lifecycle (`stop`/`destroy`).
pub struct ConsumerFinished {
    pub storage: Box<dyn Storage>,
    /// The sink's state when the loop exited. Anything other than
    /// `Running` means the sink itself terminated the stream.
    pub terminal_state: DeviceState,
}

/// Drain `ring`'s consumer cursor into `storage` until `abort` is
/// cancelled, or until the ring is empty and the producer (signalled via
/// `producer_done`) has finished, or until `storage.append` reports a
/// state other than `Running`.
pub async fn run(
    stream_id: usize,
    ring: Arc<FrameRing>,
    mut storage: Box<dyn Storage>,
    abort: CancellationToken,
    mut producer_done: watch::Receiver<bool>,
) -> ConsumerFinished {
    let mut terminal_state = DeviceState::Running;

    'outer: loop {
        if abort.is_cancelled() {
            break;
        }

        let slice = ring.map_read(ReaderKind::Consumer);
        if slice.is_empty() {
            if *producer_done.borrow() {
                break;
            }
            tokio::select! {
                biased;
                _ = abort.cancelled() => break 'outer,
                _ = ring.wait_for_data(ReaderKind::Consumer) => {}
                _ = producer_done.changed() => {}
            }
            continue;
        }

        let mut consumed = 0u64;
        let mut remaining = slice;
        while let Some(entry) = next_entry(remaining) {
            match entry {
                RingEntry::Pad { total_len } => {
                    consumed += total_len;
                    remaining = &remaining[total_len as usize..];
                }
                RingEntry::Record { payload, total_len } => {
                    let (state, _nbytes) = storage.append(payload).await;
                    consumed += total_len;
                    remaining = &remaining[total_len as usize..];
                    if state != DeviceState::Running {
                        warn!(stream_id, ?state, "storage sink left Running, terminating consumer");
                        terminal_state = state;
                        let _ = ring.unmap_read(ReaderKind::Consumer, consumed);
                        break 'outer;
                    }
                }
            }
        }
        let _ = ring.unmap_read(ReaderKind::Consumer, consumed);
    }

    debug!(stream_id, ?terminal_state, "consumer stopped");
    ConsumerFinished { storage, terminal_state }
}
