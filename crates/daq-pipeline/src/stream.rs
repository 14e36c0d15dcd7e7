//! One stream's producer/consumer pair, spawned and joined as a unit.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use daq_core::{DeviceState, RuntimeError, RuntimeResult};
use daq_plugin_api::{Camera, Storage};
use daq_ring::{FrameRing, ReaderKind};

use crate::consumer::{self, ConsumerFinished};
use crate::producer::{self, ProducerFinished, TriggerRequest};

/// How [`StreamPipeline::join`] should terminate the running tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Producer stops taking new frames; consumer drains the remainder of
    /// the ring before exiting.
    Graceful,
    /// Producer and consumer both exit as soon as possible; any unread
    /// records left in the ring are discarded.
    Abort,
}

/// The outcome of running one stream to completion: the devices handed
/// back (so the caller can finish their lifecycle), the terminal storage
/// state, and the number of frames committed.
pub struct PipelineOutcome {
    pub camera: Box<dyn Camera>,
    pub storage: Box<dyn Storage>,
    pub terminal_storage_state: DeviceState,
    pub frames_written: u64,
    pub dropped: u64,
}

/// A running producer/consumer pair for one stream.
pub struct StreamPipeline {
    ring: Arc<FrameRing>,
    stop: CancellationToken,
    abort: CancellationToken,
    trigger_tx: mpsc::UnboundedSender<TriggerRequest>,
    producer: JoinHandle<ProducerFinished>,
    consumer: JoinHandle<ConsumerFinished>,
}

impl StreamPipeline {
    /// Spawn the producer and consumer tasks for one stream. `camera` and
    /// `storage` must already be `Running` (the controller transitions
    /// devices to `Running` before calling this).
    pub fn spawn(
        stream_id: usize,
        ring: Arc<FrameRing>,
        camera: Box<dyn Camera>,
        storage: Box<dyn Storage>,
        max_frame_count: u64,
    ) -> Self {
        let stop = CancellationToken::new();
        let abort = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();

        let producer = tokio::spawn(producer::run(
            stream_id,
            ring.clone(),
            camera,
            max_frame_count,
            stop.clone(),
            done_tx,
            trigger_rx,
        ));
        let consumer = tokio::spawn(consumer::run(stream_id, ring.clone(), storage, abort.clone(), done_rx));

        StreamPipeline { ring, stop, abort, trigger_tx, producer, consumer }
    }

    /// Route one `execute_trigger` call into the running producer task,
    /// which alone holds the camera while the stream is running.
    pub async fn execute_trigger(&self) -> RuntimeResult<()> {
        let (respond_tx, respond_rx) = oneshot::channel();
        self.trigger_tx
            .send(TriggerRequest { respond: respond_tx })
            .map_err(|_| RuntimeError::LifecycleMisuse("producer task has already exited".to_string()))?;
        respond_rx
            .await
            .map_err(|_| RuntimeError::LifecycleMisuse("producer task exited before responding to the trigger".to_string()))?
    }

    /// Graceful stop: the producer stops taking new frames and the
    /// consumer drains whatever remains in the ring before both tasks
    /// join.
    pub async fn join(self, termination: Termination) -> PipelineOutcome {
        self.stop.cancel();
        if termination == Termination::Abort {
            self.abort.cancel();
        }

        let producer_finished = match self.producer.await {
            Ok(f) => f,
            Err(e) => panic!("producer task panicked: {e}"),
        };
        let consumer_finished = match self.consumer.await {
            Ok(f) => f,
            Err(e) => panic!("consumer task panicked: {e}"),
        };

        if termination == Termination::Abort {
            // Discard anything left unread: jump both reader cursors to
            // the writer's current head.
            self.ring.reset_cursor(ReaderKind::Consumer);
            if self.ring.monitor_active() {
                self.ring.reset_cursor(ReaderKind::Monitor);
            }
        }

        let dropped = self.ring.dropped_count();
        if dropped > 0 {
            warn!(dropped, "stream completed with dropped frames");
        }

        PipelineOutcome {
            camera: producer_finished.camera,
            storage: consumer_finished.storage,
            terminal_storage_state: consumer_finished.terminal_state,
            frames_written: producer_finished.frames_written,
            dropped,
        }
    }
}
