//! The producer task: polls a camera and commits frames into its stream's ring.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use daq_core::{align_up, header_bytes, FrameTimestamp, RuntimeResult, VideoFrameHeader, FRAME_ALIGN};
use daq_plugin_api::{Camera, FramePoll};
use daq_ring::FrameRing;

/// Brief yield between two "no frame ready yet" polls, so the producer
/// doesn't spin a core while waiting on a free-running camera.
const AGAIN_BACKOFF: Duration = Duration::from_micros(100);

/// One `execute_trigger` call routed into the producer task, since it
/// alone holds `&mut Box<dyn Camera>` while the stream is running.
pub struct TriggerRequest {
    pub respond: oneshot::Sender<RuntimeResult<()>>,
}

/// What the producer hands back once its loop exits, so the caller can
/// resume driving the camera's lifecycle (`stop`/`destroy`).
pub struct ProducerFinished {
    pub camera: Box<dyn Camera>,
    pub frames_written: u64,
}

/// Drive `camera` into `ring` until `max_frame_count` frames have been
/// committed (0 means unbounded) or `stop` is cancelled.
///
/// `frame_id` advances on every attempt, committed or dropped, so gaps in
/// the committed sequence correspond exactly to the ring's drop count.
pub async fn run(
    stream_id: usize,
    ring: Arc<FrameRing>,
    mut camera: Box<dyn Camera>,
    max_frame_count: u64,
    stop: CancellationToken,
    done: watch::Sender<bool>,
    mut trigger_rx: mpsc::UnboundedReceiver<TriggerRequest>,
) -> ProducerFinished {
    let shape = camera.get_shape();
    let payload_cap = shape.bytes_of_image().unwrap_or(0) as usize;
    let mut scratch = vec![0u8; payload_cap];

    let mut frame_id: u64 = 0;
    let mut frames_written: u64 = 0;

    'outer: loop {
        if max_frame_count != 0 && frames_written >= max_frame_count {
            break;
        }

        while let Ok(TriggerRequest { respond }) = trigger_rx.try_recv() {
            let result = camera.execute_trigger().await;
            let _ = respond.send(result);
        }

        let poll = tokio::select! {
            biased;
            _ = stop.cancelled() => break 'outer,
            p = camera.get_frame(&mut scratch) => p,
        };

        match poll {
            FramePoll::Again => {
                tokio::select! {
                    _ = stop.cancelled() => break 'outer,
                    _ = tokio::time::sleep(AGAIN_BACKOFF) => {}
                }
            }
            FramePoll::Error(message) => {
                error!(stream_id, error = %message, "camera reported a fatal error, stopping producer");
                break 'outer;
            }
            FramePoll::Ready { nbytes, timestamp } => {
                commit_frame(
                    stream_id,
                    &ring,
                    &mut frame_id,
                    &mut frames_written,
                    shape,
                    timestamp,
                    &scratch[..nbytes],
                );
                // A camera that never yields (e.g. a synchronous simulator) would
                // otherwise starve the stop signal on a single-threaded runtime.
                tokio::task::yield_now().await;
            }
        }
    }

    let _ = done.send(true);
    debug!(stream_id, frames_written, "producer stopped");
    ProducerFinished { camera, frames_written }
}

fn commit_frame(
    stream_id: usize,
    ring: &FrameRing,
    frame_id: &mut u64,
    frames_written: &mut u64,
    shape: daq_core::ImageShape,
    timestamp: FrameTimestamp,
    payload: &[u8],
) {
    let header = match VideoFrameHeader::new(shape, stream_id, *frame_id, timestamp) {
        Ok(h) => h,
        Err(e) => {
            error!(stream_id, error = %e, "could not build frame header, dropping frame");
            *frame_id += 1;
            return;
        }
    };
    *frame_id += 1;

    debug_assert_eq!(header.bytes_of_frame, align_up(header_bytes() + payload.len() as u64, FRAME_ALIGN));

    let committed = ring.write_record(header.bytes_of_frame, |dst| {
        header.write_into(dst, payload);
    });
    if committed {
        *frames_written += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daq_core::{CameraProperties, DeviceState, SampleType};
    use daq_drivers_sim::SimCamera;

    async fn armed_camera(w: u32, h: u32) -> Box<dyn Camera> {
        let mut cam = SimCamera::empty();
        let mut props = CameraProperties::default();
        props.frame_shape_px = (w, h);
        props.sample_type = SampleType::U8;
        assert_eq!(cam.set(props).await, DeviceState::Armed);
        assert_eq!(cam.start().await, DeviceState::Running);
        Box::new(cam)
    }

    #[tokio::test]
    async fn commits_exactly_max_frame_count_frames() {
        let ring = Arc::new(FrameRing::new(1 << 20, 0).unwrap());
        let camera = armed_camera(16, 16).await;
        let stop = CancellationToken::new();
        let (done_tx, _done_rx) = watch::channel(false);
        let (_trigger_tx, trigger_rx) = mpsc::unbounded_channel();

        let finished = run(0, ring.clone(), camera, 10, stop, done_tx, trigger_rx).await;
        assert_eq!(finished.frames_written, 10);
    }

    #[tokio::test]
    async fn stop_token_halts_an_unbounded_run() {
        let ring = Arc::new(FrameRing::new(1 << 20, 0).unwrap());
        let camera = armed_camera(8, 8).await;
        let stop = CancellationToken::new();
        let (done_tx, _done_rx) = watch::channel(false);
        let (_trigger_tx, trigger_rx) = mpsc::unbounded_channel();

        let stop_clone = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stop_clone.cancel();
        });

        let finished = run(0, ring.clone(), camera, 0, stop, done_tx, trigger_rx).await;
        assert!(finished.frames_written > 0);
    }

    #[tokio::test]
    async fn trigger_request_reaches_the_camera_while_running() {
        let ring = Arc::new(FrameRing::new(1 << 20, 0).unwrap());
        let camera = armed_camera(8, 8).await;
        let stop = CancellationToken::new();
        let (done_tx, _done_rx) = watch::channel(false);
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();

        let stop_clone = stop.clone();
        let handle = tokio::spawn(run(0, ring.clone(), camera, 0, stop, done_tx, trigger_rx));

        let (respond_tx, respond_rx) = oneshot::channel();
        trigger_tx.send(TriggerRequest { respond: respond_tx }).unwrap();
        let result = respond_rx.await.unwrap();
        assert!(result.is_ok());

        stop_clone.cancel();
        handle.await.unwrap();
    }
}
