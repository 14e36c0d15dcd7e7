//! `Runtime`: the global lifecycle state machine and the public command
//! surface the host drives.

use std::sync::Arc;

use tokio::time::timeout;
use tracing::{info, warn};

use daq_core::{
    DeviceIdentifier, DeviceKind, PropertyMetadata, RuntimeError, RuntimeProperties, RuntimeResult,
};
use daq_plugin_api::DeviceManager;
use daq_pipeline::{StreamPipeline, Termination};
use daq_ring::{FrameRing, ReaderKind};

use crate::reconcile::{reconcile_stream, StreamDevices};
use crate::settings::RuntimeSettings;

/// The controller's global lifecycle:
/// `Uninit -> Idle -> Configured -> Armed -> Running -> Armed ->
/// (Configured|Idle) -> Uninit`.
/// `Armed` and `Configured` are collapsed into one state here since this
/// implementation applies devices during `configure` itself (there is no
/// separate "staged but not yet device-applied" state to model).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobalState {
    Uninit,
    Idle,
    Configured,
    Running,
}

struct StreamSlot {
    properties: daq_core::VideoStreamProperties,
    devices: Option<StreamDevices>,
    /// The identifiers `devices` was opened under, kept alive across the
    /// `Running` window where `start` has moved `devices` into the
    /// pipeline and this slot's own copy is temporarily `None`.
    active_ids: Option<(DeviceIdentifier, DeviceIdentifier)>,
    ring: Option<Arc<FrameRing>>,
    pipeline: Option<StreamPipeline>,
}

impl StreamSlot {
    fn new() -> Self {
        StreamSlot {
            properties: daq_core::VideoStreamProperties::default(),
            devices: None,
            active_ids: None,
            ring: None,
            pipeline: None,
        }
    }
}

/// Owns the device manager and every stream slot; enforces the global
/// lifecycle and is the sole entry point the host drives.
pub struct Runtime {
    manager: DeviceManager,
    streams: Vec<StreamSlot>,
    settings: RuntimeSettings,
    state: GlobalState,
}

impl Runtime {
    /// `Uninit -> Idle`: create the device manager, register built-in
    /// drivers, load process settings.
    pub fn init() -> RuntimeResult<Self> {
        let mut manager = DeviceManager::new();
        daq_drivers_sim::register_builtin_drivers(&mut manager);
        let settings = RuntimeSettings::load()?;
        info!(ring_queue_depth_frames = settings.ring_queue_depth_frames, "runtime initialized");
        Ok(Runtime {
            manager,
            streams: Vec::new(),
            settings,
            state: GlobalState::Idle,
        })
    }

    fn require_state(&self, allowed: &[GlobalState], op: &str) -> RuntimeResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(RuntimeError::LifecycleMisuse(format!(
                "{op} is not valid in state {:?}",
                self.state
            )))
        }
    }

    /// Accept a requested configuration, reconciling each stream.
    /// Rejects while `Running`; on partial failure, streams already
    /// reconciled in this call stay applied — a per-stream "report
    /// failure and leave previous device state" rule, scoped to the
    /// stream that actually failed.
    pub async fn configure(&mut self, properties: &mut RuntimeProperties) -> RuntimeResult<()> {
        self.require_state(&[GlobalState::Idle, GlobalState::Configured], "configure")?;

        if self.streams.len() != properties.streams.len() {
            self.streams = (0..properties.streams.len()).map(|_| StreamSlot::new()).collect();
        }

        for (stream_id, (slot, requested)) in
            self.streams.iter_mut().zip(properties.streams.iter_mut()).enumerate()
        {
            let previous = slot.devices.take();
            let (devices, _meta) = reconcile_stream(&mut self.manager, previous, requested).await?;
            slot.properties = requested.clone();

            if let Some(devices) = &devices {
                slot.active_ids = Some((devices.camera_id.clone(), devices.storage_id.clone()));
                let needed_capacity = self.settings.ring_capacity_for(devices.camera.get_shape())?;
                let already_sized = slot.ring.as_ref().is_some_and(|ring| ring.capacity() == needed_capacity);
                if !already_sized {
                    slot.ring = Some(Arc::new(FrameRing::new(needed_capacity, stream_id)?));
                }
            } else {
                slot.active_ids = None;
                slot.ring = None;
            }
            slot.devices = devices;
        }

        self.state = GlobalState::Configured;
        Ok(())
    }

    /// Report the currently applied configuration.
    pub fn get_configuration(&self) -> RuntimeProperties {
        RuntimeProperties {
            streams: self.streams.iter().map(|s| s.properties.clone()).collect(),
        }
    }

    /// Report per-stream observable metadata, recomputed from the
    /// currently open devices.
    pub fn get_configuration_metadata(&self) -> PropertyMetadata {
        let streams = self
            .streams
            .iter()
            .map(|slot| match &slot.devices {
                None => daq_core::StreamMetadata::default(),
                Some(devices) => {
                    let camera_meta = devices.camera.get_meta();
                    let storage_meta = devices.storage.get_meta();
                    daq_core::StreamMetadata {
                        camera: devices.camera_id.clone(),
                        storage: devices.storage_id.clone(),
                        shape_range: camera_meta.shape_range,
                        supported_trigger_sources: camera_meta.supported_trigger_sources,
                        supports_chunking: storage_meta.supports_chunking,
                        supports_sharding: storage_meta.supports_sharding,
                        supports_multiscale: storage_meta.supports_multiscale,
                        supports_s3: storage_meta.supports_s3,
                    }
                }
            })
            .collect();
        PropertyMetadata { streams }
    }

    /// Transition every active stream's devices `Armed -> Running` and
    /// spawn its producer/consumer pair.
    pub async fn start(&mut self) -> RuntimeResult<()> {
        self.require_state(&[GlobalState::Configured], "start")?;

        for (stream_id, slot) in self.streams.iter_mut().enumerate() {
            let Some(mut devices) = slot.devices.take() else {
                continue;
            };
            let ring = slot.ring.clone().expect("an active stream always owns a ring after configure");

            devices.camera.start().await;
            devices.storage.start().await;

            let max_frame_count = slot.properties.max_frame_count;
            slot.pipeline = Some(StreamPipeline::spawn(
                stream_id,
                ring,
                devices.camera,
                devices.storage,
                max_frame_count,
            ));
        }

        self.state = GlobalState::Running;
        Ok(())
    }

    async fn join_all(&mut self, termination: Termination) -> RuntimeResult<()> {
        for slot in self.streams.iter_mut() {
            let Some(pipeline) = slot.pipeline.take() else {
                continue;
            };
            let join = pipeline.join(termination);
            let outcome = match timeout(self.settings.join_timeout(), join).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!("stream join timed out, escalating is not yet re-entrant: proceeding with whatever joined");
                    continue;
                }
            };

            let mut camera = outcome.camera;
            let mut storage = outcome.storage;
            camera.stop().await;
            if outcome.terminal_storage_state == daq_core::DeviceState::Running {
                storage.stop().await;
            }

            let (camera_id, storage_id) = slot
                .active_ids
                .clone()
                .expect("a joined pipeline's slot always has the ids it was started with");
            slot.devices = Some(StreamDevices {
                camera_id,
                camera,
                storage_id,
                storage,
            });
        }
        Ok(())
    }

    /// Graceful stop: producer stops on target count (or immediately if
    /// asked), consumer drains the remainder, both tasks join.
    pub async fn stop(&mut self) -> RuntimeResult<()> {
        if self.state != GlobalState::Running {
            return Ok(());
        }
        self.join_all(Termination::Graceful).await?;
        self.state = GlobalState::Configured;
        Ok(())
    }

    /// Forced teardown: cancel immediately, discard unread ring contents.
    pub async fn abort(&mut self) -> RuntimeResult<()> {
        if self.state != GlobalState::Running {
            return Ok(());
        }
        self.join_all(Termination::Abort).await?;
        self.state = GlobalState::Configured;
        Ok(())
    }

    /// Force one triggered acquisition on `stream_id` (only meaningful
    /// while the stream is `Running`: the producer task owns the camera
    /// for the whole window, so the request is routed into it rather than
    /// reaching into the stream's devices directly).
    pub async fn execute_trigger(&mut self, stream_id: usize) -> RuntimeResult<()> {
        let slot = self
            .streams
            .get(stream_id)
            .ok_or(RuntimeError::StreamIndexOutOfRange(stream_id))?;
        match &slot.pipeline {
            Some(pipeline) => pipeline.execute_trigger().await,
            None => Err(RuntimeError::LifecycleMisuse(
                "execute_trigger on a stream that is not running".to_string(),
            )),
        }
    }

    /// The live-preview tap: lazily attaches on first call, never gates
    /// the producer.
    pub fn map_read(&self, stream_id: usize) -> RuntimeResult<&[u8]> {
        let ring = self.monitor_ring(stream_id)?;
        if !ring.monitor_active() {
            ring.reset_cursor(ReaderKind::Monitor);
        }
        Ok(ring.map_read(ReaderKind::Monitor))
    }

    /// Advance the monitor cursor by `nbytes` (must be a multiple of the
    /// ring's alignment).
    pub fn unmap_read(&self, stream_id: usize, nbytes: u64) -> RuntimeResult<()> {
        self.monitor_ring(stream_id)?.unmap_read(ReaderKind::Monitor, nbytes)
    }

    fn monitor_ring(&self, stream_id: usize) -> RuntimeResult<&FrameRing> {
        self.streams
            .get(stream_id)
            .ok_or(RuntimeError::StreamIndexOutOfRange(stream_id))?
            .ring
            .as_deref()
            .ok_or_else(|| RuntimeError::LifecycleMisuse("stream has no ring (inactive or not yet configured)".to_string()))
    }

    /// Read-only access to the device manager (e.g. for `device_manager_select`).
    pub fn device_manager(&self) -> &DeviceManager {
        &self.manager
    }

    /// Resolve `(kind, pattern)` against the device manager without
    /// opening the device.
    pub fn device_manager_select(&self, kind: DeviceKind, pattern: &str) -> RuntimeResult<DeviceIdentifier> {
        self.manager.select(kind, pattern)
    }

    /// Abort if running, destroy every open device, and release drivers.
    pub async fn shutdown(mut self) -> RuntimeResult<()> {
        if self.state == GlobalState::Running {
            self.abort().await?;
        }
        for slot in self.streams.iter_mut() {
            if let Some(mut devices) = slot.devices.take() {
                devices.storage.destroy().await;
                self.manager.close(&devices.camera_id);
                self.manager.close(&devices.storage_id);
            }
        }
        self.state = GlobalState::Uninit;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daq_core::{CameraProperties, DeviceKind, SampleType, StorageProperties, VideoStreamProperties};
    use tempfile::TempDir;

    fn two_stream_request(dir: &TempDir) -> RuntimeProperties {
        let mut props = RuntimeProperties::with_capacity(2);
        props.streams[0] = VideoStreamProperties {
            camera_id: DeviceIdentifier::new(DeviceKind::Camera, "simulated: uniform random"),
            camera: CameraProperties {
                frame_shape_px: (16, 16),
                sample_type: SampleType::U8,
                exposure_us: 1,
                ..Default::default()
            },
            storage_id: DeviceIdentifier::new(DeviceKind::Storage, "trash"),
            max_frame_count: 5,
            ..Default::default()
        };
        props.streams[1] = VideoStreamProperties {
            camera_id: DeviceIdentifier::new(DeviceKind::Camera, "simulated: empty"),
            camera: CameraProperties {
                frame_shape_px: (8, 8),
                sample_type: SampleType::U8,
                exposure_us: 1,
                ..Default::default()
            },
            storage_id: DeviceIdentifier::new(DeviceKind::Storage, "raw"),
            storage: StorageProperties {
                uri: dir.path().join("stream1.bin").to_string_lossy().to_string(),
                ..Default::default()
            },
            max_frame_count: 5,
            ..Default::default()
        };
        props
    }

    #[tokio::test]
    async fn configure_start_stop_shutdown_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut runtime = Runtime::init().unwrap();
        let mut request = two_stream_request(&dir);
        runtime.configure(&mut request).await.unwrap();

        let metadata = runtime.get_configuration_metadata();
        assert_eq!(metadata.streams[0].camera.name, "simulated: uniform random");
        assert_eq!(metadata.streams[1].storage.name, "raw");

        runtime.start().await.unwrap();
        runtime.stop().await.unwrap();
        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn start_while_already_running_is_a_lifecycle_error() {
        let dir = TempDir::new().unwrap();
        let mut runtime = Runtime::init().unwrap();
        let mut request = two_stream_request(&dir);
        runtime.configure(&mut request).await.unwrap();
        runtime.start().await.unwrap();

        let err = runtime.start().await.unwrap_err();
        assert!(matches!(err, RuntimeError::LifecycleMisuse(_)));

        runtime.stop().await.unwrap();
        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn repeat_start_stop_without_monitor_completes_twice() {
        let dir = TempDir::new().unwrap();
        let mut runtime = Runtime::init().unwrap();
        let mut request = RuntimeProperties::with_capacity(2);
        request.streams[0] = VideoStreamProperties {
            camera_id: DeviceIdentifier::new(DeviceKind::Camera, "simulated: empty"),
            camera: CameraProperties {
                frame_shape_px: (32, 32),
                sample_type: SampleType::U16,
                exposure_us: 1,
                ..Default::default()
            },
            storage_id: DeviceIdentifier::new(DeviceKind::Storage, "trash"),
            max_frame_count: 50,
            ..Default::default()
        };
        let _ = &dir;

        for _ in 0..2 {
            runtime.configure(&mut request).await.unwrap();
            runtime.start().await.unwrap();
            runtime.stop().await.unwrap();
        }
        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn execute_trigger_succeeds_only_while_running() {
        let dir = TempDir::new().unwrap();
        let mut runtime = Runtime::init().unwrap();
        let mut request = two_stream_request(&dir);
        request.streams[0].max_frame_count = 0;
        runtime.configure(&mut request).await.unwrap();

        let err = runtime.execute_trigger(0).await.unwrap_err();
        assert!(matches!(err, RuntimeError::LifecycleMisuse(_)));

        runtime.start().await.unwrap();
        runtime.execute_trigger(0).await.unwrap();

        runtime.abort().await.unwrap();
        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn execute_trigger_on_out_of_range_stream_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut runtime = Runtime::init().unwrap();
        let mut request = two_stream_request(&dir);
        runtime.configure(&mut request).await.unwrap();

        let err = runtime.execute_trigger(99).await.unwrap_err();
        assert!(matches!(err, RuntimeError::StreamIndexOutOfRange(99)));

        runtime.shutdown().await.unwrap();
    }
}
