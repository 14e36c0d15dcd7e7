//! Property reconciliation: resolve a requested [`VideoStreamProperties`]
//! against the device manager, apply it to the stream's devices, and
//! report back what was actually applied.

use daq_core::{
    DeviceIdentifier, DeviceKind, DeviceState, RuntimeError, RuntimeResult, StreamMetadata,
    VideoStreamProperties, DEFAULT_CAMERA_NAME, DEFAULT_STORAGE_NAME,
};
use daq_plugin_api::{Camera, DeviceManager, OpenedDevice, Storage};

/// One stream's open devices, plus the identifiers they were opened under.
pub struct StreamDevices {
    pub camera_id: DeviceIdentifier,
    pub camera: Box<dyn Camera>,
    pub storage_id: DeviceIdentifier,
    pub storage: Box<dyn Storage>,
}

/// Resolve the `(camera_id, storage_id)` a request should open, applying
/// the default-device rule: an unspecified role paired with a specified
/// one defaults to the built-in simulated camera or trash sink; both
/// unspecified leaves the stream inactive.
fn resolve_identifiers(
    manager: &DeviceManager,
    requested: &VideoStreamProperties,
) -> RuntimeResult<Option<(DeviceIdentifier, DeviceIdentifier)>> {
    if requested.is_inactive() {
        return Ok(None);
    }

    let camera_pattern = if requested.camera_id.is_none() {
        DEFAULT_CAMERA_NAME
    } else {
        requested.camera_id.name.as_str()
    };
    let storage_pattern = if requested.storage_id.is_none() {
        DEFAULT_STORAGE_NAME
    } else {
        requested.storage_id.name.as_str()
    };

    // `resolve`, not `select`: the candidate may be the device this very
    // stream already holds open from a previous `configure`, which would
    // make `select` report it busy against itself.
    let camera_id = manager.resolve(DeviceKind::Camera, camera_pattern)?;
    let storage_id = manager.resolve(DeviceKind::Storage, storage_pattern)?;
    Ok(Some((camera_id, storage_id)))
}

fn open_camera(manager: &mut DeviceManager, id: &DeviceIdentifier) -> RuntimeResult<Box<dyn Camera>> {
    match manager.open(id)? {
        OpenedDevice::Camera(camera) => Ok(camera),
        OpenedDevice::Storage(_) => unreachable!("device manager returned a storage device for a camera identifier"),
    }
}

fn open_storage(manager: &mut DeviceManager, id: &DeviceIdentifier) -> RuntimeResult<Box<dyn Storage>> {
    match manager.open(id)? {
        OpenedDevice::Storage(storage) => Ok(storage),
        OpenedDevice::Camera(_) => unreachable!("device manager returned a camera device for a storage identifier"),
    }
}

/// Reconcile and apply one stream's requested properties against
/// `manager`, reusing `previous`'s camera/storage when that role's
/// resolved identifier is unchanged — reconfiguring only storage must not
/// destroy and recreate the camera, and vice versa.
///
/// On success, mutates `requested` in place with the devices' effective
/// properties (an in-out `configure`) and returns the opened/reused
/// devices plus this stream's metadata. On rejection, any device this
/// call itself opened is closed again and `previous` is left untouched by
/// the caller.
pub async fn reconcile_stream(
    manager: &mut DeviceManager,
    previous: Option<StreamDevices>,
    requested: &mut VideoStreamProperties,
) -> RuntimeResult<(Option<StreamDevices>, StreamMetadata)> {
    let Some((camera_id, storage_id)) = resolve_identifiers(manager, requested)? else {
        if let Some(prev) = previous {
            manager.close(&prev.camera_id);
            manager.close(&prev.storage_id);
        }
        return Ok((None, StreamMetadata::default()));
    };

    let (mut camera, mut storage, prev_camera_closed, prev_storage_closed) = match previous {
        Some(prev) => {
            let reuse_camera = prev.camera_id == camera_id;
            let reuse_storage = prev.storage_id == storage_id;
            let camera = if reuse_camera {
                prev.camera
            } else {
                manager.close(&prev.camera_id);
                open_camera(manager, &camera_id)?
            };
            let storage = if reuse_storage {
                prev.storage
            } else {
                manager.close(&prev.storage_id);
                open_storage(manager, &storage_id)?
            };
            (camera, storage, !reuse_camera, !reuse_storage)
        }
        None => (open_camera(manager, &camera_id)?, open_storage(manager, &storage_id)?, true, true),
    };

    let camera_state = camera.set(requested.camera).await;
    if camera_state == DeviceState::AwaitingConfiguration {
        if prev_camera_closed {
            manager.close(&camera_id);
        }
        if prev_storage_closed {
            manager.close(&storage_id);
        }
        return Err(RuntimeError::ConfigurationRejected(format!(
            "camera {:?} rejected the requested properties",
            camera_id.name
        )));
    }
    requested.camera = camera.get();

    // The effective shape is handed to storage during configure, never
    // deferred to start.
    storage.reserve_image_shape(camera.get_shape());

    let storage_state = storage.set(requested.storage.clone()).await;
    if storage_state == DeviceState::AwaitingConfiguration {
        if prev_camera_closed {
            manager.close(&camera_id);
        }
        if prev_storage_closed {
            manager.close(&storage_id);
        }
        return Err(RuntimeError::ConfigurationRejected(format!(
            "storage {:?} rejected the requested properties",
            storage_id.name
        )));
    }
    requested.storage = storage.get();

    let camera_meta = camera.get_meta();
    let storage_meta = storage.get_meta();
    let meta = StreamMetadata {
        camera: camera_id.clone(),
        storage: storage_id.clone(),
        shape_range: camera_meta.shape_range,
        supported_trigger_sources: camera_meta.supported_trigger_sources,
        supports_chunking: storage_meta.supports_chunking,
        supports_sharding: storage_meta.supports_sharding,
        supports_multiscale: storage_meta.supports_multiscale,
        supports_s3: storage_meta.supports_s3,
    };

    Ok((
        Some(StreamDevices {
            camera_id,
            camera,
            storage_id,
            storage,
        }),
        meta,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use daq_core::{CameraProperties, StorageProperties};
    use daq_drivers_sim::register_builtin_drivers;

    fn manager() -> DeviceManager {
        let mut m = DeviceManager::new();
        register_builtin_drivers(&mut m);
        m
    }

    #[tokio::test]
    async fn unspecified_camera_defaults_to_builtin_simulator() {
        let mut m = manager();
        let mut requested = VideoStreamProperties {
            storage_id: DeviceIdentifier::new(DeviceKind::Storage, "trash"),
            storage: StorageProperties { uri: "ignored".into(), ..Default::default() },
            camera: CameraProperties { frame_shape_px: (4, 4), ..Default::default() },
            ..Default::default()
        };
        let (devices, meta) = reconcile_stream(&mut m, None, &mut requested).await.unwrap();
        assert!(devices.is_some());
        assert_eq!(meta.camera.name, DEFAULT_CAMERA_NAME);
    }

    #[tokio::test]
    async fn both_unspecified_leaves_stream_inactive() {
        let mut m = manager();
        let mut requested = VideoStreamProperties::default();
        let (devices, meta) = reconcile_stream(&mut m, None, &mut requested).await.unwrap();
        assert!(devices.is_none());
        assert!(meta.camera.is_none());
    }

    #[tokio::test]
    async fn reconfiguring_only_storage_keeps_the_same_camera_open() {
        let mut m = manager();
        let mut requested = VideoStreamProperties {
            camera_id: DeviceIdentifier::new(DeviceKind::Camera, "simulated: radial sin"),
            camera: CameraProperties { frame_shape_px: (4, 4), ..Default::default() },
            storage_id: DeviceIdentifier::new(DeviceKind::Storage, "trash"),
            ..Default::default()
        };
        let (devices, _) = reconcile_stream(&mut m, None, &mut requested).await.unwrap();

        requested.storage_id = DeviceIdentifier::new(DeviceKind::Storage, "raw");
        requested.storage.uri = "/tmp/does-not-need-to-exist-for-set.bin".into();
        let (devices, _) = reconcile_stream(&mut m, devices, &mut requested).await.unwrap();
        assert_eq!(devices.unwrap().camera_id.name, "simulated: radial sin");
    }
}
