//! End-to-end acquisition scenarios driving a [`Runtime`] the way a host
//! application would: configure, start, let frames flow, stop, shut down.

use std::time::Duration;

use rust_daq::{
    CameraProperties, DeviceIdentifier, DeviceKind, Runtime, RuntimeProperties, SampleType,
    StorageProperties, VideoStreamProperties,
};
use tempfile::TempDir;

fn camera(name: &str, width: u32, height: u32, sample_type: SampleType) -> VideoStreamProperties {
    VideoStreamProperties {
        camera_id: DeviceIdentifier::new(DeviceKind::Camera, name),
        camera: CameraProperties {
            frame_shape_px: (width, height),
            sample_type,
            exposure_us: 1,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Scenario 1: every built-in camera crossed with every built-in storage
/// reports back its own identifier in the configuration metadata.
#[tokio::test]
async fn identifier_reported_in_metadata_for_every_camera_storage_pair() {
    let dir = TempDir::new().unwrap();
    let cameras = [
        "simulated: uniform random",
        "simulated: radial sin",
        "simulated: empty",
    ];
    let storages = ["raw", "tiff", "trash", "tiff-json"];

    for camera_name in cameras {
        for (index, storage_name) in storages.iter().enumerate() {
            let mut runtime = Runtime::init().unwrap();
            let mut request = RuntimeProperties::with_capacity(1);
            let mut stream = camera(camera_name, 8, 8, SampleType::U8);
            stream.storage_id = DeviceIdentifier::new(DeviceKind::Storage, *storage_name);
            stream.storage = StorageProperties {
                uri: dir.path().join(format!("{camera_name}-{storage_name}-{index}")).to_string_lossy().to_string(),
                ..Default::default()
            };
            stream.max_frame_count = 3;
            request.streams[0] = stream;

            runtime.configure(&mut request).await.unwrap();
            let metadata = runtime.get_configuration_metadata();
            assert_eq!(metadata.streams[0].camera.name, camera_name);
            assert_eq!(metadata.streams[0].storage.name, *storage_name);

            runtime.shutdown().await.unwrap();
        }
    }
}

/// Scenario 2: the radial-sin simulator does not stall, even at a
/// realistic frame size, within a generous wall-clock bound.
#[tokio::test]
async fn radial_sin_does_not_stall_at_1080p() {
    let mut runtime = Runtime::init().unwrap();
    let mut request = RuntimeProperties::with_capacity(1);
    let mut stream = camera("simulated: radial sin", 1920, 1080, SampleType::U16);
    stream.storage_id = DeviceIdentifier::new(DeviceKind::Storage, "trash");
    stream.max_frame_count = 100;
    request.streams[0] = stream;

    runtime.configure(&mut request).await.unwrap();
    runtime.start().await.unwrap();

    let limit = Duration::from_secs((100 / 3) * 2);
    tokio::time::timeout(limit, runtime.stop()).await
        .expect("acquisition exceeded its wall-clock limit")
        .unwrap();

    runtime.shutdown().await.unwrap();
}

/// Scenario 3: odd row strides still land every frame on an 8-byte
/// aligned, 8-byte-multiple boundary in the ring.
#[tokio::test]
async fn odd_row_stride_frames_stay_eight_byte_aligned() {
    let mut runtime = Runtime::init().unwrap();
    let mut request = RuntimeProperties::with_capacity(1);
    let mut stream = camera("simulated: uniform random", 33, 47, SampleType::U8);
    stream.storage_id = DeviceIdentifier::new(DeviceKind::Storage, "trash");
    stream.max_frame_count = 10;
    request.streams[0] = stream;

    runtime.configure(&mut request).await.unwrap();
    runtime.start().await.unwrap();

    // Give the producer a chance to actually land a frame before the
    // monitor reads it; an empty ring maps to a dangling empty slice.
    let mut buffer: &[u8] = &[];
    for _ in 0..200 {
        buffer = runtime.map_read(0).unwrap();
        if !buffer.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(!buffer.is_empty(), "no frame landed in the ring within the wait budget");
    assert_eq!(buffer.as_ptr() as usize % 8, 0);
    assert_eq!(buffer.len() % 8, 0);
    runtime.unmap_read(0, buffer.len() as u64).unwrap();

    runtime.stop().await.unwrap();
    runtime.shutdown().await.unwrap();
}

/// Scenario 4: switching the storage identifier across successive runs
/// produces files of the expected size for `raw` and `tiff`, and leaves
/// no trace for `trash`.
#[tokio::test]
async fn switching_storage_identifier_across_runs_produces_expected_files() {
    let dir = TempDir::new().unwrap();
    let sequence = ["trash", "tiff", "trash", "raw", "trash", "tiff", "raw", "trash", "raw", "tiff"];
    const FRAMES: u64 = 32;
    const WIDTH: u32 = 64;
    const HEIGHT: u32 = 48;

    let mut runtime = Runtime::init().unwrap();
    for (index, storage_name) in sequence.iter().enumerate() {
        let mut request = RuntimeProperties::with_capacity(1);
        let mut stream = camera("simulated: uniform random", WIDTH, HEIGHT, SampleType::U8);
        stream.storage_id = DeviceIdentifier::new(DeviceKind::Storage, *storage_name);
        let path = dir.path().join(format!("run-{index}.{}", if *storage_name == "tiff" { "tif" } else { "bin" }));
        stream.storage = StorageProperties { uri: path.to_string_lossy().to_string(), ..Default::default() };
        stream.max_frame_count = FRAMES;
        request.streams[0] = stream;

        runtime.configure(&mut request).await.unwrap();
        runtime.start().await.unwrap();

        // Let the producer actually reach `max_frame_count` naturally;
        // `stop` only forces an early exit, it does not wait for completion.
        tokio::time::sleep(Duration::from_millis(200)).await;

        runtime.stop().await.unwrap();

        match *storage_name {
            "tiff" => {
                let size = std::fs::metadata(&path).unwrap().len();
                assert!(size >= (WIDTH as u64) * (HEIGHT as u64) * FRAMES, "tiff file too small: {size}");
            }
            "raw" => {
                let expected = (daq_core::header_bytes() + (WIDTH as u64) * (HEIGHT as u64)) * FRAMES;
                let size = std::fs::metadata(&path).unwrap().len();
                assert_eq!(size, expected, "raw file size mismatch");
            }
            "trash" => {
                assert!(!path.exists());
            }
            _ => unreachable!(),
        }
    }
    runtime.shutdown().await.unwrap();
}

/// Scenario 5: a `file://`-prefixed URI round-trips through
/// `get_configuration` with the prefix stripped, byte-exact otherwise.
#[tokio::test]
async fn file_uri_prefix_is_stripped_on_round_trip() {
    let dir = TempDir::new().unwrap();
    let sinks = [
        ("raw", dir.path().join("a.bin")),
        ("tiff", dir.path().join("b.tif")),
        ("tiff-json", dir.path().join("c_dir")),
    ];

    for (storage_name, path) in sinks {
        let mut runtime = Runtime::init().unwrap();
        let mut request = RuntimeProperties::with_capacity(1);
        let mut stream = camera("simulated: uniform random", 4, 4, SampleType::U8);
        stream.storage_id = DeviceIdentifier::new(DeviceKind::Storage, storage_name);
        let plain = path.to_string_lossy().to_string();
        stream.storage = StorageProperties { uri: format!("file://{plain}"), ..Default::default() };
        stream.max_frame_count = 1;
        request.streams[0] = stream;

        runtime.configure(&mut request).await.unwrap();
        let applied = runtime.get_configuration();
        assert_eq!(applied.streams[0].storage.uri, plain);

        runtime.shutdown().await.unwrap();
    }
}

/// Scenario 6: repeated start/stop without ever attaching the monitor
/// completes both runs and leaves `shutdown` returning `Ok`.
#[tokio::test]
async fn repeat_start_stop_without_monitor_completes_and_shuts_down_cleanly() {
    let mut runtime = Runtime::init().unwrap();
    let mut request = RuntimeProperties::with_capacity(1);
    let mut stream = camera("simulated: empty", 2304, 2304, SampleType::U16);
    stream.storage_id = DeviceIdentifier::new(DeviceKind::Storage, "trash");
    stream.max_frame_count = 500;
    request.streams[0] = stream;

    for _ in 0..2 {
        runtime.configure(&mut request).await.unwrap();
        runtime.start().await.unwrap();
        runtime.stop().await.unwrap();
    }
    runtime.shutdown().await.unwrap();
}
