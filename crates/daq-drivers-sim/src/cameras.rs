//! The three built-in simulated camera sources.

use async_trait::async_trait;
use rand::Rng;

use daq_core::{
    CameraProperties, DeviceIdentifier, DeviceKind, DeviceState, FrameTimestamp, ImageShape,
    RuntimeResult, SampleType,
};
use daq_plugin_api::{Camera, CameraMetadata, FramePoll};

/// How a simulated camera fills a frame's pixel bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    UniformRandom,
    RadialSin,
    Empty,
}

impl Pattern {
    fn device_name(self) -> &'static str {
        match self {
            Pattern::UniformRandom => "simulated: uniform random",
            Pattern::RadialSin => "simulated: radial sin",
            Pattern::Empty => "simulated: empty",
        }
    }

    /// Fill `buffer` (exactly `shape.bytes_of_image()` bytes) with this
    /// pattern's pixel data for the given sample type.
    fn fill(self, buffer: &mut [u8], shape: &ImageShape) {
        match self {
            Pattern::Empty => buffer.fill(0),
            Pattern::UniformRandom => rand::thread_rng().fill(buffer),
            Pattern::RadialSin => fill_radial_sin(buffer, shape),
        }
    }
}

fn fill_radial_sin(buffer: &mut [u8], shape: &ImageShape) {
    let width = shape.width.max(1) as f64;
    let height = shape.height.max(1) as f64;
    let cx = width / 2.0;
    let cy = height / 2.0;
    let max_r = (cx * cx + cy * cy).sqrt().max(1.0);
    let sample_bytes = shape.sample_type.bytes();

    for y in 0..shape.height as usize {
        for x in 0..shape.width as usize {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            let r = (dx * dx + dy * dy).sqrt() / max_r;
            let value = (r * std::f64::consts::PI * 8.0).sin();
            let offset = (y * shape.width as usize + x) * sample_bytes;
            write_sample(&mut buffer[offset..offset + sample_bytes], shape.sample_type, value);
        }
    }
}

/// Map a `[-1, 1]` sine value into the on-disk bytes for `sample_type`.
fn write_sample(dst: &mut [u8], sample_type: SampleType, value: f64) {
    let unit = (value + 1.0) / 2.0; // [0, 1]
    match sample_type {
        SampleType::U8 | SampleType::I8 => dst[0] = (unit * u8::MAX as f64) as u8,
        SampleType::U16 | SampleType::I16 | SampleType::U10 | SampleType::U12 | SampleType::U14 => {
            let max = match sample_type {
                SampleType::U10 => (1u32 << 10) - 1,
                SampleType::U12 => (1u32 << 12) - 1,
                SampleType::U14 => (1u32 << 14) - 1,
                _ => u16::MAX as u32,
            };
            let v = (unit * max as f64) as u16;
            dst.copy_from_slice(&v.to_le_bytes());
        }
        SampleType::F32 => dst.copy_from_slice(&(value as f32).to_le_bytes()),
    }
}

/// One of the three built-in simulated cameras.
pub struct SimCamera {
    pattern: Pattern,
    state: DeviceState,
    props: CameraProperties,
    frame_counter: u64,
}

impl SimCamera {
    fn new(pattern: Pattern) -> Self {
        SimCamera {
            pattern,
            state: DeviceState::AwaitingConfiguration,
            props: CameraProperties::default(),
            frame_counter: 0,
        }
    }

    pub fn uniform_random() -> Self {
        Self::new(Pattern::UniformRandom)
    }

    pub fn radial_sin() -> Self {
        Self::new(Pattern::RadialSin)
    }

    pub fn empty() -> Self {
        Self::new(Pattern::Empty)
    }

    fn shape(&self) -> RuntimeResult<ImageShape> {
        let (w, h) = self.props.frame_shape_px;
        let binned_w = (w / self.props.binning.0.max(1) as u32).max(1);
        let binned_h = (h / self.props.binning.1.max(1) as u32).max(1);
        ImageShape::contiguous(binned_w, binned_h, 1, self.props.sample_type)
    }
}

#[async_trait]
impl Camera for SimCamera {
    fn identifier(&self) -> DeviceIdentifier {
        DeviceIdentifier::new(DeviceKind::Camera, self.pattern.device_name())
    }

    async fn set(&mut self, properties: CameraProperties) -> DeviceState {
        let candidate = SimCamera {
            pattern: self.pattern,
            state: self.state,
            props: properties,
            frame_counter: self.frame_counter,
        };
        match candidate.shape() {
            Ok(_) => {
                self.props = properties;
                self.state = DeviceState::Armed;
                DeviceState::Armed
            }
            Err(_) => {
                self.state = DeviceState::AwaitingConfiguration;
                DeviceState::AwaitingConfiguration
            }
        }
    }

    fn get(&self) -> CameraProperties {
        self.props
    }

    fn get_meta(&self) -> CameraMetadata {
        CameraMetadata {
            shape_range: None,
            supported_trigger_sources: vec!["software".to_string()],
        }
    }

    fn get_shape(&self) -> ImageShape {
        self.shape().unwrap_or_else(|_| {
            ImageShape::contiguous(1, 1, 1, self.props.sample_type)
                .expect("1x1 never overflows or exceeds MAX_DIMENSION")
        })
    }

    async fn start(&mut self) -> DeviceState {
        self.frame_counter = 0;
        self.state = DeviceState::Running;
        DeviceState::Running
    }

    async fn stop(&mut self) -> DeviceState {
        self.state = DeviceState::Armed;
        DeviceState::Armed
    }

    async fn execute_trigger(&mut self) -> RuntimeResult<()> {
        Ok(())
    }

    async fn get_frame(&mut self, buffer: &mut [u8]) -> FramePoll {
        let shape = match self.shape() {
            Ok(s) => s,
            Err(e) => return FramePoll::Error(e.to_string()),
        };
        let nbytes = match shape.bytes_of_image() {
            Ok(n) => n as usize,
            Err(e) => return FramePoll::Error(e.to_string()),
        };
        self.pattern.fill(&mut buffer[..nbytes], &shape);
        self.frame_counter += 1;

        let system_ns = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        FramePoll::Ready {
            nbytes,
            timestamp: FrameTimestamp {
                hardware_ns: self.frame_counter * self.props.exposure_us.max(1) * 1000,
                system_ns,
            },
        }
    }
}
