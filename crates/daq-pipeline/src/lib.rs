//! Per-stream producer/consumer tasks driving a camera and storage device
//! through a [`daq_ring::FrameRing`].

pub mod consumer;
pub mod producer;
pub mod stream;

pub use stream::{PipelineOutcome, StreamPipeline, Termination};
