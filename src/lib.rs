//! Desktop capture to a hardware encoded H.264/HEVC elementary stream.
//!
//! Frames flow from a [`CaptureProvider`](video_source::CaptureProvider) through the GPU
//! [`TextureConverter`](convert::TextureConverter), the zero-copy
//! [`InteropBridge`](interop::InteropBridge) and an [`EncoderSession`](nvenc::EncoderSession)
//! into a [`PacketSink`](sink::PacketSink), paced by [`PacingLoop`](pacing::PacingLoop).

pub mod config;
pub mod convert;
pub mod device;
pub mod error;
pub mod interop;
pub mod pacing;
pub mod pipeline;
pub mod sink;

pub use config::CaptureConfig;
pub use error::{ConfigError, ConvertError, DeviceError, InteropError, PipelineError};
pub use pacing::{next_wait, Clock, PacingLoop, RunSummary, SystemClock};
pub use pipeline::{CapturePipeline, PipelineStats};
