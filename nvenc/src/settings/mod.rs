mod format;

pub use format::{FormatDescriptor, Plane, PlaneLayout};

use serde::Deserialize;

/// Bitstream buffers kept on top of the in-flight and lookahead pictures.
pub const POOL_MARGIN: usize = 3;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    #[default]
    H264,
    Hevc,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodePreset {
    P1,
    P2,
    #[default]
    P3,
    P4,
    P5,
    P6,
    P7,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuningInfo {
    HighQuality,
    LowLatency,
    #[default]
    UltraLowLatency,
    Lossless,
}

/// Rate control suited for live capture. Neither mode uses B-frames.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RateControl {
    ConstQp { qp: u8 },
    Cbr { bitrate: u32 },
}

impl Default for RateControl {
    fn default() -> Self {
        RateControl::ConstQp { qp: 28 }
    }
}

/// Layout of the encoder input buffer. Packed RGB names follow NVENC's word order, so `Argb`
/// is B, G, R, A in memory.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferFormat {
    Nv12,
    Yv12,
    Iyuv,
    Yuv444,
    Yuv420_10Bit,
    Yuv444_10Bit,
    Argb,
    Argb10,
    Ayuv,
    Abgr,
    Abgr10,
}

impl BufferFormat {
    pub fn is_10_bit(&self) -> bool {
        matches!(
            self,
            BufferFormat::Yuv420_10Bit
                | BufferFormat::Yuv444_10Bit
                | BufferFormat::Argb10
                | BufferFormat::Abgr10
        )
    }
}

/// Everything needed to initialize one encoder session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub width: u32,
    pub height: u32,
    pub buffer_format: BufferFormat,
    pub codec: Codec,
    pub preset: EncodePreset,
    pub tuning: TuningInfo,
    pub rate_control: RateControl,
    pub frame_rate_num: u32,
    pub frame_rate_den: u32,
    /// Distance between P-frames. 1 disables B-frames.
    pub frame_interval_p: u32,
    pub lookahead_depth: u32,
    /// `None` means an infinite GOP.
    pub gop_length: Option<u32>,
}

impl SessionConfig {
    /// Zero-latency defaults for a 60 fps stream.
    pub fn new(width: u32, height: u32, buffer_format: BufferFormat) -> Self {
        SessionConfig {
            width,
            height,
            buffer_format,
            codec: Codec::default(),
            preset: EncodePreset::default(),
            tuning: TuningInfo::default(),
            rate_control: RateControl::default(),
            frame_rate_num: 60,
            frame_rate_den: 1,
            frame_interval_p: 1,
            lookahead_depth: 0,
            gop_length: None,
        }
    }

    /// Number of bitstream buffers (and input frames) the session cycles through.
    pub fn pool_capacity(&self) -> usize {
        self.frame_interval_p.max(1) as usize + self.lookahead_depth as usize + POOL_MARGIN
    }
}
