mod error;

#[cfg(windows)]
mod windows;

pub use error::Error;

#[cfg(windows)]
pub use crate::windows::DisplayDuplicator;

use std::time::Duration;

/// Pixel layout of a captured or converted surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit B, G, R, A in memory.
    Bgra8,
    /// 8-bit R, G, B, A in memory.
    Rgba8,
    /// 10-bit R, G, B with 2-bit alpha.
    Rgb10a2,
    /// 8-bit 4:2:0 luma plane followed by interleaved chroma.
    Nv12,
    /// Platform format with no portable equivalent.
    Unknown(u32),
}

/// Stable identity of a GPU surface, valid while the surface is alive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SurfaceDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl SurfaceDesc {
    pub fn has_area(&self) -> bool {
        self.width != 0 && self.height != 0
    }
}

/// GPU-resident 2D pixel buffer.
pub trait Surface {
    fn id(&self) -> SurfaceId;

    fn desc(&self) -> SurfaceDesc;
}

/// A frame handed out by `CaptureProvider::acquire_frame`. The surface stays owned by the
/// provider until `CaptureProvider::release_frame`.
#[derive(Debug, Clone)]
pub struct CapturedFrame<S> {
    pub surface: S,
    /// Presentation time in provider-specific ticks.
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub enum CaptureOutcome<S> {
    Frame(CapturedFrame<S>),
    /// Nothing new was presented within the wait window.
    Timeout,
}

/// Source of captured display frames.
pub trait CaptureProvider {
    type Surface: Surface;

    /// Create (or recreate) the capture session.
    fn init(&mut self) -> Result<(), Error>;

    /// Wait up to `wait` for the next frame. At most one frame is held at a time and acquiring
    /// a new one releases the previous frame.
    fn acquire_frame(&mut self, wait: Duration) -> Result<CaptureOutcome<Self::Surface>, Error>;

    /// Give the last acquired frame back to the provider. Does nothing if no frame is held.
    fn release_frame(&mut self) -> Result<(), Error>;

    /// Release the capture session. Safe to call more than once.
    fn cleanup(&mut self);

    /// Refresh interval of the captured display, if known.
    fn refresh_interval(&self) -> Option<Duration> {
        None
    }
}

impl From<PixelFormat> for u32 {
    fn from(format: PixelFormat) -> Self {
        match format {
            PixelFormat::Bgra8 => 87,
            PixelFormat::Rgba8 => 28,
            PixelFormat::Rgb10a2 => 24,
            PixelFormat::Nv12 => 103,
            PixelFormat::Unknown(raw) => raw,
        }
    }
}

impl From<u32> for PixelFormat {
    /// Interpret a `DXGI_FORMAT` value.
    fn from(raw: u32) -> Self {
        match raw {
            87 => PixelFormat::Bgra8,
            28 => PixelFormat::Rgba8,
            24 => PixelFormat::Rgb10a2,
            103 => PixelFormat::Nv12,
            raw => PixelFormat::Unknown(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dxgi_format_values() {
        for format in [
            PixelFormat::Bgra8,
            PixelFormat::Rgba8,
            PixelFormat::Rgb10a2,
            PixelFormat::Nv12,
        ] {
            assert_eq!(PixelFormat::from(u32::from(format)), format);
        }
        assert_eq!(PixelFormat::from(2), PixelFormat::Unknown(2));
    }

    #[test]
    fn zero_sized_desc_has_no_area() {
        let desc = SurfaceDesc {
            width: 0,
            height: 1080,
            format: PixelFormat::Bgra8,
        };
        assert!(!desc.has_area());
    }
}
