#[cfg(windows)]
mod windows;

#[cfg(windows)]
pub use self::windows::D3D11CudaBridge;

use crate::{
    convert::VideoProcessor,
    error::{ConvertError, DeviceError, InteropError},
    interop::{GraphicsInterop, ViewKind},
};
use nvenc::{BufferFormat, EncodeApi, NvEncError};
use video_source::{PixelFormat, Surface};

/// The graphics device and compute context shared by every pipeline stage.
///
/// Lives for the whole process. Pipeline stages are created from it lazily and must be dropped
/// before it.
pub trait DeviceBridge {
    type Surface: Surface + Clone;
    type Processor: VideoProcessor<Surface = Self::Surface>;
    type Interop: GraphicsInterop<Surface = Self::Surface>;
    type Encoder: EncodeApi;

    fn create_processor(&self) -> Result<Self::Processor, ConvertError>;

    fn create_interop(&self) -> Result<Self::Interop, InteropError>;

    /// Open a hardware encoder handle bound to the compute context.
    fn open_encoder(&self) -> Result<Self::Encoder, NvEncError>;

    /// Allocate one encoder input surface the converter can render into.
    fn create_encode_surface(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Self::Surface, DeviceError>;

    fn view_kind(&self) -> ViewKind {
        ViewKind::Array
    }
}

/// Encoder input layout for a surface format. Packed formats keep their byte order, so
/// B, G, R, A in memory is NVENC's ARGB.
pub fn encoder_format(format: PixelFormat) -> Option<BufferFormat> {
    match format {
        PixelFormat::Bgra8 => Some(BufferFormat::Argb),
        PixelFormat::Rgba8 => Some(BufferFormat::Abgr),
        PixelFormat::Rgb10a2 => Some(BufferFormat::Abgr10),
        PixelFormat::Nv12 => Some(BufferFormat::Nv12),
        PixelFormat::Unknown(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_formats_map_to_encoder_formats() {
        assert_eq!(encoder_format(PixelFormat::Bgra8), Some(BufferFormat::Argb));
        assert_eq!(encoder_format(PixelFormat::Rgba8), Some(BufferFormat::Abgr));
        assert_eq!(encoder_format(PixelFormat::Rgb10a2), Some(BufferFormat::Abgr10));
        assert_eq!(encoder_format(PixelFormat::Nv12), Some(BufferFormat::Nv12));
        assert_eq!(encoder_format(PixelFormat::Unknown(2)), None);
    }
}
