use crate::BufferFormat;

pub(crate) fn nvenc_buffer_format(format: BufferFormat) -> crate::sys::NV_ENC_BUFFER_FORMAT {
    use crate::sys::NV_ENC_BUFFER_FORMAT as F;

    match format {
        BufferFormat::Nv12 => F::NV_ENC_BUFFER_FORMAT_NV12,
        BufferFormat::Yv12 => F::NV_ENC_BUFFER_FORMAT_YV12,
        BufferFormat::Iyuv => F::NV_ENC_BUFFER_FORMAT_IYUV,
        BufferFormat::Yuv444 => F::NV_ENC_BUFFER_FORMAT_YUV444,
        BufferFormat::Yuv420_10Bit => F::NV_ENC_BUFFER_FORMAT_YUV420_10BIT,
        BufferFormat::Yuv444_10Bit => F::NV_ENC_BUFFER_FORMAT_YUV444_10BIT,
        BufferFormat::Argb => F::NV_ENC_BUFFER_FORMAT_ARGB,
        BufferFormat::Argb10 => F::NV_ENC_BUFFER_FORMAT_ARGB10,
        BufferFormat::Ayuv => F::NV_ENC_BUFFER_FORMAT_AYUV,
        BufferFormat::Abgr => F::NV_ENC_BUFFER_FORMAT_ABGR,
        BufferFormat::Abgr10 => F::NV_ENC_BUFFER_FORMAT_ABGR10,
    }
}
