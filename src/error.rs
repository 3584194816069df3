use nvenc::NvEncError;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("graphics device was lost or removed")]
    DeviceLost,
    #[error("pixel format cannot be processed: {0}")]
    UnsupportedFormat(u32),
    #[error("invalid surface description {width}x{height}")]
    DescriptionMismatch { width: u32, height: u32 },
    #[error("video processor call failed: {0}")]
    Backend(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InteropError {
    #[error("could not register the surface with the compute context: {0}")]
    Registration(String),
    #[error("could not map the registered surface: {0}")]
    Map(String),
    #[error("could not resolve a device view of the mapped surface: {0}")]
    ResolveView(String),
    #[error("surface already has a live device view")]
    AlreadyMapped,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("no usable graphics device: {0}")]
    Graphics(String),
    #[error("compute context error: {0}")]
    Compute(String),
    #[error("GPU ordinal {ordinal} out of range, {count} device(s) present")]
    NoSuchGpu { ordinal: u32, count: u32 },
    #[error("could not create an encoder input surface: {0}")]
    Surface(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid argument `{0}`")]
    Argument(String),
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Everything that can stop or interrupt a capture run.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Capture(#[from] video_source::Error),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Interop(#[from] InteropError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("encoder could not be opened: {0}")]
    EncoderOpen(NvEncError),
    #[error("encoder rejected the frame: {0}")]
    Submit(NvEncError),
    #[error("encoder flush failed: {0}")]
    Flush(NvEncError),
    #[error("no free encoder input surface")]
    NoInputSurface,
    #[error("captured surface format {0:?} has no encoder equivalent")]
    UnsupportedSource(video_source::PixelFormat),
    #[error("capture session could not be recreated: {0}")]
    Recovery(video_source::Error),
    #[error("writing packets failed: {0}")]
    Sink(#[from] std::io::Error),
}

impl PipelineError {
    /// Fatal errors end the run. Everything else drops the current frame.
    pub fn is_fatal(&self) -> bool {
        match self {
            PipelineError::Convert(ConvertError::DeviceLost) => true,
            PipelineError::Convert(_) => false,
            PipelineError::Interop(InteropError::Registration(_)) => true,
            PipelineError::Interop(_) => false,
            PipelineError::Submit(_) | PipelineError::NoInputSurface => false,
            PipelineError::Capture(_)
            | PipelineError::Device(_)
            | PipelineError::EncoderOpen(_)
            | PipelineError::Flush(_)
            | PipelineError::UnsupportedSource(_)
            | PipelineError::Recovery(_)
            | PipelineError::Sink(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvenc::NvEncStatus;

    #[test]
    fn per_frame_failures_are_recoverable() {
        let recoverable = [
            PipelineError::Convert(ConvertError::Backend("blt".into())),
            PipelineError::Interop(InteropError::Map("busy".into())),
            PipelineError::Interop(InteropError::ResolveView("no array".into())),
            PipelineError::Submit(NvEncError::Status(NvEncStatus::EncoderBusy)),
        ];
        for err in recoverable {
            assert!(!err.is_fatal(), "{err}");
        }
    }

    #[test]
    fn device_and_setup_failures_are_fatal() {
        let fatal = [
            PipelineError::Convert(ConvertError::DeviceLost),
            PipelineError::Interop(InteropError::Registration("denied".into())),
            PipelineError::EncoderOpen(NvEncError::UnsupportedVersion),
            PipelineError::Recovery(video_source::Error::NoDisplay(1)),
            PipelineError::Sink(std::io::ErrorKind::WriteZero.into()),
        ];
        for err in fatal {
            assert!(err.is_fatal(), "{err}");
        }
    }
}
