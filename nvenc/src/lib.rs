mod encoder;
mod error;
mod settings;
#[cfg_attr(not(windows), allow(dead_code))]
mod util;

#[cfg(windows)]
pub(crate) mod os;

#[cfg(windows)]
pub(crate) use nvenc_sys as sys;

pub type Result<T> = std::result::Result<T, NvEncError>;

pub use encoder::{
    BitstreamBuffer, DeviceFrame, DeviceMemory, EncodeApi, EncoderSession, InputResource,
    LockedBitstream, MappedInput, Packet, PictureParams, RegisteredInput, SessionState,
    SubmitOutcome,
};
pub use error::{NvEncError, NvEncStatus};
pub use settings::{
    BufferFormat, Codec, EncodePreset, FormatDescriptor, Plane, PlaneLayout, RateControl,
    SessionConfig, TuningInfo, POOL_MARGIN,
};

#[cfg(windows)]
pub use os::windows::{Library, RawEncoder};
