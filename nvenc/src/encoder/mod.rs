mod session;

pub use session::{EncoderSession, SessionState, SubmitOutcome};

use crate::{BufferFormat, Result, SessionConfig};
use std::{os::raw::c_void, ptr::NonNull};

/// Compute-context memory backing an encoder input frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceMemory {
    /// Opaque CUDA array handle.
    Array(NonNull<c_void>),
    /// Linear device allocation.
    Linear { ptr: u64, pitch: u32 },
}

impl DeviceMemory {
    /// Row pitch in bytes, if the memory is linear.
    pub fn pitch(&self) -> Option<u32> {
        match self {
            DeviceMemory::Array(_) => None,
            DeviceMemory::Linear { pitch, .. } => Some(*pitch),
        }
    }
}

/// A frame ready to be submitted to the encoder.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceFrame {
    pub memory: DeviceMemory,
    pub width: u32,
    pub height: u32,
    pub format: BufferFormat,
}

/// Description of an input passed to `EncodeApi::register_resource`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InputResource {
    pub memory: DeviceMemory,
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub format: BufferFormat,
}

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        pub struct $name(NonNull<c_void>);

        impl $name {
            #[inline]
            pub fn new(ptr: *mut c_void) -> Option<Self> {
                NonNull::new(ptr).map($name)
            }

            #[inline]
            pub fn as_ptr(&self) -> *mut c_void {
                self.0.as_ptr()
            }
        }
    };
}

opaque_handle!(
    /// Input resource registered with the encoder.
    RegisteredInput
);
opaque_handle!(
    /// Registered input mapped for the duration of one picture.
    MappedInput
);
opaque_handle!(
    /// Output bitstream buffer owned by the encoder.
    BitstreamBuffer
);

/// Parameters of a single picture encode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PictureParams {
    pub input: MappedInput,
    pub output: BitstreamBuffer,
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub format: BufferFormat,
    pub frame_index: u64,
    pub timestamp: u64,
}

/// CPU view of a locked bitstream buffer.
#[derive(Debug, Copy, Clone)]
pub struct LockedBitstream {
    pub data: *const u8,
    pub len: usize,
    pub frame_index: u64,
    pub timestamp: u64,
    pub keyframe: bool,
}

/// One encoded picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub data: Vec<u8>,
    pub frame_index: u64,
    pub timestamp: u64,
    pub keyframe: bool,
}

/// Calls into an opened hardware encoder.
///
/// # Safety
///
/// `lock_bitstream` must return a pointer that stays valid for `len` bytes until the matching
/// `unlock_bitstream`.
pub unsafe trait EncodeApi {
    fn initialize(&mut self, config: &SessionConfig) -> Result<()>;

    fn create_bitstream_buffer(&mut self) -> Result<BitstreamBuffer>;

    fn destroy_bitstream_buffer(&mut self, buffer: BitstreamBuffer) -> Result<()>;

    fn register_resource(&mut self, input: &InputResource) -> Result<RegisteredInput>;

    fn unregister_resource(&mut self, registered: RegisteredInput) -> Result<()>;

    fn map_input_resource(&mut self, registered: RegisteredInput) -> Result<MappedInput>;

    fn unmap_input_resource(&mut self, mapped: MappedInput) -> Result<()>;

    /// Returns `NvEncStatus::NeedMoreInput` while the encoder is buffering.
    fn encode_picture(&mut self, params: &PictureParams) -> Result<()>;

    /// Signal end of stream so buffered pictures become retrievable.
    fn end_of_stream(&mut self) -> Result<()>;

    fn lock_bitstream(&mut self, buffer: BitstreamBuffer) -> Result<LockedBitstream>;

    fn unlock_bitstream(&mut self, buffer: BitstreamBuffer) -> Result<()>;

    /// Codec headers (SPS/PPS for H.264, VPS/SPS/PPS for HEVC).
    fn sequence_params(&mut self) -> Result<Vec<u8>>;
}
