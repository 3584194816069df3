mod error_strings;

/// Non-success `NVENCSTATUS` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum NvEncStatus {
    NoEncodeDevice = 1,
    UnsupportedDevice = 2,
    InvalidEncoderDevice = 3,
    InvalidDevice = 4,
    DeviceNotExist = 5,
    InvalidPtr = 6,
    InvalidEvent = 7,
    InvalidParam = 8,
    InvalidCall = 9,
    OutOfMemory = 10,
    EncoderNotInitialized = 11,
    UnsupportedParam = 12,
    LockBusy = 13,
    NotEnoughBuffer = 14,
    InvalidVersion = 15,
    MapFailed = 16,
    NeedMoreInput = 17,
    EncoderBusy = 18,
    EventNotRegistered = 19,
    Generic = 20,
    IncompatibleClientKey = 21,
    Unimplemented = 22,
    ResourceRegisterFailed = 23,
    ResourceNotRegistered = 24,
    ResourceNotMapped = 25,
}

impl NvEncStatus {
    const ALL: [NvEncStatus; 25] = [
        NvEncStatus::NoEncodeDevice,
        NvEncStatus::UnsupportedDevice,
        NvEncStatus::InvalidEncoderDevice,
        NvEncStatus::InvalidDevice,
        NvEncStatus::DeviceNotExist,
        NvEncStatus::InvalidPtr,
        NvEncStatus::InvalidEvent,
        NvEncStatus::InvalidParam,
        NvEncStatus::InvalidCall,
        NvEncStatus::OutOfMemory,
        NvEncStatus::EncoderNotInitialized,
        NvEncStatus::UnsupportedParam,
        NvEncStatus::LockBusy,
        NvEncStatus::NotEnoughBuffer,
        NvEncStatus::InvalidVersion,
        NvEncStatus::MapFailed,
        NvEncStatus::NeedMoreInput,
        NvEncStatus::EncoderBusy,
        NvEncStatus::EventNotRegistered,
        NvEncStatus::Generic,
        NvEncStatus::IncompatibleClientKey,
        NvEncStatus::Unimplemented,
        NvEncStatus::ResourceRegisterFailed,
        NvEncStatus::ResourceNotRegistered,
        NvEncStatus::ResourceNotMapped,
    ];

    /// Returns `None` for `NV_ENC_SUCCESS` and for codes newer than the known range.
    #[inline]
    pub fn from_raw(status: i32) -> Option<Self> {
        // Discriminants are contiguous starting from 1
        let index = usize::try_from(status).ok()?.checked_sub(1)?;
        Self::ALL.get(index).copied()
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvEncError {
    #[error("{}", error_strings::nvenc_status_to_str(.0))]
    Status(NvEncStatus),
    #[error("NVENC returned an unrecognized status code {0}")]
    UnknownStatus(i32),

    #[error("The shared library for `nvEncodeAPI64` is not signed and may have been tampered.")]
    LibraryNotSigned,
    #[error("Loading the shared library for `nvEncodeAPI64` failed.")]
    LibraryLoadingFailed,
    #[error("Unable to locate `NvEncodeAPIGetMaxSupportedVersion` in the shared library.")]
    GetMaxSupportedVersionLoadingFailed,
    #[error("Unable to locate `NvEncodeAPICreateInstance` in the shared library.")]
    CreateInstanceLoadingFailed,
    #[error("The installed driver does not support the version of the NvEnc API that this library is compiled with.")]
    UnsupportedVersion,
    #[error("`NvEncodeAPICreateInstance` returned a malformed function list.")]
    MalformedFunctionList,

    #[error("The encoder for the current device does not support the codec")]
    UnsupportedCodec,
    #[error("The buffer format cannot be used as encoder input")]
    UnsupportedBufferFormat,

    #[error("The encoder session has not been opened")]
    SessionNotOpen,
    #[error("The encoder session can only be opened once")]
    SessionAlreadyOpen,
    #[error("Expected {expected} input frames for the session pool but got {actual}")]
    InputPoolMismatch { expected: usize, actual: usize },
    #[error("Frame geometry or format does not match the encoder session")]
    FrameMismatch,
    #[error("Every bitstream buffer is held by an unretrieved picture")]
    BitstreamPoolExhausted,
}

impl Default for NvEncError {
    #[inline]
    fn default() -> Self {
        NvEncError::Status(NvEncStatus::Generic)
    }
}

impl NvEncError {
    /// Create a `NvEncError` from a raw `NVENCSTATUS`. Returns `None` if `status` is
    /// `NV_ENC_SUCCESS`.
    #[inline]
    pub fn from_nvenc_status(status: i32) -> Option<Self> {
        match status {
            0 => None,
            status => Some(
                NvEncStatus::from_raw(status)
                    .map(NvEncError::Status)
                    .unwrap_or(NvEncError::UnknownStatus(status)),
            ),
        }
    }

    /// Try to convert `NvEncError` back into a raw `NVENCSTATUS`.
    #[inline]
    pub fn into_nvenc_status(self) -> Option<i32> {
        match self {
            NvEncError::Status(status) => Some(status as i32),
            NvEncError::UnknownStatus(status) => Some(status),
            _ => None,
        }
    }

    /// The encoder is buffering pictures. Not a failure.
    #[inline]
    pub fn is_need_more_input(&self) -> bool {
        matches!(self, NvEncError::Status(NvEncStatus::NeedMoreInput))
    }
}
