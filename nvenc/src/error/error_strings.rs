use super::NvEncStatus;

/// Convert a `NvEncStatus` into a readable error string.
// `NvEncGetLastErrorString` is not useable here since that requires a pointer to an initialized
// encoder
#[inline]
pub(super) fn nvenc_status_to_str(status: &NvEncStatus) -> &'static str {
    match status {
        NvEncStatus::NoEncodeDevice => "No encode capable devices were detected.",
        NvEncStatus::UnsupportedDevice => "Devices pass by the client is not supported.",
        NvEncStatus::InvalidEncoderDevice => "Encoder device supplied by the client is not valid.",
        NvEncStatus::InvalidDevice => "Device passed to the API call is invalid.",
        NvEncStatus::DeviceNotExist => "Device passed to the API call is no longer available and needs to be reinitialized. The clients need to destroy the current encoder session by freeing the allocated input output buffers and destroying the device and create a new encoding session.",
        NvEncStatus::InvalidPtr => "One or more of the pointers passed to the API call is invalid.",
        NvEncStatus::InvalidEvent => "Completion event passed in ::NvEncEncodePicture() call is invalid.",
        NvEncStatus::InvalidParam => "One or more of the parameter passed to the API call is invalid.",
        NvEncStatus::InvalidCall => "An API call was made in wrong sequence/order.",
        NvEncStatus::OutOfMemory => "API call failed because it was unable to allocate enough memory to perform the requested operation.",
        NvEncStatus::EncoderNotInitialized => "Encoder has not been initialized with ::NvEncInitializeEncoder() or that initialization has failed. The client cannot allocate input or output buffers or do any encoding related operation before successfully initializing the encoder.",
        NvEncStatus::UnsupportedParam => "Unsupported parameter was passed by the client.",
        NvEncStatus::LockBusy => "::NvEncLockBitstream() failed to lock the output buffer. This happens when the client makes a non blocking lock call to access the output bitstream by passing NV_ENC_LOCK_BITSTREAM::doNotWait flag. This is not a fatal error and client should retry the same operation after few milliseconds.",
        NvEncStatus::NotEnoughBuffer => "Size of the user buffer passed by the client is insufficient for the requested operation.",
        NvEncStatus::InvalidVersion => "Invalid struct version was used by the client.",
        NvEncStatus::MapFailed => "::NvEncMapInputResource() API failed to map the client provided input resource.",
        NvEncStatus::NeedMoreInput => "Encode driver requires more input buffers to produce an output bitstream. If this error is returned from ::NvEncEncodePicture() API, this is not a fatal error. If the client is encoding with B frames then, ::NvEncEncodePicture() API might be buffering the input frame for re-ordering.  A client operating in synchronous mode cannot call ::NvEncLockBitstream() API on the output bitstream buffer if ::NvEncEncodePicture() returned the ::NV_ENC_ERR_NEED_MORE_INPUT error code. The client must continue providing input frames until encode driver returns ::NV_ENC_SUCCESS. After receiving ::NV_ENC_SUCCESS status the client can call ::NvEncLockBitstream() API on the output buffers in the same order in which it has called ::NvEncEncodePicture().",
        NvEncStatus::EncoderBusy => "HW encoder is busy encoding and is unable to encode the input. The client should call ::NvEncEncodePicture() again after few milliseconds.",
        NvEncStatus::EventNotRegistered => "Completion event passed in ::NvEncEncodePicture() API has not been registered with encoder driver using ::NvEncRegisterAsyncEvent().",
        NvEncStatus::Generic => "An unknown internal error has occurred.",
        NvEncStatus::IncompatibleClientKey => "Client is attempting to use a feature that is not available for the license type for the current system.",
        NvEncStatus::Unimplemented => "the client is attempting to use a feature that is not implemented for the current version.",
        NvEncStatus::ResourceRegisterFailed => "::NvEncRegisterResource API failed to register the resource.",
        NvEncStatus::ResourceNotRegistered => "Client is attempting to unregister a resource that has not been successfully registered.",
        NvEncStatus::ResourceNotMapped => "Client is attempting to unmap a resource that has not been successfully mapped.",
    }
}
