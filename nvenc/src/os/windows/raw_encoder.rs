use super::{config::InitParams, format::nvenc_buffer_format, Library};
use crate::{
    BitstreamBuffer, DeviceMemory, EncodeApi, InputResource, LockedBitstream, MappedInput,
    NvEncError, PictureParams, RegisteredInput, Result, SessionConfig,
};
use std::{mem::MaybeUninit, os::raw::c_void, ptr::NonNull};

/// Call an entry of the function list, returning early with the mapped error on failure.
macro_rules! nvenc_function {
    ($self:ident . $fn:ident, $($arg:expr),*) => {
        // SAFETY: `is_function_list_valid` checked that every entry is non-null
        let status = ($self.functions.$fn.unwrap_unchecked())($self.encoder_ptr.as_ptr(), $($arg,)*);
        if let Some(error) = NvEncError::from_nvenc_status(status as i32) {
            return Err(error);
        }
    };
}

/// Start an encoding session on a CUDA context.
fn open_encode_session(
    functions: &crate::sys::NV_ENCODE_API_FUNCTION_LIST,
    cuda_context: *mut c_void,
) -> Result<NonNull<c_void>> {
    let mut raw_encoder: *mut c_void = std::ptr::null_mut();
    unsafe {
        let mut session_params: crate::sys::NV_ENC_OPEN_ENCODE_SESSION_EX_PARAMS =
            MaybeUninit::zeroed().assume_init();
        session_params.version = crate::sys::NV_ENC_OPEN_ENCODE_SESSION_EX_PARAMS_VER;
        session_params.deviceType = crate::sys::NV_ENC_DEVICE_TYPE::NV_ENC_DEVICE_TYPE_CUDA;
        session_params.device = cuda_context;
        session_params.apiVersion = crate::sys::NVENCAPI_VERSION;

        let status = (functions.nvEncOpenEncodeSessionEx.unwrap_unchecked())(
            &mut session_params,
            &mut raw_encoder,
        );

        match NvEncError::from_nvenc_status(status as i32) {
            // Should not be null if `nvEncOpenEncodeSessionEx` succeeded
            None => NonNull::new(raw_encoder).ok_or(NvEncError::default()),
            Some(err) => Err(err),
        }
    }
}

/// Checks the function list for null pointers. They all need to be valid since they are going to
/// be `unwrap_unchecked` later.
fn is_function_list_valid(functions: &crate::sys::NV_ENCODE_API_FUNCTION_LIST) -> bool {
    let helper = || -> Option<()> {
        functions.nvEncOpenEncodeSessionEx?;
        functions.nvEncGetEncodePresetConfigEx?;
        functions.nvEncInitializeEncoder?;
        functions.nvEncCreateBitstreamBuffer?;
        functions.nvEncDestroyBitstreamBuffer?;
        functions.nvEncRegisterResource?;
        functions.nvEncUnregisterResource?;
        functions.nvEncMapInputResource?;
        functions.nvEncUnmapInputResource?;
        functions.nvEncEncodePicture?;
        functions.nvEncLockBitstream?;
        functions.nvEncUnlockBitstream?;
        functions.nvEncGetSequenceParams?;
        functions.nvEncDestroyEncoder?;
        Some(())
    };
    helper().is_some()
}

/// NVENC session opened on a CUDA context.
pub struct RawEncoder {
    encoder_ptr: NonNull<c_void>,
    functions: crate::sys::NV_ENCODE_API_FUNCTION_LIST,
    // Keeps the .dll loaded for as long as `functions` is used
    _library: Library,
}

impl Drop for RawEncoder {
    fn drop(&mut self) {
        unsafe {
            let _ =
                (self.functions.nvEncDestroyEncoder.unwrap_unchecked())(self.encoder_ptr.as_ptr());
        }
    }
}

impl RawEncoder {
    /// Load `nvEncodeAPI64.dll` and open a session on `cuda_context` (a `CUcontext`).
    pub fn open_cuda(cuda_context: *mut c_void) -> Result<Self> {
        let library = Library::load_signed(Library::NVENC)?;

        let max_version = library.get_max_supported_version()?;
        let current_version =
            (crate::sys::NVENCAPI_MAJOR_VERSION << 4) | crate::sys::NVENCAPI_MINOR_VERSION;
        if current_version > max_version {
            tracing::error!(
                current_version,
                max_version,
                "Driver does not support this NVENC API version"
            );
            return Err(NvEncError::UnsupportedVersion);
        }

        let functions = library.get_function_list()?;
        if !is_function_list_valid(&functions) {
            return Err(NvEncError::MalformedFunctionList);
        }

        Ok(RawEncoder {
            encoder_ptr: open_encode_session(&functions, cuda_context)?,
            functions,
            _library: library,
        })
    }

    #[inline]
    pub(crate) unsafe fn get_encode_preset_config_ex(
        &self,
        encode_guid: crate::sys::GUID,
        preset_guid: crate::sys::GUID,
        tuning_info: crate::sys::NV_ENC_TUNING_INFO,
        preset_config: *mut crate::sys::NV_ENC_PRESET_CONFIG,
    ) -> Result<()> {
        nvenc_function!(
            self.nvEncGetEncodePresetConfigEx,
            encode_guid,
            preset_guid,
            tuning_info,
            preset_config
        );
        Ok(())
    }
}

unsafe impl EncodeApi for RawEncoder {
    fn initialize(&mut self, config: &SessionConfig) -> Result<()> {
        let mut init_params = InitParams::new(self, config)?;
        unsafe {
            nvenc_function!(self.nvEncInitializeEncoder, init_params.as_mut_ptr());
        }
        Ok(())
    }

    fn create_bitstream_buffer(&mut self) -> Result<BitstreamBuffer> {
        unsafe {
            let mut params: crate::sys::NV_ENC_CREATE_BITSTREAM_BUFFER =
                MaybeUninit::zeroed().assume_init();
            params.version = crate::sys::NV_ENC_CREATE_BITSTREAM_BUFFER_VER;
            nvenc_function!(self.nvEncCreateBitstreamBuffer, &mut params);
            BitstreamBuffer::new(params.bitstreamBuffer).ok_or(NvEncError::default())
        }
    }

    fn destroy_bitstream_buffer(&mut self, buffer: BitstreamBuffer) -> Result<()> {
        unsafe {
            nvenc_function!(self.nvEncDestroyBitstreamBuffer, buffer.as_ptr());
        }
        Ok(())
    }

    fn register_resource(&mut self, input: &InputResource) -> Result<RegisteredInput> {
        let (resource_type, resource) = match input.memory {
            DeviceMemory::Array(array) => (
                crate::sys::NV_ENC_INPUT_RESOURCE_TYPE::NV_ENC_INPUT_RESOURCE_TYPE_CUDAARRAY,
                array.as_ptr(),
            ),
            DeviceMemory::Linear { ptr, .. } => (
                crate::sys::NV_ENC_INPUT_RESOURCE_TYPE::NV_ENC_INPUT_RESOURCE_TYPE_CUDADEVICEPTR,
                ptr as *mut c_void,
            ),
        };

        unsafe {
            let mut params: crate::sys::NV_ENC_REGISTER_RESOURCE =
                MaybeUninit::zeroed().assume_init();
            params.version = crate::sys::NV_ENC_REGISTER_RESOURCE_VER;
            params.resourceType = resource_type;
            params.resourceToRegister = resource;
            params.width = input.width;
            params.height = input.height;
            params.pitch = input.pitch;
            params.bufferFormat = nvenc_buffer_format(input.format);
            params.bufferUsage = crate::sys::NV_ENC_BUFFER_USAGE::NV_ENC_INPUT_IMAGE;
            nvenc_function!(self.nvEncRegisterResource, &mut params);
            RegisteredInput::new(params.registeredResource).ok_or(NvEncError::default())
        }
    }

    fn unregister_resource(&mut self, registered: RegisteredInput) -> Result<()> {
        unsafe {
            nvenc_function!(self.nvEncUnregisterResource, registered.as_ptr());
        }
        Ok(())
    }

    fn map_input_resource(&mut self, registered: RegisteredInput) -> Result<MappedInput> {
        unsafe {
            let mut params: crate::sys::NV_ENC_MAP_INPUT_RESOURCE =
                MaybeUninit::zeroed().assume_init();
            params.version = crate::sys::NV_ENC_MAP_INPUT_RESOURCE_VER;
            params.registeredResource = registered.as_ptr();
            nvenc_function!(self.nvEncMapInputResource, &mut params);
            MappedInput::new(params.mappedResource).ok_or(NvEncError::default())
        }
    }

    fn unmap_input_resource(&mut self, mapped: MappedInput) -> Result<()> {
        unsafe {
            nvenc_function!(self.nvEncUnmapInputResource, mapped.as_ptr());
        }
        Ok(())
    }

    fn encode_picture(&mut self, picture: &PictureParams) -> Result<()> {
        unsafe {
            let mut params: crate::sys::NV_ENC_PIC_PARAMS = MaybeUninit::zeroed().assume_init();
            params.version = crate::sys::NV_ENC_PIC_PARAMS_VER;
            params.inputWidth = picture.width;
            params.inputHeight = picture.height;
            params.inputPitch = picture.pitch;
            params.inputBuffer = picture.input.as_ptr();
            params.outputBitstream = picture.output.as_ptr();
            params.bufferFmt = nvenc_buffer_format(picture.format);
            params.pictureStruct = crate::sys::NV_ENC_PIC_STRUCT::NV_ENC_PIC_STRUCT_FRAME;
            params.frameIdx = picture.frame_index as u32;
            params.inputTimeStamp = picture.timestamp;
            nvenc_function!(self.nvEncEncodePicture, &mut params);
        }
        Ok(())
    }

    fn end_of_stream(&mut self) -> Result<()> {
        unsafe {
            let mut params: crate::sys::NV_ENC_PIC_PARAMS = MaybeUninit::zeroed().assume_init();
            params.version = crate::sys::NV_ENC_PIC_PARAMS_VER;
            params.encodePicFlags = crate::sys::NV_ENC_PIC_FLAGS::NV_ENC_PIC_FLAG_EOS as u32;
            nvenc_function!(self.nvEncEncodePicture, &mut params);
        }
        Ok(())
    }

    fn lock_bitstream(&mut self, buffer: BitstreamBuffer) -> Result<LockedBitstream> {
        unsafe {
            let mut params: crate::sys::NV_ENC_LOCK_BITSTREAM =
                MaybeUninit::zeroed().assume_init();
            params.version = crate::sys::NV_ENC_LOCK_BITSTREAM_VER;
            params.outputBitstream = buffer.as_ptr();
            nvenc_function!(self.nvEncLockBitstream, &mut params);

            let keyframe = matches!(
                params.pictureType,
                crate::sys::NV_ENC_PIC_TYPE::NV_ENC_PIC_TYPE_IDR
                    | crate::sys::NV_ENC_PIC_TYPE::NV_ENC_PIC_TYPE_I
            );
            Ok(LockedBitstream {
                data: params.bitstreamBufferPtr as *const u8,
                len: params.bitstreamSizeInBytes as usize,
                frame_index: params.frameIdx as u64,
                timestamp: params.outputTimeStamp,
                keyframe,
            })
        }
    }

    fn unlock_bitstream(&mut self, buffer: BitstreamBuffer) -> Result<()> {
        unsafe {
            nvenc_function!(self.nvEncUnlockBitstream, buffer.as_ptr());
        }
        Ok(())
    }

    fn sequence_params(&mut self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; 1024];
        let mut size: u32 = 0;
        unsafe {
            let mut payload: crate::sys::NV_ENC_SEQUENCE_PARAM_PAYLOAD =
                MaybeUninit::zeroed().assume_init();
            payload.version = crate::sys::NV_ENC_SEQUENCE_PARAM_PAYLOAD_VER;
            payload.inBufferSize = buf.len() as u32;
            payload.spsppsBuffer = buf.as_mut_ptr() as *mut c_void;
            payload.outSPSPPSPayloadSize = &mut size;
            nvenc_function!(self.nvEncGetSequenceParams, &mut payload);
        }
        buf.truncate(size as usize);
        Ok(buf)
    }
}
