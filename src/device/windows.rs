use super::DeviceBridge;
use crate::{
    convert::D3D11VideoProcessor,
    error::{ConvertError, DeviceError, InteropError},
    interop::CudaD3D11Interop,
};
use cudarc::driver::CudaContext;
use nvenc::{NvEncError, RawEncoder};
use std::sync::Arc;
use video_source::PixelFormat;
use windows::{
    core::ComInterface,
    Win32::Graphics::{
        Direct3D::{
            D3D_DRIVER_TYPE, D3D_DRIVER_TYPE_HARDWARE, D3D_DRIVER_TYPE_REFERENCE,
            D3D_DRIVER_TYPE_WARP, D3D_FEATURE_LEVEL, D3D_FEATURE_LEVEL_10_0,
            D3D_FEATURE_LEVEL_10_1, D3D_FEATURE_LEVEL_11_0, D3D_FEATURE_LEVEL_11_1,
            D3D_FEATURE_LEVEL_9_1,
        },
        Direct3D11::{
            D3D11CreateDevice, ID3D11Device, ID3D11Multithread, ID3D11Texture2D,
            D3D11_BIND_RENDER_TARGET, D3D11_CPU_ACCESS_FLAG, D3D11_CREATE_DEVICE_DEBUG,
            D3D11_CREATE_DEVICE_FLAG, D3D11_RESOURCE_MISC_FLAG, D3D11_SDK_VERSION,
            D3D11_TEXTURE2D_DESC, D3D11_USAGE_DEFAULT,
        },
        Dxgi::Common::{DXGI_FORMAT, DXGI_SAMPLE_DESC},
    },
};

const DRIVER_TYPES: [D3D_DRIVER_TYPE; 3] = [
    D3D_DRIVER_TYPE_HARDWARE,
    D3D_DRIVER_TYPE_WARP,
    D3D_DRIVER_TYPE_REFERENCE,
];

const FEATURE_LEVELS: [D3D_FEATURE_LEVEL; 5] = [
    D3D_FEATURE_LEVEL_11_1,
    D3D_FEATURE_LEVEL_11_0,
    D3D_FEATURE_LEVEL_10_1,
    D3D_FEATURE_LEVEL_10_0,
    D3D_FEATURE_LEVEL_9_1,
];

/// One D3D11 device plus one CUDA context on the selected GPU.
pub struct D3D11CudaBridge {
    device: ID3D11Device,
    context: Arc<CudaContext>,
}

impl D3D11CudaBridge {
    pub fn new(gpu_ordinal: u32) -> Result<Self, DeviceError> {
        let device = create_d3d11_device()?;

        let count = CudaContext::device_count()
            .map_err(|err| DeviceError::Compute(err.to_string()))? as u32;
        if gpu_ordinal >= count {
            return Err(DeviceError::NoSuchGpu {
                ordinal: gpu_ordinal,
                count,
            });
        }

        let context = CudaContext::new(gpu_ordinal as usize)
            .map_err(|err| DeviceError::Compute(err.to_string()))?;
        match context.name() {
            Ok(name) => tracing::info!(ordinal = gpu_ordinal, gpu = %name, "CUDA context created"),
            Err(err) => tracing::warn!(%err, "Could not query the GPU name"),
        }

        Ok(D3D11CudaBridge { device, context })
    }

    /// Device shared with the capture provider.
    pub fn device(&self) -> &ID3D11Device {
        &self.device
    }
}

impl DeviceBridge for D3D11CudaBridge {
    type Surface = ID3D11Texture2D;
    type Processor = D3D11VideoProcessor;
    type Interop = CudaD3D11Interop;
    type Encoder = RawEncoder;

    fn create_processor(&self) -> Result<D3D11VideoProcessor, ConvertError> {
        D3D11VideoProcessor::new(&self.device)
    }

    fn create_interop(&self) -> Result<CudaD3D11Interop, InteropError> {
        CudaD3D11Interop::new(self.context.clone())
    }

    fn open_encoder(&self) -> Result<RawEncoder, NvEncError> {
        if let Err(err) = self.context.bind_to_thread() {
            tracing::error!(%err, "Could not make the CUDA context current");
            return Err(NvEncError::default());
        }
        RawEncoder::open_cuda(self.context.cu_ctx() as *mut _)
    }

    fn create_encode_surface(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<ID3D11Texture2D, DeviceError> {
        let texture_desc = D3D11_TEXTURE2D_DESC {
            Width: width,
            Height: height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT(u32::from(format)),
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_DEFAULT,
            // Video processor output views need a render target
            BindFlags: D3D11_BIND_RENDER_TARGET,
            CPUAccessFlags: D3D11_CPU_ACCESS_FLAG(0),
            MiscFlags: D3D11_RESOURCE_MISC_FLAG(0),
        };

        let mut texture = None;
        unsafe {
            self.device
                .CreateTexture2D(&texture_desc, None, Some(&mut texture))
                .map_err(|err| DeviceError::Surface(err.to_string()))?;
        }
        texture.ok_or_else(|| DeviceError::Surface("null texture".to_owned()))
    }
}

/// Create a D3D11 device, falling back to software drivers when no hardware device exists.
fn create_d3d11_device() -> Result<ID3D11Device, DeviceError> {
    let flags = if cfg!(debug_assertions) {
        D3D11_CREATE_DEVICE_DEBUG
    } else {
        D3D11_CREATE_DEVICE_FLAG(0)
    };

    let mut last_error = None;
    for driver_type in DRIVER_TYPES {
        match try_create_device(driver_type, flags) {
            Ok(device) => {
                tracing::info!(driver_type = driver_type.0, "D3D11 device created");
                return Ok(device);
            }
            // The debug layer is optional on end user machines
            Err(_) if flags != D3D11_CREATE_DEVICE_FLAG(0) => {
                match try_create_device(driver_type, D3D11_CREATE_DEVICE_FLAG(0)) {
                    Ok(device) => {
                        tracing::info!(
                            driver_type = driver_type.0,
                            "D3D11 device created without debug layer"
                        );
                        return Ok(device);
                    }
                    Err(err) => last_error = Some(err),
                }
            }
            Err(err) => last_error = Some(err),
        }
        tracing::debug!(driver_type = driver_type.0, "D3D11 driver type unavailable");
    }

    Err(DeviceError::Graphics(
        last_error.map_or_else(|| "no driver type".to_owned(), |err| err.to_string()),
    ))
}

fn try_create_device(
    driver_type: D3D_DRIVER_TYPE,
    flags: D3D11_CREATE_DEVICE_FLAG,
) -> Result<ID3D11Device, windows::core::Error> {
    let mut device = None;
    unsafe {
        D3D11CreateDevice(
            None,
            driver_type,
            None,
            flags,
            Some(FEATURE_LEVELS.as_slice()),
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            None,
        )?;
    }
    let device = device.ok_or_else(windows::core::Error::from_win32)?;

    // Capture, conversion and CUDA interop all touch the immediate context
    unsafe {
        let device_context = device.GetImmediateContext()?;
        let multithreaded: ID3D11Multithread = device_context.cast()?;
        multithreaded.SetMultithreadProtected(true);
    }
    Ok(device)
}
