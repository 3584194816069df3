use super::{GraphicsInterop, ViewKind};
use crate::error::InteropError;
use cudarc::driver::{sys, CudaContext};
use nvenc::{DeviceMemory, Library};
use std::{os::raw::c_void, ptr::NonNull, sync::Arc};
use video_source::{PixelFormat, Surface};
use windows::{core::Interface, Win32::Graphics::Direct3D11::ID3D11Texture2D};

/// `cuGraphicsD3D11RegisterResource`. cudarc only binds the platform independent driver API.
type RegisterResourceFn = unsafe extern "system" fn(
    *mut sys::CUgraphicsResource,
    *mut c_void,
    std::os::raw::c_uint,
) -> sys::CUresult;

pub struct CudaResource {
    handle: sys::CUgraphicsResource,
    row_bytes: u32,
}

/// Maps D3D11 textures into a CUDA context.
pub struct CudaD3D11Interop {
    context: Arc<CudaContext>,
    register_resource: RegisterResourceFn,
    // Keeps `register_resource` valid
    _library: Library,
}

impl CudaD3D11Interop {
    pub fn new(context: Arc<CudaContext>) -> Result<Self, InteropError> {
        let library = Library::load_signed("nvcuda.dll")
            .map_err(|err| InteropError::Registration(err.to_string()))?;
        let register_resource: RegisterResourceFn = unsafe {
            library
                .fn_ptr("cuGraphicsD3D11RegisterResource")
                .ok_or_else(|| {
                    InteropError::Registration(
                        "nvcuda.dll does not export cuGraphicsD3D11RegisterResource".to_owned(),
                    )
                })?
        };

        Ok(CudaD3D11Interop {
            context,
            register_resource,
            _library: library,
        })
    }

    fn bind(&self) -> Result<(), String> {
        self.context.bind_to_thread().map_err(|err| err.to_string())
    }
}

fn check(result: sys::CUresult) -> Result<(), String> {
    result.result().map_err(|err| err.to_string())
}

fn bytes_per_pixel(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Nv12 => 1,
        _ => 4,
    }
}

impl GraphicsInterop for CudaD3D11Interop {
    type Surface = ID3D11Texture2D;
    type Resource = CudaResource;

    fn register(&mut self, surface: &ID3D11Texture2D) -> Result<CudaResource, InteropError> {
        self.bind().map_err(InteropError::Registration)?;

        let desc = surface.desc();
        let mut handle: sys::CUgraphicsResource = std::ptr::null_mut();
        unsafe {
            check((self.register_resource)(
                &mut handle,
                surface.as_raw(),
                sys::CUgraphicsRegisterFlags_enum::CU_GRAPHICS_REGISTER_FLAGS_NONE as u32,
            ))
            .map_err(InteropError::Registration)?;
        }
        if handle.is_null() {
            return Err(InteropError::Registration("null resource".to_owned()));
        }

        Ok(CudaResource {
            handle,
            row_bytes: desc.width * bytes_per_pixel(desc.format),
        })
    }

    fn map(&mut self, resource: &CudaResource) -> Result<(), InteropError> {
        self.bind().map_err(InteropError::Map)?;
        let mut handle = resource.handle;
        unsafe {
            check(sys::cuGraphicsMapResources(
                1,
                &mut handle,
                std::ptr::null_mut(),
            ))
            .map_err(InteropError::Map)
        }
    }

    fn resolve(
        &mut self,
        resource: &CudaResource,
        kind: ViewKind,
    ) -> Result<DeviceMemory, InteropError> {
        match kind {
            ViewKind::Array => {
                let mut array: sys::CUarray = std::ptr::null_mut();
                unsafe {
                    check(sys::cuGraphicsSubResourceGetMappedArray(
                        &mut array,
                        resource.handle,
                        0,
                        0,
                    ))
                    .map_err(InteropError::ResolveView)?;
                }
                NonNull::new(array as *mut c_void)
                    .map(DeviceMemory::Array)
                    .ok_or_else(|| InteropError::ResolveView("null array".to_owned()))
            }
            ViewKind::Linear => {
                let mut ptr: sys::CUdeviceptr = 0;
                let mut size: usize = 0;
                unsafe {
                    check(sys::cuGraphicsResourceGetMappedPointer_v2(
                        &mut ptr,
                        &mut size,
                        resource.handle,
                    ))
                    .map_err(InteropError::ResolveView)?;
                }
                Ok(DeviceMemory::Linear {
                    ptr,
                    pitch: resource.row_bytes,
                })
            }
        }
    }

    fn unmap(&mut self, resource: &CudaResource) -> Result<(), InteropError> {
        self.bind().map_err(InteropError::Map)?;
        let mut handle = resource.handle;
        unsafe {
            check(sys::cuGraphicsUnmapResources(
                1,
                &mut handle,
                std::ptr::null_mut(),
            ))
            .map_err(InteropError::Map)
        }
    }

    fn unregister(&mut self, resource: CudaResource) -> Result<(), InteropError> {
        self.bind().map_err(InteropError::Registration)?;
        unsafe {
            check(sys::cuGraphicsUnregisterResource(resource.handle))
                .map_err(InteropError::Registration)
        }
    }
}
