use super::encoder::MockEncoder;
use desktop_capture::{
    convert::VideoProcessor,
    device::DeviceBridge,
    interop::{GraphicsInterop, ViewKind},
    ConvertError, DeviceError, InteropError,
};
use nvenc::{DeviceMemory, NvEncError, NvEncStatus};
use std::{
    cell::{Cell, RefCell},
    collections::HashSet,
    os::raw::c_void,
    ptr::NonNull,
    rc::Rc,
};
use video_source::{PixelFormat, Surface, SurfaceDesc, SurfaceId};

#[derive(Debug, Clone)]
pub struct MockSurface {
    pub id: usize,
    pub desc: SurfaceDesc,
}

impl MockSurface {
    pub fn new(id: usize, width: u32, height: u32, format: PixelFormat) -> Self {
        MockSurface {
            id,
            desc: SurfaceDesc {
                width,
                height,
                format,
            },
        }
    }
}

impl Surface for MockSurface {
    fn id(&self) -> SurfaceId {
        SurfaceId(self.id)
    }

    fn desc(&self) -> SurfaceDesc {
        self.desc
    }
}

/// Calls observed across every stage created by one `MockBridge`.
#[derive(Debug, Default)]
pub struct Counters {
    pub surfaces_created: usize,
    pub processor_states: usize,
    pub output_views: usize,
    pub blits: usize,
    pub registered: usize,
    pub unregistered: usize,
    pub mapped: usize,
    pub unmapped: usize,
    pub encoders_opened: usize,
    pub encoded: usize,
    pub end_of_stream: usize,
    /// Inputs registered with the encoder.
    pub input_registrations: usize,
    /// Bitstreams locked while the surface they were encoded from was not mapped.
    pub locked_while_unmapped: usize,
    /// Surfaces currently mapped into the compute context.
    pub live: HashSet<usize>,
    /// Pictures the encoder buffers before producing output.
    pub hold_first: usize,
    /// Frame index whose bitstream cannot be locked.
    pub unreadable: Option<u64>,
    /// Encode calls left before one fails.
    pub fail_encode_after: Option<usize>,
    pub fail_blit: Option<ConvertError>,
}

pub type Shared = Rc<RefCell<Counters>>;

pub struct MockBridge {
    pub counters: Shared,
    next_surface: Cell<usize>,
}

impl MockBridge {
    pub fn new() -> Self {
        MockBridge {
            counters: Rc::new(RefCell::new(Counters::default())),
            next_surface: Cell::new(1000),
        }
    }
}

impl DeviceBridge for MockBridge {
    type Surface = MockSurface;
    type Processor = MockProcessor;
    type Interop = MockInterop;
    type Encoder = MockEncoder;

    fn create_processor(&self) -> Result<MockProcessor, ConvertError> {
        Ok(MockProcessor {
            counters: self.counters.clone(),
        })
    }

    fn create_interop(&self) -> Result<MockInterop, InteropError> {
        Ok(MockInterop {
            counters: self.counters.clone(),
        })
    }

    fn open_encoder(&self) -> Result<MockEncoder, NvEncError> {
        self.counters.borrow_mut().encoders_opened += 1;
        Ok(MockEncoder::new(self.counters.clone()))
    }

    fn create_encode_surface(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<MockSurface, DeviceError> {
        let id = self.next_surface.get();
        self.next_surface.set(id + 1);
        self.counters.borrow_mut().surfaces_created += 1;
        Ok(MockSurface::new(id, width, height, format))
    }

    fn view_kind(&self) -> ViewKind {
        ViewKind::Array
    }
}

pub struct MockProcessor {
    counters: Shared,
}

impl VideoProcessor for MockProcessor {
    type Surface = MockSurface;
    type State = ();
    type InputView = SurfaceId;
    type OutputView = SurfaceId;

    fn create_state(&mut self, _input: &SurfaceDesc, _output: &SurfaceDesc) -> Result<(), ConvertError> {
        self.counters.borrow_mut().processor_states += 1;
        Ok(())
    }

    fn create_input_view(&mut self, _state: &(), src: &MockSurface) -> Result<SurfaceId, ConvertError> {
        Ok(src.id())
    }

    fn create_output_view(&mut self, _state: &(), dst: &MockSurface) -> Result<SurfaceId, ConvertError> {
        self.counters.borrow_mut().output_views += 1;
        Ok(dst.id())
    }

    fn blit(&mut self, _state: &(), _input: &SurfaceId, _output: &SurfaceId) -> Result<(), ConvertError> {
        let mut counters = self.counters.borrow_mut();
        if let Some(err) = counters.fail_blit.take() {
            return Err(err);
        }
        counters.blits += 1;
        Ok(())
    }
}

pub struct MockInterop {
    counters: Shared,
}

impl GraphicsInterop for MockInterop {
    type Surface = MockSurface;
    type Resource = usize;

    fn register(&mut self, surface: &MockSurface) -> Result<usize, InteropError> {
        self.counters.borrow_mut().registered += 1;
        Ok(surface.id)
    }

    fn map(&mut self, resource: &usize) -> Result<(), InteropError> {
        let mut counters = self.counters.borrow_mut();
        counters.mapped += 1;
        counters.live.insert(*resource);
        Ok(())
    }

    fn resolve(&mut self, resource: &usize, _kind: ViewKind) -> Result<DeviceMemory, InteropError> {
        let array = NonNull::new((*resource * SURFACE_STRIDE) as *mut c_void)
            .ok_or_else(|| InteropError::ResolveView("null".to_owned()))?;
        Ok(DeviceMemory::Array(array))
    }

    fn unmap(&mut self, resource: &usize) -> Result<(), InteropError> {
        let mut counters = self.counters.borrow_mut();
        counters.unmapped += 1;
        counters.live.remove(resource);
        Ok(())
    }

    fn unregister(&mut self, _resource: usize) -> Result<(), InteropError> {
        self.counters.borrow_mut().unregistered += 1;
        Ok(())
    }
}

/// Mapped surfaces resolve to `id * SURFACE_STRIDE`, so the encoder can tell which surface an
/// input came from.
pub const SURFACE_STRIDE: usize = 0x1000;

/// Surface behind memory handed out by `MockInterop`.
pub fn surface_of(memory: DeviceMemory) -> usize {
    match memory {
        DeviceMemory::Array(array) => array.as_ptr() as usize / SURFACE_STRIDE,
        DeviceMemory::Linear { ptr, .. } => ptr as usize / SURFACE_STRIDE,
    }
}

/// Error the mock encoder returns when told to fail.
pub fn encode_failure() -> NvEncError {
    NvEncError::Status(NvEncStatus::EncoderBusy)
}
