use crate::{CaptureOutcome, CaptureProvider, CapturedFrame, Error};
use std::{mem::MaybeUninit, time::Duration};
use windows::{
    core::ComInterface,
    Win32::{
        Foundation::HANDLE,
        Graphics::{
            Direct3D11::{ID3D11Device, ID3D11Texture2D},
            Dxgi::{
                Common::{
                    DXGI_FORMAT, DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_FORMAT_R10G10B10A2_UNORM,
                    DXGI_FORMAT_R8G8B8A8_UNORM,
                },
                IDXGIDevice, IDXGIOutput, IDXGIOutput1, IDXGIOutput5, IDXGIOutputDuplication,
                DXGI_ERROR_NOT_FOUND, DXGI_ERROR_WAIT_TIMEOUT, DXGI_OUTDUPL_DESC,
            },
        },
        UI::HiDpi::{
            GetProcessDpiAwareness, SetProcessDpiAwareness, PROCESS_PER_MONITOR_DPI_AWARE,
            PROCESS_SYSTEM_DPI_AWARE,
        },
    },
};

/// Formats offered to `IDXGIOutput5::DuplicateOutput1`, in order of preference.
const SUPPORTED_FORMATS: [DXGI_FORMAT; 3] = [
    DXGI_FORMAT_B8G8R8A8_UNORM,
    DXGI_FORMAT_R10G10B10A2_UNORM,
    DXGI_FORMAT_R8G8B8A8_UNORM,
];

/// DXGI desktop duplication of one display.
pub struct DisplayDuplicator {
    device: ID3D11Device,
    display_index: u32,
    dpi_aware: bool,
    output_duplication: Option<IDXGIOutputDuplication>,
    frame_held: bool,
}

/// SAFETY: This is just a COM pointer
unsafe impl Send for DisplayDuplicator {}

impl DisplayDuplicator {
    /// Does not start duplicating until `CaptureProvider::init`.
    pub fn new(device: ID3D11Device, display_index: u32) -> Self {
        let dpi_aware = match try_set_dpi_aware() {
            Ok(aware) => aware,
            Err(e) => {
                tracing::warn!("Could not make the process DPI aware: {}", e);
                false
            }
        };

        DisplayDuplicator {
            device,
            display_index,
            dpi_aware,
            output_duplication: None,
            frame_held: false,
        }
    }

    /// Returns a description of the display that is currently being duplicated.
    pub fn desc(&self) -> Option<DXGI_OUTDUPL_DESC> {
        let output_duplication = self.output_duplication.as_ref()?;
        let mut dupl_desc = MaybeUninit::uninit();
        unsafe {
            // NOTE: `GetDesc` always succeeds if the `IDXGIOutputDuplication` used is valid
            output_duplication.GetDesc(dupl_desc.as_mut_ptr());
            Some(dupl_desc.assume_init())
        }
    }

    fn new_output_duplicator(&self) -> Result<IDXGIOutputDuplication, Error> {
        let dxgi_device: IDXGIDevice = self.device.cast()?;

        let dxgi_output = unsafe {
            let adapter = dxgi_device.GetAdapter()?;
            match adapter.EnumOutputs(self.display_index) {
                Ok(output) => output,
                Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => {
                    return Err(Error::NoDisplay(self.display_index))
                }
                Err(e) => return Err(e.into()),
            }
        };

        if self.dpi_aware {
            match hdr_duplicator(&dxgi_output, &dxgi_device) {
                Ok(duplicator) => return Ok(duplicator),
                Err(e) => tracing::warn!("DuplicateOutput1 failed, falling back: {}", e),
            }
        }

        // Fallback to IDXGIOutput1 duplication
        Ok(sdr_duplicator(&dxgi_output, &dxgi_device)?)
    }
}

impl CaptureProvider for DisplayDuplicator {
    type Surface = ID3D11Texture2D;

    fn init(&mut self) -> Result<(), Error> {
        self.cleanup();
        self.output_duplication = Some(self.new_output_duplicator()?);

        if let Some(desc) = self.desc() {
            tracing::info!(
                display = self.display_index,
                width = desc.ModeDesc.Width,
                height = desc.ModeDesc.Height,
                format = desc.ModeDesc.Format.0,
                "Display duplication started"
            );
        }
        Ok(())
    }

    fn acquire_frame(&mut self, wait: Duration) -> Result<CaptureOutcome<ID3D11Texture2D>, Error> {
        self.release_frame()?;
        let output_duplication = self
            .output_duplication
            .as_ref()
            .ok_or(Error::NotInitialized)?;

        let timeout_millis = u32::try_from(wait.as_millis()).unwrap_or(u32::MAX);
        let (resource, frame_info) = unsafe {
            let mut frame_info = MaybeUninit::uninit();
            let mut resource = None;

            match output_duplication.AcquireNextFrame(
                timeout_millis,
                frame_info.as_mut_ptr(),
                &mut resource,
            ) {
                Ok(()) => (),
                Err(e) if e.code() == DXGI_ERROR_WAIT_TIMEOUT => {
                    return Ok(CaptureOutcome::Timeout)
                }
                Err(e) => return Err(e.into()),
            }

            // SAFETY: `frame_info` is initialized if `AcquireNextFrame` succeeds
            (resource, frame_info.assume_init())
        };
        self.frame_held = true;

        let surface: ID3D11Texture2D = resource.ok_or(Error::InternalError)?.cast()?;
        Ok(CaptureOutcome::Frame(CapturedFrame {
            surface,
            timestamp: frame_info.LastPresentTime,
        }))
    }

    fn release_frame(&mut self) -> Result<(), Error> {
        if !self.frame_held {
            return Ok(());
        }
        self.frame_held = false;
        if let Some(output_duplication) = &self.output_duplication {
            unsafe { output_duplication.ReleaseFrame()? };
        }
        Ok(())
    }

    fn cleanup(&mut self) {
        if let Err(e) = self.release_frame() {
            tracing::warn!("ReleaseFrame during cleanup failed: {}", e);
        }
        if self.output_duplication.take().is_some() {
            tracing::debug!(display = self.display_index, "Display duplication released");
        }
    }

    /// A 60 Hz refresh rate for example gives a 16.67 ms interval.
    fn refresh_interval(&self) -> Option<Duration> {
        let desc = self.desc()?;
        let num = desc.ModeDesc.RefreshRate.Numerator;
        let den = desc.ModeDesc.RefreshRate.Denominator;
        if num == 0 || den == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(den as f64 / num as f64))
    }
}

impl Drop for DisplayDuplicator {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn hdr_duplicator(
    dxgi_output: &IDXGIOutput,
    dxgi_device: &IDXGIDevice,
) -> Result<IDXGIOutputDuplication, windows::core::Error> {
    const RESERVED_FLAG: u32 = 0;
    let hdr_output: IDXGIOutput5 = dxgi_output.cast()?;
    unsafe { hdr_output.DuplicateOutput1(dxgi_device, RESERVED_FLAG, &SUPPORTED_FORMATS) }
}

fn sdr_duplicator(
    dxgi_output: &IDXGIOutput,
    dxgi_device: &IDXGIDevice,
) -> Result<IDXGIOutputDuplication, windows::core::Error> {
    let sdr_output: IDXGIOutput1 = dxgi_output.cast()?;
    unsafe { sdr_output.DuplicateOutput(dxgi_device) }
}

/// Attempt to signal to the OS that the process is DPI aware.
/// Returns the DPI awareness.
fn try_set_dpi_aware() -> Result<bool, windows::core::Error> {
    unsafe {
        // Fails if the awareness was already set, which is fine
        let _ = SetProcessDpiAwareness(PROCESS_PER_MONITOR_DPI_AWARE);
        let awareness = GetProcessDpiAwareness(HANDLE::default())?;
        Ok(awareness == PROCESS_SYSTEM_DPI_AWARE || awareness == PROCESS_PER_MONITOR_DPI_AWARE)
    }
}
