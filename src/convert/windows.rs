use super::VideoProcessor;
use crate::error::ConvertError;
use std::mem::ManuallyDrop;
use video_source::{PixelFormat, SurfaceDesc};
use windows::{
    core::ComInterface,
    Win32::{
        Foundation::TRUE,
        Graphics::{
            Direct3D11::{
                ID3D11Device, ID3D11Texture2D, ID3D11VideoContext, ID3D11VideoDevice,
                ID3D11VideoProcessor, ID3D11VideoProcessorEnumerator,
                ID3D11VideoProcessorInputView, ID3D11VideoProcessorOutputView,
                D3D11_TEX2D_VPIV, D3D11_TEX2D_VPOV, D3D11_VIDEO_FRAME_FORMAT_PROGRESSIVE,
                D3D11_VIDEO_PROCESSOR_CONTENT_DESC, D3D11_VIDEO_PROCESSOR_FORMAT_SUPPORT_INPUT,
                D3D11_VIDEO_PROCESSOR_FORMAT_SUPPORT_OUTPUT, D3D11_VIDEO_PROCESSOR_INPUT_VIEW_DESC,
                D3D11_VIDEO_PROCESSOR_INPUT_VIEW_DESC_0, D3D11_VIDEO_PROCESSOR_OUTPUT_VIEW_DESC,
                D3D11_VIDEO_PROCESSOR_OUTPUT_VIEW_DESC_0, D3D11_VIDEO_PROCESSOR_STREAM,
                D3D11_VIDEO_USAGE_PLAYBACK_NORMAL, D3D11_VPIV_DIMENSION_TEXTURE2D,
                D3D11_VPOV_DIMENSION_TEXTURE2D,
            },
            Dxgi::{
                Common::{DXGI_FORMAT, DXGI_RATIONAL},
                DXGI_ERROR_DEVICE_HUNG, DXGI_ERROR_DEVICE_REMOVED, DXGI_ERROR_DEVICE_RESET,
            },
        },
    },
};

impl From<windows::core::Error> for ConvertError {
    fn from(value: windows::core::Error) -> Self {
        tracing::error!("{}", value);

        match value.code() {
            DXGI_ERROR_DEVICE_REMOVED | DXGI_ERROR_DEVICE_RESET | DXGI_ERROR_DEVICE_HUNG => {
                ConvertError::DeviceLost
            }
            _ => ConvertError::Backend(value.message().to_string()),
        }
    }
}

pub struct ProcessorState {
    enumerator: ID3D11VideoProcessorEnumerator,
    processor: ID3D11VideoProcessor,
}

/// `ID3D11VideoProcessor` based conversion on the capture device.
pub struct D3D11VideoProcessor {
    video_device: ID3D11VideoDevice,
    video_context: ID3D11VideoContext,
}

impl D3D11VideoProcessor {
    pub fn new(device: &ID3D11Device) -> Result<Self, ConvertError> {
        let video_device: ID3D11VideoDevice = device.cast()?;
        let video_context: ID3D11VideoContext = unsafe { device.GetImmediateContext()? }.cast()?;
        Ok(D3D11VideoProcessor {
            video_device,
            video_context,
        })
    }
}

fn check_format(
    enumerator: &ID3D11VideoProcessorEnumerator,
    format: PixelFormat,
    required: u32,
) -> Result<(), ConvertError> {
    let raw = u32::from(format);
    let support = unsafe { enumerator.CheckVideoProcessorFormat(DXGI_FORMAT(raw))? };
    if support & required == 0 {
        return Err(ConvertError::UnsupportedFormat(raw));
    }
    Ok(())
}

impl VideoProcessor for D3D11VideoProcessor {
    type Surface = ID3D11Texture2D;
    type State = ProcessorState;
    type InputView = ID3D11VideoProcessorInputView;
    type OutputView = ID3D11VideoProcessorOutputView;

    fn create_state(
        &mut self,
        input: &SurfaceDesc,
        output: &SurfaceDesc,
    ) -> Result<ProcessorState, ConvertError> {
        // Frame rates are only hints to the driver
        let rate = DXGI_RATIONAL {
            Numerator: 1,
            Denominator: 1,
        };
        let content_desc = D3D11_VIDEO_PROCESSOR_CONTENT_DESC {
            InputFrameFormat: D3D11_VIDEO_FRAME_FORMAT_PROGRESSIVE,
            InputFrameRate: rate,
            InputWidth: input.width,
            InputHeight: input.height,
            OutputFrameRate: rate,
            OutputWidth: output.width,
            OutputHeight: output.height,
            Usage: D3D11_VIDEO_USAGE_PLAYBACK_NORMAL,
        };

        unsafe {
            let enumerator = self
                .video_device
                .CreateVideoProcessorEnumerator(&content_desc)?;
            check_format(
                &enumerator,
                input.format,
                D3D11_VIDEO_PROCESSOR_FORMAT_SUPPORT_INPUT.0 as u32,
            )?;
            check_format(
                &enumerator,
                output.format,
                D3D11_VIDEO_PROCESSOR_FORMAT_SUPPORT_OUTPUT.0 as u32,
            )?;
            let processor = self.video_device.CreateVideoProcessor(&enumerator, 0)?;

            Ok(ProcessorState {
                enumerator,
                processor,
            })
        }
    }

    fn create_input_view(
        &mut self,
        state: &ProcessorState,
        src: &ID3D11Texture2D,
    ) -> Result<ID3D11VideoProcessorInputView, ConvertError> {
        let view_desc = D3D11_VIDEO_PROCESSOR_INPUT_VIEW_DESC {
            FourCC: 0,
            ViewDimension: D3D11_VPIV_DIMENSION_TEXTURE2D,
            Anonymous: D3D11_VIDEO_PROCESSOR_INPUT_VIEW_DESC_0 {
                Texture2D: D3D11_TEX2D_VPIV {
                    MipSlice: 0,
                    ArraySlice: 0,
                },
            },
        };

        let mut view = None;
        unsafe {
            self.video_device.CreateVideoProcessorInputView(
                src,
                &state.enumerator,
                &view_desc,
                Some(&mut view),
            )?;
        }
        view.ok_or_else(|| ConvertError::Backend("null input view".to_owned()))
    }

    fn create_output_view(
        &mut self,
        state: &ProcessorState,
        dst: &ID3D11Texture2D,
    ) -> Result<ID3D11VideoProcessorOutputView, ConvertError> {
        let view_desc = D3D11_VIDEO_PROCESSOR_OUTPUT_VIEW_DESC {
            ViewDimension: D3D11_VPOV_DIMENSION_TEXTURE2D,
            Anonymous: D3D11_VIDEO_PROCESSOR_OUTPUT_VIEW_DESC_0 {
                Texture2D: D3D11_TEX2D_VPOV { MipSlice: 0 },
            },
        };

        let mut view = None;
        unsafe {
            self.video_device.CreateVideoProcessorOutputView(
                dst,
                &state.enumerator,
                &view_desc,
                Some(&mut view),
            )?;
        }
        view.ok_or_else(|| ConvertError::Backend("null output view".to_owned()))
    }

    fn blit(
        &mut self,
        state: &ProcessorState,
        input: &ID3D11VideoProcessorInputView,
        output: &ID3D11VideoProcessorOutputView,
    ) -> Result<(), ConvertError> {
        let mut stream = D3D11_VIDEO_PROCESSOR_STREAM {
            Enable: TRUE,
            pInputSurface: ManuallyDrop::new(Some(input.clone())),
            ..Default::default()
        };

        let result = unsafe {
            self.video_context.VideoProcessorBlt(
                &state.processor,
                output,
                0,
                std::slice::from_ref(&stream),
            )
        };
        // Balance the clone above
        unsafe { ManuallyDrop::drop(&mut stream.pInputSurface) };

        Ok(result?)
    }
}
