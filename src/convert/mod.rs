#[cfg(windows)]
mod windows;

#[cfg(windows)]
pub use self::windows::D3D11VideoProcessor;

use crate::error::ConvertError;
use std::collections::HashMap;
use video_source::{PixelFormat, Surface, SurfaceDesc, SurfaceId};

/// GPU backend performing scaling and color conversion between two surfaces.
///
/// `State` is everything tied to a pair of input/output dimensions. Views are only valid for the
/// state they were created with.
pub trait VideoProcessor {
    type Surface: Surface;
    type State;
    type InputView;
    type OutputView;

    fn create_state(
        &mut self,
        input: &SurfaceDesc,
        output: &SurfaceDesc,
    ) -> Result<Self::State, ConvertError>;

    fn create_input_view(
        &mut self,
        state: &Self::State,
        src: &Self::Surface,
    ) -> Result<Self::InputView, ConvertError>;

    fn create_output_view(
        &mut self,
        state: &Self::State,
        dst: &Self::Surface,
    ) -> Result<Self::OutputView, ConvertError>;

    /// Queue the conversion on the GPU. Returns once it is submitted.
    fn blit(
        &mut self,
        state: &Self::State,
        input: &Self::InputView,
        output: &Self::OutputView,
    ) -> Result<(), ConvertError>;
}

struct Configured<S> {
    input: (u32, u32),
    output: (u32, u32),
    state: S,
}

/// Reformats captured surfaces into encoder input surfaces.
///
/// Processor state is rebuilt only when the input or output dimensions change, and output views
/// are created once per destination surface.
pub struct TextureConverter<P: VideoProcessor> {
    processor: P,
    configured: Option<Configured<P::State>>,
    output_views: HashMap<SurfaceId, P::OutputView>,
    rebuilds: u64,
    output_views_created: u64,
}

impl<P: VideoProcessor> TextureConverter<P> {
    pub fn new(processor: P) -> Self {
        TextureConverter {
            processor,
            configured: None,
            output_views: HashMap::new(),
            rebuilds: 0,
            output_views_created: 0,
        }
    }

    /// Convert `src` into `dst`, scaling if their sizes differ.
    pub fn convert(&mut self, src: &P::Surface, dst: &P::Surface) -> Result<(), ConvertError> {
        let input = src.desc();
        let output = dst.desc();
        validate(&input)?;
        validate(&output)?;

        let input_dims = (input.width, input.height);
        let output_dims = (output.width, output.height);
        let needs_rebuild = match &self.configured {
            Some(configured) => configured.input != input_dims || configured.output != output_dims,
            None => true,
        };

        if needs_rebuild {
            // Prior state stays in place if this fails
            let state = self.processor.create_state(&input, &output)?;
            tracing::debug!(
                src_width = input.width,
                src_height = input.height,
                dst_width = output.width,
                dst_height = output.height,
                "Video processor configured"
            );
            self.output_views.clear();
            self.configured = Some(Configured {
                input: input_dims,
                output: output_dims,
                state,
            });
            self.rebuilds += 1;
        }

        let Some(configured) = &self.configured else {
            return Err(ConvertError::Backend("video processor missing".to_owned()));
        };

        let input_view = self.processor.create_input_view(&configured.state, src)?;

        let dst_id = dst.id();
        if !self.output_views.contains_key(&dst_id) {
            let view = self.processor.create_output_view(&configured.state, dst)?;
            self.output_views.insert(dst_id, view);
            self.output_views_created += 1;
        }
        let Some(output_view) = self.output_views.get(&dst_id) else {
            return Err(ConvertError::Backend("output view missing".to_owned()));
        };

        self.processor
            .blit(&configured.state, &input_view, output_view)
    }

    /// Drop the cached output view of a destination that is about to be destroyed.
    pub fn forget(&mut self, dst: SurfaceId) {
        self.output_views.remove(&dst);
    }

    /// Release processor state and every cached view. The next `convert` rebuilds.
    pub fn reset(&mut self) {
        self.output_views.clear();
        self.configured = None;
    }

    pub fn is_configured(&self) -> bool {
        self.configured.is_some()
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    pub fn output_views_created(&self) -> u64 {
        self.output_views_created
    }

    pub fn cached_output_views(&self) -> usize {
        self.output_views.len()
    }
}

fn validate(desc: &SurfaceDesc) -> Result<(), ConvertError> {
    if !desc.has_area() {
        return Err(ConvertError::DescriptionMismatch {
            width: desc.width,
            height: desc.height,
        });
    }
    if let PixelFormat::Unknown(raw) = desc.format {
        return Err(ConvertError::UnsupportedFormat(raw));
    }
    Ok(())
}
