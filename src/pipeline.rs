use crate::{
    config::CaptureConfig,
    convert::TextureConverter,
    device::{encoder_format, DeviceBridge},
    error::{ConvertError, PipelineError},
    interop::InteropBridge,
    sink::PacketSink,
};
use nvenc::{BufferFormat, DeviceFrame, EncoderSession, Packet, SubmitOutcome};
use video_source::{CapturedFrame, Surface, SurfaceDesc};

/// Running totals of one pipeline across capture sessions.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    /// Encoder sessions opened. More than one means the capture was recreated or resized.
    pub sessions: u64,
    pub frames_submitted: u64,
    pub packets: u64,
    pub bytes: u64,
}

/// Stages created for one capture session. Fields drop in declaration order, which is the
/// teardown order: encoder, interop, converter, then the input surfaces.
struct Ready<D: DeviceBridge> {
    session: EncoderSession<D::Encoder, D::Surface>,
    interop: InteropBridge<D::Interop>,
    converter: TextureConverter<D::Processor>,
    input_surfaces: Vec<D::Surface>,
    source: SurfaceDesc,
    buffer_format: BufferFormat,
}

enum Stage<D: DeviceBridge> {
    Uninitialized,
    Ready(Ready<D>),
}

/// Converts, shares and encodes captured frames, writing packets to `K`.
///
/// Stages are created on the first frame and recreated whenever the captured surface changes
/// size or format.
pub struct CapturePipeline<'d, D: DeviceBridge, K: PacketSink> {
    bridge: &'d D,
    config: CaptureConfig,
    sink: K,
    stage: Stage<D>,
    stats: PipelineStats,
}

impl<'d, D: DeviceBridge, K: PacketSink> CapturePipeline<'d, D, K> {
    pub fn new(bridge: &'d D, config: CaptureConfig, sink: K) -> Self {
        CapturePipeline {
            bridge,
            config,
            sink,
            stage: Stage::Uninitialized,
            stats: PipelineStats::default(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.stage, Stage::Ready(_))
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Encode one captured frame. Returns the number of packets written.
    pub fn process_frame(
        &mut self,
        frame: &CapturedFrame<D::Surface>,
    ) -> Result<usize, PipelineError> {
        let desc = frame.surface.desc();
        if !desc.has_area() {
            return Err(ConvertError::DescriptionMismatch {
                width: desc.width,
                height: desc.height,
            }
            .into());
        }

        let needs_setup = match &self.stage {
            Stage::Ready(ready) => ready.source != desc,
            Stage::Uninitialized => true,
        };
        if needs_setup {
            if self.is_ready() {
                tracing::info!(
                    width = desc.width,
                    height = desc.height,
                    "Captured surface changed, recreating pipeline"
                );
                self.shutdown()?;
            }
            self.stage = Stage::Ready(self.create_stages(desc)?);
            self.stats.sessions += 1;
        }

        let Stage::Ready(ready) = &mut self.stage else {
            return Err(PipelineError::NoInputSurface);
        };

        let dst = ready
            .session
            .next_input_frame()
            .cloned()
            .ok_or(PipelineError::NoInputSurface)?;
        ready.converter.convert(&frame.surface, &dst)?;

        // The encoder may read the input after `submit_frame` returns, so the surface stays
        // mapped until the session reports it released.
        let memory = ready.interop.acquire_view(&dst)?.hold();
        let device_frame = DeviceFrame {
            memory,
            width: desc.width,
            height: desc.height,
            format: ready.buffer_format,
        };
        let timestamp = u64::try_from(frame.timestamp).unwrap_or(0);
        let submitted = ready.session.submit_frame(&device_frame, timestamp);

        for surface in ready.session.take_released_inputs() {
            if let Err(err) = ready.interop.release(surface.id()) {
                tracing::warn!(surface = surface.id().0, %err, "Releasing an encoder input failed");
            }
        }

        let (packets, submitted) = match submitted {
            Ok(SubmitOutcome::Packets(packets)) => (packets, Ok(())),
            Ok(SubmitOutcome::NeedsMoreInput) => (Vec::new(), Ok(())),
            // Pictures read before the failure are still written
            Err(err) => (ready.session.take_retrieved(), Err(PipelineError::Submit(err))),
        };
        self.write_packets(&packets)?;
        submitted?;
        self.stats.frames_submitted += 1;

        tracing::trace!(packets = packets.len(), "Frame encoded");
        Ok(packets.len())
    }

    /// Flush the encoder into the sink and release every stage. Safe to call more than once.
    ///
    /// Teardown completes even if the flush fails. The flush error is returned afterwards.
    pub fn shutdown(&mut self) -> Result<(), PipelineError> {
        let Stage::Ready(mut ready) = std::mem::replace(&mut self.stage, Stage::Uninitialized)
        else {
            return Ok(());
        };

        let (packets, flushed) = match ready.session.flush() {
            Ok(packets) => (packets, Ok(())),
            Err(err) => (ready.session.take_retrieved(), Err(PipelineError::Flush(err))),
        };
        let written = self.write_packets(&packets);

        ready.interop.unregister_all();
        ready.converter.reset();
        let surfaces = ready.input_surfaces.len();
        drop(ready);
        tracing::debug!(surfaces, "Pipeline stages released");

        flushed?;
        written
    }

    /// Shut down and flush the sink.
    pub fn finish(&mut self) -> Result<(), PipelineError> {
        let shutdown = self.shutdown();
        self.sink.flush()?;
        shutdown
    }

    fn write_packets(&mut self, packets: &[Packet]) -> Result<(), PipelineError> {
        for packet in packets {
            self.sink.write_packet(packet)?;
            self.stats.packets += 1;
            self.stats.bytes += packet.data.len() as u64;
        }
        Ok(())
    }

    fn create_stages(&self, source: SurfaceDesc) -> Result<Ready<D>, PipelineError> {
        let buffer_format =
            encoder_format(source.format).ok_or(PipelineError::UnsupportedSource(source.format))?;
        let session_config = self
            .config
            .session_config(source.width, source.height, buffer_format);

        let input_surfaces = (0..session_config.pool_capacity())
            .map(|_| {
                self.bridge
                    .create_encode_surface(source.width, source.height, source.format)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let encoder = self
            .bridge
            .open_encoder()
            .map_err(PipelineError::EncoderOpen)?;
        let mut session = EncoderSession::new(encoder);
        session
            .open(session_config, input_surfaces.clone())
            .map_err(PipelineError::EncoderOpen)?;
        match session.sequence_params() {
            Ok(headers) => tracing::debug!(bytes = headers.len(), "Sequence parameters ready"),
            Err(err) => tracing::warn!(%err, "Could not read sequence parameters"),
        }

        let interop = InteropBridge::new(self.bridge.create_interop()?, self.bridge.view_kind());
        let converter = TextureConverter::new(self.bridge.create_processor()?);

        tracing::info!(
            width = source.width,
            height = source.height,
            format = ?buffer_format,
            surfaces = input_surfaces.len(),
            "Pipeline ready"
        );

        Ok(Ready {
            session,
            interop,
            converter,
            input_surfaces,
            source,
            buffer_format,
        })
    }
}

impl<'d, D: DeviceBridge, K: PacketSink> Drop for CapturePipeline<'d, D, K> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::error!(%err, "Pipeline shutdown failed");
        }
    }
}
