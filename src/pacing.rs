use crate::{
    device::DeviceBridge, error::PipelineError, pipeline::CapturePipeline, sink::PacketSink,
};
use std::time::{Duration, Instant};
use video_source::{CaptureOutcome, CaptureProvider};

/// Wait budget of the next capture attempt after one that took `elapsed`.
#[inline]
pub fn next_wait(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Monotonic time source.
pub trait Clock {
    /// Time since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// What a finished run did.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Captured frames that made it through the encoder.
    pub frames: u32,
    pub timeouts: u32,
    pub recoveries: u32,
    /// Captured frames dropped after a recoverable failure.
    pub skipped: u32,
    pub packets: u64,
    pub bytes: u64,
}

/// Paces capture attempts against a frame interval and drives every captured frame through the
/// pipeline.
pub struct PacingLoop<'p, 'd, P, D, K, C>
where
    P: CaptureProvider,
    D: DeviceBridge<Surface = P::Surface>,
    K: PacketSink,
    C: Clock,
{
    provider: &'p mut P,
    pipeline: CapturePipeline<'d, D, K>,
    clock: C,
    interval: Duration,
    frame_count: u32,
}

impl<'p, 'd, P, D, K, C> PacingLoop<'p, 'd, P, D, K, C>
where
    P: CaptureProvider,
    D: DeviceBridge<Surface = P::Surface>,
    K: PacketSink,
    C: Clock,
{
    /// The provider must already be initialized.
    pub fn new(
        provider: &'p mut P,
        pipeline: CapturePipeline<'d, D, K>,
        clock: C,
        interval: Duration,
        frame_count: u32,
    ) -> Self {
        PacingLoop {
            provider,
            pipeline,
            clock,
            interval,
            frame_count,
        }
    }

    pub fn pipeline(&self) -> &CapturePipeline<'d, D, K> {
        &self.pipeline
    }

    /// Run until `frame_count` frames are encoded or a fatal error occurs. The capture session
    /// is cleaned up and the pipeline flushed either way.
    pub fn run(&mut self) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();
        tracing::info!(
            frames = self.frame_count,
            interval_us = self.interval.as_micros() as u64,
            "Capture started"
        );

        let result = self.run_cycles(&mut summary);

        // Capture is torn down before the encoder drains
        self.provider.cleanup();
        let finished = self.pipeline.finish();

        let stats = self.pipeline.stats();
        summary.packets = stats.packets;
        summary.bytes = stats.bytes;

        result?;
        finished?;
        tracing::info!(
            frames = summary.frames,
            timeouts = summary.timeouts,
            recoveries = summary.recoveries,
            skipped = summary.skipped,
            packets = summary.packets,
            bytes = summary.bytes,
            "Capture finished"
        );
        Ok(summary)
    }

    fn run_cycles(&mut self, summary: &mut RunSummary) -> Result<(), PipelineError> {
        let mut wait = self.interval;

        while summary.frames < self.frame_count {
            let start = self.clock.now();

            match self.provider.acquire_frame(wait) {
                Ok(CaptureOutcome::Timeout) => {
                    summary.timeouts += 1;
                }
                Ok(CaptureOutcome::Frame(frame)) => {
                    let processed = self.pipeline.process_frame(&frame);
                    drop(frame);
                    let released = self.provider.release_frame();

                    match processed {
                        Ok(_) => summary.frames += 1,
                        Err(err) if !err.is_fatal() => {
                            summary.skipped += 1;
                            tracing::warn!(%err, "Frame skipped");
                        }
                        Err(err) => return Err(err),
                    }

                    if let Err(err) = released {
                        tracing::warn!(%err, "Releasing frame failed, recreating capture");
                        self.recover()?;
                        summary.recoveries += 1;
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, "Capture failed, recreating capture");
                    self.recover()?;
                    summary.recoveries += 1;
                }
            }

            let elapsed = self.clock.now().saturating_sub(start);
            wait = next_wait(self.interval, elapsed);
            tracing::trace!(
                elapsed_us = elapsed.as_micros() as u64,
                wait_us = wait.as_micros() as u64,
                "Cycle finished"
            );
        }
        Ok(())
    }

    /// Tear down everything tied to the capture session and start a new one.
    fn recover(&mut self) -> Result<(), PipelineError> {
        let reset = self.pipeline.shutdown();
        self.provider.cleanup();
        self.provider.init().map_err(|err| {
            tracing::error!(%err, "Could not recreate the capture session");
            PipelineError::Recovery(err)
        })?;
        reset
    }
}
