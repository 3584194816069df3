use desktop_capture::CaptureConfig;
use std::process::ExitCode;
use tracing_subscriber::FmtSubscriber;

fn init_tracing(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {err}");
    }
}

fn main() -> ExitCode {
    let config = match CaptureConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("usage: desktop-capture [--config <file.json>] [frames] [output]");
            return ExitCode::from(2);
        }
    };
    init_tracing(config.log_level().unwrap_or(tracing::Level::INFO));

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(windows)]
fn run(config: CaptureConfig) -> Result<(), desktop_capture::PipelineError> {
    use desktop_capture::{
        device::D3D11CudaBridge, sink::FileSink, CapturePipeline, PacingLoop, SystemClock,
    };
    use video_source::{CaptureProvider, DisplayDuplicator};

    let bridge = D3D11CudaBridge::new(config.gpu_ordinal)?;
    let mut duplicator = DisplayDuplicator::new(bridge.device().clone(), config.display_index);
    duplicator.init()?;

    let interval = config
        .frame_interval()
        .or_else(|| duplicator.refresh_interval())
        .unwrap_or(std::time::Duration::from_micros(16_667));
    let frame_count = config.frame_count;
    let sink = FileSink::create(&config.output)?;

    let pipeline = CapturePipeline::new(&bridge, config, sink);
    let mut pacing = PacingLoop::new(
        &mut duplicator,
        pipeline,
        SystemClock::default(),
        interval,
        frame_count,
    );
    let summary = pacing.run()?;
    println!(
        "Encoded {} frames into {} bytes ({} timeouts, {} recoveries, {} skipped)",
        summary.frames, summary.bytes, summary.timeouts, summary.recoveries, summary.skipped
    );
    Ok(())
}

#[cfg(not(windows))]
fn run(_config: CaptureConfig) -> Result<(), desktop_capture::PipelineError> {
    Err(desktop_capture::PipelineError::Capture(
        video_source::Error::Unsupported,
    ))
}
