mod capture;
mod device;
mod encoder;

use self::{
    capture::{ManualClock, MockCapture, Step},
    device::MockBridge,
};
use desktop_capture::{
    sink::StreamSink, CaptureConfig, CapturePipeline, ConvertError, PacingLoop, PipelineError,
    PipelineStats, RunSummary,
};
use std::time::Duration;
use tracing_subscriber::FmtSubscriber;
use video_source::CaptureProvider;

const INTERVAL: Duration = Duration::from_millis(16);

fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .finish();
    // Every test in this binary shares one global subscriber
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

struct Run {
    result: Result<RunSummary, PipelineError>,
    stats: PipelineStats,
    output: Vec<u8>,
}

fn run(bridge: &MockBridge, capture: &mut MockCapture, clock: ManualClock, frames: u32) -> Run {
    run_with(bridge, capture, clock, frames, CaptureConfig::default())
}

fn run_with(
    bridge: &MockBridge,
    capture: &mut MockCapture,
    clock: ManualClock,
    frames: u32,
    config: CaptureConfig,
) -> Run {
    init_tracing();
    capture.init().unwrap();

    let mut sink = StreamSink::new(Vec::new());
    let (result, stats) = {
        let pipeline = CapturePipeline::new(bridge, config, &mut sink);
        let mut pacing = PacingLoop::new(capture, pipeline, clock, INTERVAL, frames);
        let result = pacing.run();
        (result, pacing.pipeline().stats())
    };

    Run {
        result,
        stats,
        output: sink.into_inner(),
    }
}

#[test]
fn steady_capture() {
    let bridge = MockBridge::new();
    let clock = ManualClock::default();
    let mut capture = MockCapture::new(clock.clone(), vec![Step::Frame(ms(4)); 5]);

    let run = run(&bridge, &mut capture, clock, 5);
    let summary = run.result.unwrap();

    assert_eq!(summary.frames, 5);
    assert_eq!(summary.timeouts, 0);
    assert!(summary.packets >= 5);
    assert_eq!(summary.bytes, run.output.len() as u64);
    assert_eq!(capture.waits, vec![ms(16), ms(12), ms(12), ms(12), ms(12)]);
    assert_eq!(capture.releases, 5);
    assert_eq!(capture.cleanups, 1);

    let counters = bridge.counters.borrow();
    assert_eq!(counters.encoded, 5);
    assert_eq!(counters.end_of_stream, 1);
    assert_eq!(counters.encoders_opened, 1);
    assert_eq!(counters.processor_states, 1);
    // One output view per encoder input surface, never one per frame
    assert!(counters.output_views <= counters.surfaces_created);
    assert_eq!(counters.mapped, 5);
    assert_eq!(counters.unmapped, 5);
    assert_eq!(counters.registered, counters.unregistered);
    assert_eq!(run.stats.sessions, 1);
}

#[test]
fn timeouts_shrink_the_wait() {
    let bridge = MockBridge::new();
    let clock = ManualClock::default();
    let mut capture = MockCapture::new(
        clock.clone(),
        vec![Step::Timeout(ms(16)), Step::Timeout(ms(5)), Step::Frame(ms(2))],
    );

    let run = run(&bridge, &mut capture, clock, 1);
    let summary = run.result.unwrap();

    assert_eq!(summary.timeouts, 2);
    assert_eq!(summary.frames, 1);
    assert_eq!(capture.waits, vec![ms(16), ms(0), ms(11)]);
    assert_eq!(bridge.counters.borrow().encoded, 1);
}

#[test]
fn capture_failure_recreates_pipeline() {
    let bridge = MockBridge::new();
    let clock = ManualClock::default();
    let mut capture = MockCapture::new(
        clock.clone(),
        vec![
            Step::Frame(ms(1)),
            Step::Frame(ms(1)),
            Step::Fail,
            Step::Frame(ms(1)),
            Step::Frame(ms(1)),
        ],
    );

    let run = run(&bridge, &mut capture, clock, 4);
    let summary = run.result.unwrap();

    assert_eq!(summary.frames, 4);
    assert_eq!(summary.recoveries, 1);
    assert_eq!(capture.inits, 2);
    // Once to recover and once at the end of the run
    assert_eq!(capture.cleanups, 2);
    assert_eq!(run.stats.sessions, 2);
    assert_eq!(run.output.len(), 4 * 5);

    let counters = bridge.counters.borrow();
    assert_eq!(counters.encoders_opened, 2);
    assert_eq!(counters.end_of_stream, 2);
    assert_eq!(counters.registered, counters.unregistered);
}

#[test]
fn failed_recovery_keeps_written_output() {
    let bridge = MockBridge::new();
    let clock = ManualClock::default();
    let mut capture = MockCapture::new(
        clock.clone(),
        vec![Step::Frame(ms(1)), Step::Frame(ms(1)), Step::Fail],
    );
    capture.fail_reinit = true;

    let run = run(&bridge, &mut capture, clock, 4);

    assert!(matches!(
        run.result,
        Err(PipelineError::Recovery(video_source::Error::NoDisplay(0)))
    ));
    assert_eq!(run.output, vec![0, 0, 0, 1, 0, 0, 0, 0, 1, 1]);
    assert_eq!(bridge.counters.borrow().end_of_stream, 1);
}

#[test]
fn rejected_frame_is_skipped() {
    let bridge = MockBridge::new();
    bridge.counters.borrow_mut().fail_encode_after = Some(1);
    let clock = ManualClock::default();
    let mut capture = MockCapture::new(clock.clone(), Vec::new());

    let run = run(&bridge, &mut capture, clock, 3);
    let summary = run.result.unwrap();

    assert_eq!(summary.frames, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(bridge.counters.borrow().encoded, 3);
    assert_eq!(run.stats.frames_submitted, 3);
}

#[test]
fn device_loss_is_fatal() {
    let bridge = MockBridge::new();
    bridge.counters.borrow_mut().fail_blit = Some(ConvertError::DeviceLost);
    let clock = ManualClock::default();
    let mut capture = MockCapture::new(clock.clone(), Vec::new());

    let run = run(&bridge, &mut capture, clock, 3);

    assert!(matches!(
        run.result,
        Err(PipelineError::Convert(ConvertError::DeviceLost))
    ));
    assert!(run.output.is_empty());
    // The session that was opened still gets flushed
    assert_eq!(bridge.counters.borrow().end_of_stream, 1);
    assert_eq!(capture.releases, 1);
}

#[test]
fn resolution_change_rebuilds_stages() {
    let bridge = MockBridge::new();
    let clock = ManualClock::default();
    let mut capture = MockCapture::new(
        clock.clone(),
        vec![
            Step::Frame(ms(1)),
            Step::Resized(ms(1), 1280, 720),
            Step::Frame(ms(1)),
        ],
    );

    let run = run(&bridge, &mut capture, clock, 3);
    assert_eq!(run.result.unwrap().frames, 3);
    assert_eq!(run.stats.sessions, 2);

    let counters = bridge.counters.borrow();
    assert_eq!(counters.encoders_opened, 2);
    assert_eq!(counters.processor_states, 2);
    assert_eq!(counters.encoded, 3);
    assert_eq!(counters.registered, counters.unregistered);
}

fn packet_indices(output: &[u8]) -> Vec<u8> {
    output.chunks(5).map(|packet| packet[4]).collect()
}

#[test]
fn buffered_pictures_keep_inputs_mapped() {
    let bridge = MockBridge::new();
    bridge.counters.borrow_mut().hold_first = 2;
    let clock = ManualClock::default();
    let mut capture = MockCapture::new(clock.clone(), vec![Step::Frame(ms(4)); 8]);
    let config = CaptureConfig {
        lookahead_depth: 2,
        ..CaptureConfig::default()
    };

    let run = run_with(&bridge, &mut capture, clock, 8, config);
    let summary = run.result.unwrap();

    assert_eq!(summary.frames, 8);
    assert_eq!(summary.packets, 8);
    assert_eq!(packet_indices(&run.output), vec![0, 1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(run.stats.frames_submitted, 8);

    let counters = bridge.counters.borrow();
    assert_eq!(counters.encoded, 8);
    assert_eq!(counters.end_of_stream, 1);
    assert_eq!(counters.locked_while_unmapped, 0);
    assert_eq!(counters.mapped, counters.unmapped);
    assert!(counters.live.is_empty());
    // Each input surface is registered with the encoder once, not once per picture
    assert_eq!(counters.input_registrations, counters.surfaces_created);
}

#[test]
fn buffered_pictures_are_drained_at_the_end() {
    let bridge = MockBridge::new();
    bridge.counters.borrow_mut().hold_first = 8;
    let clock = ManualClock::default();
    let mut capture = MockCapture::new(clock.clone(), vec![Step::Frame(ms(4)); 5]);
    let config = CaptureConfig {
        lookahead_depth: 8,
        ..CaptureConfig::default()
    };

    let run = run_with(&bridge, &mut capture, clock, 5, config);
    let summary = run.result.unwrap();

    assert_eq!(summary.frames, 5);
    assert!(summary.packets >= 5);
    assert_eq!(packet_indices(&run.output), vec![0, 1, 2, 3, 4]);

    let counters = bridge.counters.borrow();
    assert_eq!(counters.encoded, 5);
    assert_eq!(counters.locked_while_unmapped, 0);
    assert!(counters.live.is_empty());
}

#[test]
fn unreadable_picture_keeps_earlier_output() {
    let bridge = MockBridge::new();
    {
        let mut counters = bridge.counters.borrow_mut();
        counters.hold_first = 2;
        counters.unreadable = Some(1);
    }
    let clock = ManualClock::default();
    let mut capture = MockCapture::new(clock.clone(), Vec::new());
    let config = CaptureConfig {
        lookahead_depth: 2,
        ..CaptureConfig::default()
    };

    let run = run_with(&bridge, &mut capture, clock, 4, config);
    let summary = run.result.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.frames, 4);
    assert_eq!(packet_indices(&run.output), vec![0, 2, 3, 4]);
    assert!(bridge.counters.borrow().live.is_empty());
}
