use super::device::MockSurface;
use desktop_capture::Clock;
use std::{cell::Cell, collections::VecDeque, rc::Rc, time::Duration};
use video_source::{CaptureOutcome, CaptureProvider, CapturedFrame, Error, PixelFormat};

/// Time that only moves when the mock capture says so.
#[derive(Clone, Default)]
pub struct ManualClock(Rc<Cell<Duration>>);

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.0.get()
    }
}

/// One scripted `acquire_frame` result, with the time it takes.
#[derive(Debug, Clone)]
pub enum Step {
    Frame(Duration),
    /// Present a surface of a different size.
    Resized(Duration, u32, u32),
    Timeout(Duration),
    Fail,
}

pub struct MockCapture {
    clock: ManualClock,
    script: VecDeque<Step>,
    surface: MockSurface,
    pub waits: Vec<Duration>,
    pub inits: usize,
    pub cleanups: usize,
    pub releases: usize,
    pub fail_reinit: bool,
    held: bool,
    next_timestamp: i64,
}

impl MockCapture {
    pub fn new(clock: ManualClock, script: Vec<Step>) -> Self {
        MockCapture {
            clock,
            script: script.into(),
            surface: MockSurface::new(1, 1920, 1080, PixelFormat::Bgra8),
            waits: Vec::new(),
            inits: 0,
            cleanups: 0,
            releases: 0,
            fail_reinit: false,
            held: false,
            next_timestamp: 0,
        }
    }

    fn frame(&mut self) -> CaptureOutcome<MockSurface> {
        self.held = true;
        self.next_timestamp += 166_667;
        CaptureOutcome::Frame(CapturedFrame {
            surface: self.surface.clone(),
            timestamp: self.next_timestamp,
        })
    }
}

impl CaptureProvider for MockCapture {
    type Surface = MockSurface;

    fn init(&mut self) -> Result<(), Error> {
        self.inits += 1;
        if self.inits > 1 && self.fail_reinit {
            return Err(Error::NoDisplay(0));
        }
        Ok(())
    }

    fn acquire_frame(&mut self, wait: Duration) -> Result<CaptureOutcome<MockSurface>, Error> {
        self.release_frame()?;
        self.waits.push(wait);

        match self
            .script
            .pop_front()
            .unwrap_or(Step::Frame(Duration::from_millis(1)))
        {
            Step::Frame(cost) => {
                self.clock.advance(cost);
                Ok(self.frame())
            }
            Step::Resized(cost, width, height) => {
                self.clock.advance(cost);
                self.surface = MockSurface::new(self.surface.id + 1, width, height, PixelFormat::Bgra8);
                Ok(self.frame())
            }
            Step::Timeout(cost) => {
                self.clock.advance(cost);
                Ok(CaptureOutcome::Timeout)
            }
            Step::Fail => Err(Error::AccessLost),
        }
    }

    fn release_frame(&mut self) -> Result<(), Error> {
        if self.held {
            self.held = false;
            self.releases += 1;
        }
        Ok(())
    }

    fn cleanup(&mut self) {
        self.held = false;
        self.cleanups += 1;
    }
}
