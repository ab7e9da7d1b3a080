//! Presentation clock sources
//!
//! The controller never builds its own timer: a `TickSource` is injected so
//! hosts can drive playback from vsync, a fixed-rate ticker or a test clock.
//! Ticks are pulled (`drain_ticks`) on the presentation thread, so the
//! scheduler always runs where the host presents frames.

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::trace;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Default display refresh rate for `IntervalClock`
pub const DEFAULT_REFRESH_RATE: f64 = 60.0;

/// Periodic elapsed-seconds source
pub trait TickSource: Send {
    fn start(&mut self);
    fn stop(&mut self);
    fn is_running(&self) -> bool;
    /// Elapsed seconds of every tick since the last call (empty while stopped)
    fn drain_ticks(&mut self) -> Vec<f64>;
}

/// Manually driven clock for deterministic playback
///
/// ```ignore
/// let (clock, handle) = VirtualClock::new();
/// let mut controller = PlaybackController::new(Box::new(clock));
/// handle.advance(0.05);
/// controller.pump(&mut host);
/// ```
pub struct VirtualClock {
    running: Arc<AtomicBool>,
    ticks: Receiver<f64>,
}

/// Feeds ticks into a `VirtualClock`; ticks sent while stopped are dropped
#[derive(Clone)]
pub struct VirtualClockHandle {
    running: Arc<AtomicBool>,
    ticks: Sender<f64>,
}

impl VirtualClock {
    pub fn new() -> (Self, VirtualClockHandle) {
        let running = Arc::new(AtomicBool::new(false));
        let (tx, rx) = unbounded();
        (
            Self {
                running: Arc::clone(&running),
                ticks: rx,
            },
            VirtualClockHandle { running, ticks: tx },
        )
    }
}

impl VirtualClockHandle {
    /// Queue one tick of `dt` seconds. Returns false if the clock is stopped.
    pub fn advance(&self, dt: f64) -> bool {
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        self.ticks.send(dt).is_ok()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl TickSource for VirtualClock {
    fn start(&mut self) {
        self.running.store(true, Ordering::Release);
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        // Discard ticks queued before the stop
        while self.ticks.try_recv().is_ok() {}
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn drain_ticks(&mut self) -> Vec<f64> {
        if !self.is_running() {
            return Vec::new();
        }
        self.ticks.try_iter().collect()
    }
}

/// Fixed-rate ticker (display refresh stand-in)
///
/// Built on `crossbeam_channel::tick`; `dt` is measured between delivered
/// ticks so missed ticks show up as one longer step.
pub struct IntervalClock {
    period: Duration,
    ticker: Option<Receiver<Instant>>,
    last: Option<Instant>,
}

impl IntervalClock {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            ticker: None,
            last: None,
        }
    }

    /// Ticker for a display running at `hz` (non-positive falls back to 60 Hz)
    pub fn from_refresh_rate(hz: f64) -> Self {
        let hz = if hz.is_finite() && hz > 0.0 { hz } else { DEFAULT_REFRESH_RATE };
        Self::new(Duration::from_secs_f64(1.0 / hz))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Blocking wait for the next tick (for host loops without their own vsync)
    pub fn wait_tick(&self, timeout: Duration) -> bool {
        match &self.ticker {
            Some(ticker) => ticker.recv_timeout(timeout).is_ok(),
            None => false,
        }
    }
}

impl Default for IntervalClock {
    fn default() -> Self {
        Self::from_refresh_rate(DEFAULT_REFRESH_RATE)
    }
}

impl TickSource for IntervalClock {
    fn start(&mut self) {
        if self.ticker.is_none() {
            trace!("IntervalClock started ({:?})", self.period);
            self.ticker = Some(crossbeam_channel::tick(self.period));
            self.last = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        if self.ticker.take().is_some() {
            trace!("IntervalClock stopped");
        }
        self.last = None;
    }

    fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    fn drain_ticks(&mut self) -> Vec<f64> {
        let Some(ticker) = &self.ticker else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for at in ticker.try_iter() {
            let last = self.last.unwrap_or(at);
            out.push(at.saturating_duration_since(last).as_secs_f64());
            self.last = Some(at);
        }
        out
    }
}
