//! Playback controller - one session of buffer + scheduler + clock
//!
//! **Why**: The host should only say "play these bytes" and present what it
//! is handed. The controller owns everything in between: the decode queue,
//! the sliding window, the scheduler and the injected presentation clock.
//!
//! **Used by**: Hosts (one controller per surface showing an animation)
//!
//! # Session Lifecycle
//!
//! ```text
//! play()  ──> Preparing ──(queue: durations + initial window)──> Ready
//!                                                                  │
//! pump()/tick() on the presentation thread: scheduler ticks,      │
//! window slides, host notified                               <─────┘
//!
//! prepare_for_reuse(): stop clock, bump epoch, drop session
//! ```
//!
//! # Threads
//!
//! - Presentation thread: every public method, every host callback.
//! - Decode queue: prepare and refill jobs. Results come back as
//!   `SessionEvent`s tagged with a generation; events from a superseded
//!   generation are dropped in `pump`.

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, info, trace};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::clock::TickSource;
use super::events::{PlaybackHost, PlaybackInfo, SessionEvent};
use super::frame_buffer::{BufferSource, FrameBuffer, Prepared, SessionLink};
use super::scheduler::{FrameScheduler, PlaybackState, SchedulerPhase, TickOutcome};
use super::workers::{DecodeQueue, QueueHandle};
use crate::entities::{
    AnimatedOptions, ContainerDecoder, CpuFilterPipeline, Decoder, Filter, FilterPipeline, FrameImage,
    PlayError, SourceError,
};

enum Stage {
    Preparing,
    Ready {
        buffer: FrameBuffer,
        scheduler: FrameScheduler,
    },
}

struct Session {
    generation: u64,
    options: AnimatedOptions,
    frame_count: usize,
    stage: Stage,
}

impl Session {
    fn start_index(&self) -> usize {
        self.options.display_mode.start_index(self.frame_count)
    }

    /// Clock runs only for animated display of multi-frame sources
    fn wants_clock(&self) -> bool {
        self.options.display_mode.is_animated() && self.frame_count > 1
    }
}

// Fields drop in declaration order. Everything holding a `QueueHandle`
// (the session's buffer, queued `Prepared` events) goes before `queue`, so the
// queue thread sees its channel close instead of waiting out its deadline.
pub struct PlaybackController {
    clock: Box<dyn TickSource>,
    pipeline: Arc<dyn FilterPipeline>,
    epoch: Arc<AtomicU64>,
    session: Option<Session>,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
    /// Spawned on first `play`, reused by later sessions
    queue: Option<DecodeQueue>,
}

impl PlaybackController {
    /// Controller with the default CPU filter pipeline
    pub fn new(clock: Box<dyn TickSource>) -> Self {
        Self::with_pipeline(clock, Arc::new(CpuFilterPipeline))
    }

    pub fn with_pipeline(clock: Box<dyn TickSource>, pipeline: Arc<dyn FilterPipeline>) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            clock,
            pipeline,
            epoch: Arc::new(AtomicU64::new(0)),
            session: None,
            events_tx,
            events_rx,
            queue: None,
        }
    }

    fn queue_handle(&mut self) -> Result<QueueHandle, PlayError> {
        if let Some(queue) = &self.queue {
            return Ok(queue.handle());
        }
        let queue = DecodeQueue::new("framereel-decode", Arc::clone(&self.epoch))
            .map_err(|e| PlayError::Worker(e.to_string()))?;
        let handle = queue.handle();
        self.queue = Some(queue);
        Ok(handle)
    }

    /// Start a session for `decoder`. Returns the session generation.
    ///
    /// Any previous session is torn down first. Preparation runs on the decode
    /// queue; the host hears `on_ready` from a later `pump`.
    ///
    /// # Errors
    ///
    /// - `PlayError::Options`: invalid options
    /// - `PlayError::Source(NoFrames)`: decoder has zero frames
    pub fn play(
        &mut self,
        decoder: Arc<dyn Decoder>,
        filters: Vec<Filter>,
        options: AnimatedOptions,
    ) -> Result<u64, PlayError> {
        options.validate()?;
        let frame_count = decoder.frame_count();
        if frame_count == 0 {
            return Err(SourceError::NoFrames.into());
        }

        self.prepare_for_reuse();
        let queue = self.queue_handle()?;
        let generation = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;

        let animated = options.display_mode.is_animated() && frame_count > 1;
        let source = BufferSource {
            decoder,
            pipeline: Arc::clone(&self.pipeline),
            filters,
            // Static display only ever needs its one frame
            capacity: if animated { options.buffer_capacity } else { 1 },
            max_time_step: options.max_time_step,
            start_index: options.display_mode.start_index(frame_count),
        };
        let link = SessionLink {
            generation,
            epoch: Arc::clone(&self.epoch),
            queue: queue.clone(),
            events: self.events_tx.clone(),
        };

        info!(
            "Session {}: {} frame(s), {:?}, {:?}, capacity {}",
            generation, frame_count, options.loop_policy, options.display_mode, source.capacity
        );

        queue.execute_with_epoch(generation, move || {
            let prepared = FrameBuffer::prepare(source, link.clone());
            if link.is_current() {
                link.send(SessionEvent::Prepared {
                    generation,
                    prepared: Box::new(prepared),
                });
            } else {
                trace!("Prepared session {} is stale, dropping", generation);
            }
        });

        self.session = Some(Session {
            generation,
            options,
            frame_count,
            stage: Stage::Preparing,
        });
        Ok(generation)
    }

    /// `play` with the built-in container decoder
    ///
    /// # Errors
    ///
    /// `PlayError::Source` for empty, unrecognized or corrupt bytes.
    pub fn play_bytes(
        &mut self,
        bytes: &[u8],
        filters: Vec<Filter>,
        options: AnimatedOptions,
    ) -> Result<u64, PlayError> {
        let decoder = ContainerDecoder::from_bytes(bytes)?;
        self.play(Arc::new(decoder), filters, options)
    }

    /// Deliver pending session events, then pending clock ticks.
    ///
    /// Call from the presentation thread (once per frame is typical).
    pub fn pump(&mut self, host: &mut dyn PlaybackHost) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event, host);
        }
        for dt in self.clock.drain_ticks() {
            self.tick(dt, host);
        }
    }

    /// Block until the current session is ready (or `timeout` passes).
    ///
    /// Events arriving meanwhile are delivered to `host` as `pump` would.
    pub fn wait_until_ready(&mut self, timeout: Duration, host: &mut dyn PlaybackHost) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_ready() {
                return true;
            }
            if self.session.is_none() {
                return false;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.events_rx.recv_timeout(remaining) {
                Ok(event) => self.handle_event(event, host),
                Err(_) => return self.is_ready(),
            }
        }
    }

    fn handle_event(&mut self, event: SessionEvent, host: &mut dyn PlaybackHost) {
        let Some(session) = self.session.as_mut() else {
            trace!("Event for generation {} with no session, dropping", event.generation());
            return;
        };
        if event.generation() != session.generation {
            debug!(
                "Dropping stale event (generation {}, current {})",
                event.generation(),
                session.generation
            );
            return;
        }

        match event {
            SessionEvent::DecodeWarning { index, .. } => host.on_decode_warning(index),
            SessionEvent::Prepared { prepared, .. } => {
                if !matches!(session.stage, Stage::Preparing) {
                    return;
                }
                let Prepared { buffer, first_frame } = *prepared;
                let mut scheduler = FrameScheduler::new(
                    buffer.durations(),
                    session.options.loop_policy,
                    session.options.max_time_step,
                );
                let start_index = session.start_index();
                if start_index > 0 {
                    scheduler.seek(start_index);
                }
                let total = buffer.total_duration();
                let animate = session.wants_clock();
                info!(
                    "Session {} ready: {} frame(s), loop {:.3}s",
                    session.generation, session.frame_count, total
                );
                session.stage = Stage::Ready { buffer, scheduler };

                host.on_ready(total, first_frame.as_ref());
                if animate {
                    self.start();
                }
            }
        }
    }

    /// Feed one clock tick of `dt` seconds to the scheduler.
    ///
    /// Bounded time: any decoding it triggers goes to the background queue.
    pub fn tick(&mut self, dt: f64, host: &mut dyn PlaybackHost) -> TickOutcome {
        let Some(Session {
            stage: Stage::Ready { buffer, scheduler },
            ..
        }) = self.session.as_mut()
        else {
            return TickOutcome::Inactive;
        };

        let outcome = scheduler.tick(dt);
        match outcome {
            TickOutcome::Advanced { previous, current, .. } => {
                buffer.on_advance(previous, current);
                host.on_frame_changed(buffer.frame_image(current).as_ref());
            }
            TickOutcome::Finished { previous, current, .. } => {
                if previous != current {
                    buffer.on_advance(previous, current);
                    host.on_frame_changed(buffer.frame_image(current).as_ref());
                }
                let total = buffer.total_duration();
                self.clock.stop();
                info!("Playback finished at frame {}", current);
                host.on_playback_finished(total);
            }
            TickOutcome::Hold | TickOutcome::Inactive => {}
        }
        outcome
    }

    /// Resume animation (no-op for static display, single frames, or finished sessions)
    pub fn start(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.wants_clock() {
            return false;
        }
        let Stage::Ready { scheduler, .. } = &mut session.stage else {
            return false;
        };
        if scheduler.start() {
            self.clock.start();
            true
        } else {
            false
        }
    }

    /// Pause animation and stop the clock
    pub fn stop(&mut self) {
        if let Some(Session {
            stage: Stage::Ready { scheduler, .. },
            ..
        }) = self.session.as_mut()
        {
            scheduler.pause();
        }
        self.clock.stop();
    }

    /// Rewind to the start frame and return to Idle (clock stopped)
    pub fn reset(&mut self) {
        self.clock.stop();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let start_index = session.start_index();
        if let Stage::Ready { buffer, scheduler } = &mut session.stage {
            let previous = scheduler.current_frame();
            scheduler.reset();
            if start_index > 0 {
                scheduler.seek(start_index);
            }
            if previous != start_index {
                buffer.on_advance(previous, start_index);
            }
            debug!("Session {} reset to frame {}", session.generation, start_index);
        }
    }

    /// Tear down the session so the controller can `play` again.
    ///
    /// Safe at any time and idempotent. Background work of the dropped
    /// session becomes a no-op via the bumped epoch.
    pub fn prepare_for_reuse(&mut self) {
        self.clock.stop();
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(session) = self.session.take() {
            debug!("Session {} dropped (epoch {})", session.generation, epoch);
        }
        // Anything queued belongs to a dead generation
        while self.events_rx.try_recv().is_ok() {}
    }

    /// Block until the decode queue is idle (tests, shutdown)
    pub fn flush(&self, timeout: Duration) -> bool {
        self.queue.as_ref().is_none_or(|queue| queue.flush(timeout))
    }

    fn ready_parts(&self) -> Option<(&FrameBuffer, &FrameScheduler)> {
        match self.session.as_ref().map(|s| &s.stage) {
            Some(Stage::Ready { buffer, scheduler }) => Some((buffer, scheduler)),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready_parts().is_some()
    }

    pub fn generation(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.generation)
    }

    pub fn options(&self) -> Option<&AnimatedOptions> {
        self.session.as_ref().map(|s| &s.options)
    }

    /// More than one frame: worth animating
    pub fn is_animatable(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.frame_count > 1)
    }

    pub fn is_animating(&self) -> bool {
        self.ready_parts().is_some_and(|(_, scheduler)| scheduler.is_playing())
    }

    /// Idle when there is no session or it is still preparing
    pub fn phase(&self) -> SchedulerPhase {
        self.ready_parts()
            .map_or(SchedulerPhase::Idle, |(_, scheduler)| scheduler.phase())
    }

    pub fn playback_state(&self) -> Option<PlaybackState> {
        self.ready_parts().map(|(_, scheduler)| scheduler.state())
    }

    pub fn current_frame(&self) -> Option<usize> {
        self.ready_parts().map(|(_, scheduler)| scheduler.current_frame())
    }

    pub fn frame_image(&self, index: usize) -> Option<FrameImage> {
        self.ready_parts().and_then(|(buffer, _)| buffer.frame_image(index))
    }

    pub fn current_image(&self) -> Option<FrameImage> {
        self.ready_parts()
            .and_then(|(buffer, scheduler)| buffer.frame_image(scheduler.current_frame()))
    }

    pub fn resident_indices(&self) -> Vec<usize> {
        self.ready_parts()
            .map(|(buffer, _)| buffer.resident_indices())
            .unwrap_or_default()
    }

    pub fn info(&self) -> PlaybackInfo {
        let Some(session) = self.session.as_ref() else {
            return PlaybackInfo::default();
        };
        match self.ready_parts() {
            Some((buffer, scheduler)) => {
                let current = scheduler.current_frame();
                PlaybackInfo {
                    frame_count: session.frame_count,
                    loop_duration: buffer.total_duration(),
                    first_frame: buffer.first_resident(),
                    active_frame: buffer.frame_image(current),
                    is_animating: scheduler.is_playing(),
                    cost: buffer.cost_estimate(current),
                }
            }
            None => PlaybackInfo {
                frame_count: session.frame_count,
                ..PlaybackInfo::default()
            },
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        // Turn queued jobs into no-ops before the queue joins its thread
        self.clock.stop();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        // Release every queue handle we own so the worker can exit right away
        self.session = None;
        while self.events_rx.try_recv().is_ok() {}
    }
}
