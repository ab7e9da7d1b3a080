//! Frame scheduler - duration-weighted playback cursor
//!
//! **Why**: Container frames have individual durations and the display clock
//! ticks irregularly. An accumulator (not wall-clock timestamps) avoids drift
//! across variable durations and absorbs late or early ticks.
//!
//! **Used by**: PlaybackController (one scheduler per session)
//!
//! # Phases
//!
//! ```text
//! Idle ──start──> Playing <──start/pause──> Paused
//!                    │
//!                    └── last frame of last loop shown ──> Finished
//! reset() from any phase ──> Idle
//! ```
//!
//! # Tick
//!
//! `accumulator += min(dt, max_time_step)`, then while the accumulator covers
//! the current frame's duration, subtract it and step to the next index. A
//! tick longer than one frame steps several frames at once, so
//! `0 <= accumulator < duration(current)` holds after every tick.
//!
//! Finishing happens when the last frame of the last permitted loop has been
//! fully displayed, not when the index wraps.

use log::{debug, trace};
use std::sync::Arc;

use crate::entities::LoopPolicy;

/// Tolerance for float accumulation (0.05 * 2 must cover 0.1)
const TIME_EPSILON: f64 = 1e-9;

/// Scheduler phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Playing,
    Paused,
    Finished,
}

/// Mutable session cursor
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackState {
    pub current_frame_index: usize,
    pub previous_frame_index: usize,
    pub current_loop_count: u32,
    /// Seconds since the displayed frame started
    pub time_accumulator: f64,
    pub is_finished: bool,
}

/// Result of one `tick`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing, tick ignored
    Inactive,
    /// Current frame still on screen
    Hold,
    /// Index moved; `steps` frames were completed during this tick
    Advanced {
        previous: usize,
        current: usize,
        steps: usize,
    },
    /// Terminal frame fully displayed. `steps` counts the final display too.
    Finished {
        previous: usize,
        current: usize,
        steps: usize,
    },
}

pub struct FrameScheduler {
    durations: Arc<[f64]>,
    loop_target: u32,
    max_time_step: f64,
    phase: SchedulerPhase,
    state: PlaybackState,
}

impl FrameScheduler {
    /// # Arguments
    ///
    /// * `durations` - Clamped per-frame durations (all > 0)
    /// * `loop_policy` - How many passes before finishing
    /// * `max_time_step` - Cap applied to each tick's `dt`
    pub fn new(durations: Arc<[f64]>, loop_policy: LoopPolicy, max_time_step: f64) -> Self {
        Self {
            durations,
            loop_target: loop_policy.loop_target(),
            max_time_step,
            phase: SchedulerPhase::Idle,
            state: PlaybackState::default(),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.durations.len()
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_frame(&self) -> usize {
        self.state.current_frame_index
    }

    pub fn is_playing(&self) -> bool {
        self.phase == SchedulerPhase::Playing
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished
    }

    /// Duration of frame `index` (0.0 when out of range)
    pub fn duration(&self, index: usize) -> f64 {
        self.durations.get(index).copied().unwrap_or(0.0)
    }

    /// Idle/Paused → Playing. Returns true if now playing.
    ///
    /// Single-frame sources never animate; a finished session needs `reset`.
    pub fn start(&mut self) -> bool {
        if self.frame_count() <= 1 {
            trace!("start ignored: {} frame(s)", self.frame_count());
            return false;
        }
        match self.phase {
            SchedulerPhase::Idle | SchedulerPhase::Paused => {
                self.phase = SchedulerPhase::Playing;
                debug!("Scheduler playing from frame {}", self.state.current_frame_index);
                true
            }
            SchedulerPhase::Playing => true,
            SchedulerPhase::Finished => false,
        }
    }

    /// Playing → Paused
    pub fn pause(&mut self) {
        if self.phase == SchedulerPhase::Playing {
            self.phase = SchedulerPhase::Paused;
            debug!("Scheduler paused at frame {}", self.state.current_frame_index);
        }
    }

    pub fn stop(&mut self) {
        self.pause();
    }

    /// Re-seed the cursor and return to Idle
    pub fn reset(&mut self) {
        self.state = PlaybackState::default();
        self.phase = SchedulerPhase::Idle;
    }

    /// Jump to `index` (clamped) with a fresh accumulator.
    ///
    /// Refused once finished.
    pub fn seek(&mut self, index: usize) -> bool {
        if self.state.is_finished || self.frame_count() == 0 {
            return false;
        }
        let index = index.min(self.frame_count() - 1);
        self.state.previous_frame_index = self.state.current_frame_index;
        self.state.current_frame_index = index;
        self.state.time_accumulator = 0.0;
        true
    }

    fn is_last_loop(&self) -> bool {
        self.loop_target > 0 && self.state.current_loop_count + 1 >= self.loop_target
    }

    /// Advance the cursor by `dt` seconds.
    pub fn tick(&mut self, dt: f64) -> TickOutcome {
        let frame_count = self.frame_count();
        if self.phase != SchedulerPhase::Playing || frame_count == 0 {
            return TickOutcome::Inactive;
        }

        let dt = if dt.is_finite() { dt.clamp(0.0, self.max_time_step) } else { 0.0 };
        self.state.time_accumulator += dt;

        let previous = self.state.current_frame_index;
        let mut steps = 0;

        loop {
            let current = self.state.current_frame_index;
            let duration = self.duration(current);
            if self.state.time_accumulator + TIME_EPSILON < duration {
                break;
            }

            if current == frame_count - 1 && self.is_last_loop() {
                self.state.time_accumulator = 0.0;
                self.state.is_finished = true;
                self.phase = SchedulerPhase::Finished;
                debug!(
                    "Scheduler finished at frame {} after {} loop(s)",
                    current,
                    self.state.current_loop_count + 1
                );
                return TickOutcome::Finished {
                    previous,
                    current,
                    steps: steps + 1,
                };
            }

            self.state.time_accumulator = (self.state.time_accumulator - duration).max(0.0);
            let next = (current + 1) % frame_count;
            if next == 0 {
                self.state.current_loop_count += 1;
            }
            self.state.previous_frame_index = current;
            self.state.current_frame_index = next;
            steps += 1;
        }

        if steps == 0 {
            TickOutcome::Hold
        } else {
            trace!(
                "Advanced {} -> {} ({} step(s))",
                previous,
                self.state.current_frame_index,
                steps
            );
            TickOutcome::Advanced {
                previous,
                current: self.state.current_frame_index,
                steps,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(durations: &[f64], policy: LoopPolicy) -> FrameScheduler {
        FrameScheduler::new(Arc::from(durations), policy, 1.0)
    }

    fn assert_accumulator_invariant(s: &FrameScheduler) {
        let state = s.state();
        assert!(state.time_accumulator >= 0.0);
        assert!(state.time_accumulator < s.duration(state.current_frame_index));
    }

    /// Test: 4 frames [0.1, 0.2, 0.1, 0.05], play once, dt=0.05 ticks
    ///
    /// Validates: advances after tick 2, 6 and 8, finishes on tick 9 at frame 3
    #[test]
    fn test_scenario_four_frames_once() {
        let mut s = scheduler(&[0.1, 0.2, 0.1, 0.05], LoopPolicy::Count(1));
        assert!(s.start());

        let mut events = Vec::new();
        for tick in 1..=12 {
            match s.tick(0.05) {
                TickOutcome::Advanced { current, .. } => events.push((tick, current)),
                TickOutcome::Finished { current, .. } => events.push((tick, 100 + current)),
                TickOutcome::Hold | TickOutcome::Inactive => {}
            }
        }
        assert_eq!(events, vec![(2, 1), (6, 2), (8, 3), (9, 103)]);
        assert_eq!(s.current_frame(), 3);
        assert_eq!(s.phase(), SchedulerPhase::Finished);
        assert!(s.is_finished());
    }

    /// Test: irregular ticks including oversized ones
    ///
    /// Validates: 0 <= accumulator < duration(current) after every tick
    #[test]
    fn test_accumulator_invariant() {
        let mut s = scheduler(&[0.1, 0.2, 0.1, 0.05, 0.3], LoopPolicy::Infinite);
        s.start();
        let dts = [0.016, 0.5, 0.0, 0.033, 0.9, 0.07, 2.5, 0.001, 0.2, 0.05];
        for _ in 0..20 {
            for &dt in &dts {
                s.tick(dt);
                assert_accumulator_invariant(&s);
            }
        }
    }

    /// Test: count(N) with dt large enough for one frame per tick
    ///
    /// Validates: finishes exactly once after N * frame_count completed frames
    #[test]
    fn test_loop_count_termination() {
        let frame_count = 5;
        let loops = 3;
        let mut s = scheduler(&vec![0.1; frame_count], LoopPolicy::Count(loops));
        s.start();

        let mut completed = 0;
        let mut finished = 0;
        for _ in 0..100 {
            match s.tick(0.1) {
                TickOutcome::Advanced { steps, .. } => completed += steps,
                TickOutcome::Finished { steps, .. } => {
                    completed += steps;
                    finished += 1;
                }
                _ => {}
            }
        }
        assert_eq!(finished, 1);
        assert_eq!(completed, loops as usize * frame_count);
        assert_eq!(s.current_frame(), frame_count - 1);
        assert_eq!(s.state().current_loop_count, loops - 1);
    }

    #[test]
    fn test_multi_step_tick() {
        let mut s = FrameScheduler::new(Arc::from(&[0.1, 0.1, 0.1, 0.1][..]), LoopPolicy::Infinite, 1.0);
        s.start();
        assert_eq!(
            s.tick(0.35),
            TickOutcome::Advanced { previous: 0, current: 3, steps: 3 }
        );
        assert!((s.state().time_accumulator - 0.05).abs() < 1e-9);
        // Wraps and counts the loop
        s.tick(0.1);
        assert_eq!(s.current_frame(), 0);
        assert_eq!(s.state().current_loop_count, 1);
    }

    #[test]
    fn test_dt_clamped_to_max_step() {
        let mut s = FrameScheduler::new(Arc::from(&[0.5, 0.5, 0.5, 0.5][..]), LoopPolicy::Infinite, 0.5);
        s.start();
        // 10s stall counts as 0.5s
        assert_eq!(
            s.tick(10.0),
            TickOutcome::Advanced { previous: 0, current: 1, steps: 1 }
        );
        assert_eq!(s.tick(f64::NAN), TickOutcome::Hold);
        assert_eq!(s.tick(-1.0), TickOutcome::Hold);
    }

    #[test]
    fn test_infinite_never_finishes() {
        let mut s = scheduler(&[0.1, 0.1], LoopPolicy::Infinite);
        s.start();
        for _ in 0..1000 {
            assert!(!matches!(s.tick(0.1), TickOutcome::Finished { .. }));
        }
        assert_eq!(s.state().current_loop_count, 500);
    }

    #[test]
    fn test_single_frame_never_starts() {
        let mut s = scheduler(&[0.1], LoopPolicy::Infinite);
        assert!(!s.start());
        assert_eq!(s.phase(), SchedulerPhase::Idle);
        assert_eq!(s.tick(1.0), TickOutcome::Inactive);
    }

    #[test]
    fn test_pause_resume() {
        let mut s = scheduler(&[0.1, 0.1, 0.1], LoopPolicy::Infinite);
        assert_eq!(s.tick(0.1), TickOutcome::Inactive);
        s.start();
        s.tick(0.1);
        s.pause();
        assert_eq!(s.phase(), SchedulerPhase::Paused);
        assert_eq!(s.tick(0.1), TickOutcome::Inactive);
        assert_eq!(s.current_frame(), 1);
        assert!(s.start());
        s.tick(0.1);
        assert_eq!(s.current_frame(), 2);
    }

    #[test]
    fn test_finished_is_terminal_until_reset() {
        let mut s = scheduler(&[0.1, 0.1], LoopPolicy::Once);
        s.start();
        s.tick(0.1);
        assert!(matches!(s.tick(0.1), TickOutcome::Finished { current: 1, .. }));

        assert!(!s.start());
        assert_eq!(s.tick(0.1), TickOutcome::Inactive);
        assert!(!s.seek(0));
        assert_eq!(s.current_frame(), 1);

        s.reset();
        assert_eq!(s.phase(), SchedulerPhase::Idle);
        assert_eq!(s.state(), PlaybackState::default());
        assert!(s.start());
    }

    #[test]
    fn test_seek_clamps() {
        let mut s = scheduler(&[0.1, 0.1, 0.1], LoopPolicy::Infinite);
        assert!(s.seek(10));
        assert_eq!(s.current_frame(), 2);
    }
}
