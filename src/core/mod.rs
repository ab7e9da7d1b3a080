//! Core engine modules - queue, buffer, scheduler, clock, controller
//!
//! These modules form the playback engine, independent of any UI toolkit.

pub mod clock;
pub mod controller;
pub mod events;
pub mod frame_buffer;
pub mod scheduler;
pub mod workers;

// Re-exports for convenience
pub use clock::{IntervalClock, TickSource, VirtualClock, VirtualClockHandle};
pub use controller::PlaybackController;
pub use events::{PlaybackHost, PlaybackInfo, SessionEvent};
pub use frame_buffer::{FrameBuffer, FrameWindow};
pub use scheduler::{FrameScheduler, PlaybackState, SchedulerPhase, TickOutcome};
pub use workers::DecodeQueue;
