//! FRAMEREEL - Animated image frame engine
//!
//! Decodes GIF/APNG/WebP frames on demand into a bounded sliding window,
//! schedules them against an injected display clock and hands each frame to
//! a host for presentation.
//!
//! ```ignore
//! let (clock, ticks) = VirtualClock::new();
//! let mut controller = PlaybackController::new(Box::new(clock));
//! controller.play_bytes(&gif_bytes, Vec::new(), AnimatedOptions::default())?;
//! // every display frame:
//! controller.pump(&mut host);
//! ```

// Core engine (queue, buffer, scheduler, clock, controller)
pub mod core;

// Data types, collaborator traits, default decoder and filters
pub mod entities;

#[cfg(test)]
mod testing;

// Re-export commonly used types from core
pub use crate::core::clock::{IntervalClock, TickSource, VirtualClock, VirtualClockHandle};
pub use crate::core::controller::PlaybackController;
pub use crate::core::events::{PlaybackHost, PlaybackInfo};
pub use crate::core::scheduler::{PlaybackState, SchedulerPhase, TickOutcome};

// Re-export entities
pub use entities::{
    AnimatedOptions, ContainerDecoder, CpuFilterPipeline, Decoder, Filter, FilterPipeline, Frame,
    FrameDisplayMode, FrameError, FrameImage, LoopPolicy, OptionsError, PlayError, ScaleMode,
    SourceError,
};
