//! Session events and the host-facing notification interface
//!
//! Background jobs never call the host directly. They post `SessionEvent`s
//! tagged with their session generation; `PlaybackController::pump` drains
//! them on the presentation thread, drops stale generations, and forwards
//! the rest to the `PlaybackHost`.

use crate::entities::{FrameError, FrameImage};

use super::frame_buffer::Prepared;

/// Background → presentation thread message
pub enum SessionEvent {
    /// Initial window decoded
    Prepared {
        generation: u64,
        prepared: Box<Prepared>,
    },
    /// One frame failed to decode or filter (non-fatal)
    DecodeWarning {
        generation: u64,
        index: usize,
        error: FrameError,
    },
}

impl SessionEvent {
    pub fn generation(&self) -> u64 {
        match self {
            SessionEvent::Prepared { generation, .. } | SessionEvent::DecodeWarning { generation, .. } => {
                *generation
            }
        }
    }
}

/// Receives playback notifications. All calls happen on the thread that
/// drives `PlaybackController::pump` / `tick`.
pub trait PlaybackHost {
    /// Show `image` on the host surface
    fn present(&mut self, image: &FrameImage);

    /// Session ready: initial window decoded
    fn on_ready(&mut self, total_loop_duration: f64, first_frame: Option<&FrameImage>) {
        let _ = total_loop_duration;
        if let Some(image) = first_frame {
            self.present(image);
        }
    }

    /// Playhead moved. `None` means the slot is a placeholder: keep showing
    /// the last good image.
    fn on_frame_changed(&mut self, image: Option<&FrameImage>) {
        if let Some(image) = image {
            self.present(image);
        }
    }

    fn on_playback_finished(&mut self, total_loop_duration: f64) {
        let _ = total_loop_duration;
    }

    fn on_decode_warning(&mut self, frame_index: usize) {
        let _ = frame_index;
    }
}

/// Snapshot of a session for host bookkeeping
#[derive(Debug, Clone, Default)]
pub struct PlaybackInfo {
    pub frame_count: usize,
    /// One loop, seconds
    pub loop_duration: f64,
    /// Lowest-index decoded frame
    pub first_frame: Option<FrameImage>,
    pub active_frame: Option<FrameImage>,
    pub is_animating: bool,
    /// Estimated bitmap bytes for the whole sequence
    pub cost: usize,
}
