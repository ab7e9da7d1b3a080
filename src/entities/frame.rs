//! Frame slots and per-frame durations
//!
//! **Why**: The window holds a fixed number of slots; a slot either owns a
//! decoded, filtered image or is a placeholder (not yet decoded, evicted, or
//! permanently failed). Hosts keep showing the last good image while the
//! current slot is a placeholder.
//!
//! **Used by**: FrameBuffer (slot storage), FrameScheduler (durations)
//!
//! # Durations
//!
//! Raw decoder durations are normalized once per session:
//! - non-finite or `<= 0` → `DEFAULT_FRAME_DURATION` (1/15 s)
//! - floored at `MIN_FRAME_DURATION`
//! - capped at `max_time_step` so one pathological frame cannot stall playback

use image::RgbaImage;
use std::sync::Arc;

use super::traits::Decoder;

/// Decoded image handle shared between the window and the host
pub type FrameImage = Arc<RgbaImage>;

/// Fallback when a container stores no usable delay (15 fps)
pub const DEFAULT_FRAME_DURATION: f64 = 1.0 / 15.0;

/// Lower bound on any frame duration (seconds)
pub const MIN_FRAME_DURATION: f64 = 0.001;

/// Slot loading status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Placeholder, // Not decoded (yet), or evicted
    Loaded,      // Decoded + filtered image present
    Error,       // Decode/filter failed, placeholder for the rest of the session
}

/// One window slot: a frame index plus its image, if resident
#[derive(Debug, Clone)]
pub struct Frame {
    index: usize,
    image: Option<FrameImage>,
    duration: f64,
    status: FrameStatus,
}

impl Frame {
    /// Empty placeholder for `index`
    pub fn placeholder(index: usize, duration: f64) -> Self {
        Self {
            index,
            image: None,
            duration,
            status: FrameStatus::Placeholder,
        }
    }

    pub fn loaded(index: usize, image: FrameImage, duration: f64) -> Self {
        Self {
            index,
            image: Some(image),
            duration,
            status: FrameStatus::Loaded,
        }
    }

    pub fn failed(index: usize, duration: f64) -> Self {
        Self {
            index,
            image: None,
            duration,
            status: FrameStatus::Error,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn image(&self) -> Option<&FrameImage> {
        self.image.as_ref()
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn status(&self) -> FrameStatus {
        self.status
    }

    /// True when no decoded image is held
    pub fn is_placeholder(&self) -> bool {
        self.image.is_none()
    }

    /// Bitmap bytes held by this slot
    pub fn mem(&self) -> usize {
        self.image.as_ref().map_or(0, |img| image_cost(img))
    }
}

/// RGBA8 bitmap size in bytes
pub fn image_cost(image: &RgbaImage) -> usize {
    image.width() as usize * image.height() as usize * 4
}

/// Normalize one raw decoder duration (seconds).
pub fn clamp_duration(raw: f64, max_time_step: f64) -> f64 {
    let duration = if raw.is_finite() && raw > 0.0 {
        raw
    } else {
        DEFAULT_FRAME_DURATION
    };
    duration.max(MIN_FRAME_DURATION).min(max_time_step)
}

/// Per-frame clamped durations and their sum (one loop).
pub fn compute_durations(decoder: &dyn Decoder, max_time_step: f64) -> (f64, Vec<f64>) {
    let durations: Vec<f64> = (0..decoder.frame_count())
        .map(|i| clamp_duration(decoder.frame_duration(i), max_time_step))
        .collect();
    let total = durations.iter().sum();
    (total, durations)
}
