//! Collaborator interfaces consumed by the engine.
//!
//! Container parsing and image filtering live outside the engine; it only
//! needs these narrow capabilities. Both are assumed reentrant: several
//! sessions may call into the same decoder or pipeline concurrently, while a
//! single session only ever calls them from its own serialized queue.

use image::RgbaImage;
use std::sync::Arc;

use super::effects::Filter;
use super::error::FrameError;

/// Random-access frame source for one container.
pub trait Decoder: Send + Sync {
    /// Number of frames in the container (0 for an undecodable source)
    fn frame_count(&self) -> usize;

    /// Raw (pre-clamp) display duration of frame `index`, in seconds
    fn frame_duration(&self, index: usize) -> f64;

    /// Decode frame `index` to a full-canvas RGBA image
    fn decode_frame(&self, index: usize) -> Result<RgbaImage, FrameError>;
}

/// `image × filter-list → image`, may fail.
pub trait FilterPipeline: Send + Sync {
    fn apply(&self, image: RgbaImage, filters: &[Filter]) -> Result<RgbaImage, String>;
}

/// Blanket impl: Arc<T> implements traits if T does
impl<T: Decoder + ?Sized> Decoder for Arc<T> {
    fn frame_count(&self) -> usize {
        (**self).frame_count()
    }

    fn frame_duration(&self, index: usize) -> f64 {
        (**self).frame_duration(index)
    }

    fn decode_frame(&self, index: usize) -> Result<RgbaImage, FrameError> {
        (**self).decode_frame(index)
    }
}

impl<T: FilterPipeline + ?Sized> FilterPipeline for Arc<T> {
    fn apply(&self, image: RgbaImage, filters: &[Filter]) -> Result<RgbaImage, String> {
        (**self).apply(image, filters)
    }
}
