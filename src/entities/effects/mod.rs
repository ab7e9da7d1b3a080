//! CPU filter set applied to every decoded frame before it enters the window.
//!
//! Filters run in list order, after decode and before the frame is stored:
//!
//! ```text
//! decode_frame(i)
//!   for filter in filters:
//!       image = filter.apply(image)
//!   window.store(i, image)
//! ```
//!
//! # Filter Types
//!
//! | Type | Parameters | Description |
//! |------|------------|-------------|
//! | **BrightnessContrast** | `brightness: -1..1`, `contrast: -1..1` | Color adjustment |
//! | **AdjustHsv** | `hue_shift: -180..180`, `saturation: 0..2`, `value: 0..2` | HSV color space |
//! | **GaussianBlur** | `radius: 0-100` | Separable blur |
//! | **Grayscale** | - | Rec. 601 luma |
//! | **Invert** | - | RGB inversion |
//! | **Resize** | `width`, `height`, `mode` | Fill / Fit / Stretch |
//!
//! `CpuFilterPipeline` is the default `FilterPipeline`; hosts with a GPU
//! pipeline inject their own implementation instead.

pub mod blur;
pub mod brightness;
pub mod hsv;
pub mod resize;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::traits::FilterPipeline;
pub use resize::ScaleMode;

/// One filter step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    BrightnessContrast { brightness: f32, contrast: f32 },
    AdjustHsv { hue_shift: f32, saturation: f32, value: f32 },
    GaussianBlur { radius: f32 },
    Grayscale,
    Invert,
    Resize { width: u32, height: u32, mode: ScaleMode },
}

impl Filter {
    /// Human-readable name for logs
    pub fn display_name(&self) -> &'static str {
        match self {
            Filter::BrightnessContrast { .. } => "Brightness/Contrast",
            Filter::AdjustHsv { .. } => "Adjust HSV",
            Filter::GaussianBlur { .. } => "Gaussian Blur",
            Filter::Grayscale => "Grayscale",
            Filter::Invert => "Invert",
            Filter::Resize { .. } => "Resize",
        }
    }

    pub fn apply(&self, image: RgbaImage) -> Result<RgbaImage, String> {
        match *self {
            Filter::BrightnessContrast { brightness, contrast } => {
                Ok(brightness::apply(image, brightness, contrast))
            }
            Filter::AdjustHsv { hue_shift, saturation, value } => {
                Ok(hsv::apply(image, hue_shift, saturation, value))
            }
            Filter::GaussianBlur { radius } => blur::apply(image, radius),
            Filter::Grayscale => Ok(brightness::grayscale(image)),
            Filter::Invert => Ok(brightness::invert(image)),
            Filter::Resize { width, height, mode } => resize::apply(image, width, height, mode),
        }
    }
}

/// Applies filters in order on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuFilterPipeline;

impl FilterPipeline for CpuFilterPipeline {
    fn apply(&self, image: RgbaImage, filters: &[Filter]) -> Result<RgbaImage, String> {
        filters.iter().try_fold(image, |image, filter| {
            filter
                .apply(image)
                .map_err(|e| format!("{}: {}", filter.display_name(), e))
        })
    }
}
