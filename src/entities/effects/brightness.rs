//! Brightness/Contrast filter.
//!
//! `output = (input - 0.5) * (1 + contrast) + 0.5 + brightness`
//!
//! # Parameters
//!
//! - `brightness`: -1.0 (black) to 1.0 (white), 0.0 = no change
//! - `contrast`: -1.0 (flat gray) to 1.0 (high contrast), 0.0 = no change
//!
//! Alpha is left untouched.

use image::RgbaImage;

pub fn apply(mut image: RgbaImage, brightness: f32, contrast: f32) -> RgbaImage {
    if brightness.abs() < 0.0001 && contrast.abs() < 0.0001 {
        return image;
    }

    let cf = 1.0 + contrast;
    for px in image.pixels_mut() {
        for c in &mut px.0[..3] {
            let v = *c as f32 / 255.0;
            let out = ((v - 0.5) * cf + 0.5 + brightness).clamp(0.0, 1.0);
            *c = (out * 255.0).round() as u8;
        }
    }
    image
}

/// Luma grayscale (Rec. 601 weights), alpha preserved
pub fn grayscale(mut image: RgbaImage) -> RgbaImage {
    for px in image.pixels_mut() {
        let [r, g, b, _] = px.0;
        let y = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8;
        px.0[0] = y;
        px.0[1] = y;
        px.0[2] = y;
    }
    image
}

pub fn invert(mut image: RgbaImage) -> RgbaImage {
    for px in image.pixels_mut() {
        for c in &mut px.0[..3] {
            *c = 255 - *c;
        }
    }
    image
}
