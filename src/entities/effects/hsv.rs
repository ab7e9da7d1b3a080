//! HSV (Hue, Saturation, Value) adjustment filter.
//!
//! # Parameters
//!
//! - `hue_shift`: -180 to 180 degrees rotation on color wheel
//! - `saturation`: 0.0 (grayscale) to 2.0 (oversaturated), 1.0 = no change
//! - `value`: 0.0 (black) to 2.0 (overbright), 1.0 = no change
//!
//! # Algorithm
//!
//! 1. Convert each pixel RGB -> HSV
//! 2. H += hue_shift (wrap around 0-360)
//! 3. S *= saturation, V *= value (both clamped 0-1)
//! 4. Convert HSV -> RGB

use image::RgbaImage;

pub fn apply(mut image: RgbaImage, hue_shift: f32, saturation: f32, value: f32) -> RgbaImage {
    if hue_shift.abs() < 0.01 && (saturation - 1.0).abs() < 0.001 && (value - 1.0).abs() < 0.001 {
        return image;
    }

    for px in image.pixels_mut() {
        let r = px.0[0] as f32 / 255.0;
        let g = px.0[1] as f32 / 255.0;
        let b = px.0[2] as f32 / 255.0;

        let (h, s, v) = rgb_to_hsv(r, g, b);
        let h_new = (h + hue_shift).rem_euclid(360.0);
        let s_new = (s * saturation).clamp(0.0, 1.0);
        let v_new = (v * value).clamp(0.0, 1.0);
        let (r_out, g_out, b_out) = hsv_to_rgb(h_new, s_new, v_new);

        px.0[0] = (r_out * 255.0).round() as u8;
        px.0[1] = (g_out * 255.0).round() as u8;
        px.0[2] = (b_out * 255.0).round() as u8;
    }
    image
}

/// RGB (0-1) to HSV: H in degrees, S and V in 0-1
fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta < 1e-6 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let s = if max > 1e-6 { delta / max } else { 0.0 };
    (h, s, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match (h / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    (r + m, g + m, b + m)
}
