//! Gaussian blur filter.
//!
//! Separable: one horizontal and one vertical pass, O(n*r) per pixel instead
//! of O(n*r^2). Work is done in f32 to avoid banding between passes; edge
//! pixels use clamped sampling.

use image::RgbaImage;

/// Larger radii are clamped; the kernel grows linearly with the radius
pub const MAX_BLUR_RADIUS: f32 = 100.0;

pub fn apply(image: RgbaImage, radius: f32) -> Result<RgbaImage, String> {
    if !radius.is_finite() || radius < 0.0 {
        return Err(format!("Invalid blur radius {}", radius));
    }
    if radius == 0.0 || image.width() == 0 || image.height() == 0 {
        return Ok(image);
    }
    let radius = radius.min(MAX_BLUR_RADIUS);

    let (width, height) = (image.width() as usize, image.height() as usize);
    let src: Vec<f32> = image.as_raw().iter().map(|&v| v as f32 / 255.0).collect();

    let kernel = gaussian_kernel(radius);
    let temp = convolve(&src, width, height, &kernel, Axis::Horizontal);
    let result = convolve(&temp, width, height, &kernel, Axis::Vertical);

    let bytes = result
        .iter()
        .map(|&v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();
    // Same dimensions as the source, so the buffer length always matches
    Ok(RgbaImage::from_raw(width as u32, height as u32, bytes).unwrap_or(image))
}

/// 1D kernel of size `2*ceil(radius*2) + 1`, sigma = radius/2, normalized to 1.0
fn gaussian_kernel(radius: f32) -> Vec<f32> {
    let half_size = (radius * 2.0).ceil() as i32;
    let sigma = radius / 2.0;
    let sigma2 = sigma * sigma;

    let mut kernel: Vec<f32> = (-half_size..=half_size)
        .map(|i| {
            let x = i as f32;
            (-x * x / (2.0 * sigma2)).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

fn convolve(src: &[f32], width: usize, height: usize, kernel: &[f32], axis: Axis) -> Vec<f32> {
    let mut dst = vec![0.0f32; src.len()];
    let half = (kernel.len() / 2) as i32;

    for y in 0..height {
        for x in 0..width {
            let mut acc = [0.0f32; 4];
            for (ki, &weight) in kernel.iter().enumerate() {
                let offset = ki as i32 - half;
                let (sx, sy) = match axis {
                    Axis::Horizontal => ((x as i32 + offset).clamp(0, width as i32 - 1) as usize, y),
                    Axis::Vertical => (x, (y as i32 + offset).clamp(0, height as i32 - 1) as usize),
                };
                let idx = (sy * width + sx) * 4;
                for (c, channel) in acc.iter_mut().enumerate() {
                    *channel += src[idx + c] * weight;
                }
            }
            let dst_idx = (y * width + x) * 4;
            dst[dst_idx..dst_idx + 4].copy_from_slice(&acc);
        }
    }
    dst
}
