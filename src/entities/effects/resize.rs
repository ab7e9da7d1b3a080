//! Resize filter: fit decoded frames to a target box.
//!
//! | Mode | Result |
//! |------|--------|
//! | **Fill** | Scale to cover the box, center-crop the overflow |
//! | **Fit** | Scale to fit inside the box, aspect kept (output may be smaller) |
//! | **Stretch** | Scale to exactly the box, aspect ignored |

use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    #[default]
    Fill,
    Fit,
    Stretch,
}

pub fn apply(image: RgbaImage, width: u32, height: u32, mode: ScaleMode) -> Result<RgbaImage, String> {
    if width == 0 || height == 0 {
        return Err(format!("Invalid resize target {}x{}", width, height));
    }
    let (src_w, src_h) = image.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err("Cannot resize an empty image".to_string());
    }
    if (src_w, src_h) == (width, height) {
        return Ok(image);
    }

    let target_ratio = width as f32 / height as f32;
    let img_ratio = src_w as f32 / src_h as f32;

    let out = match mode {
        ScaleMode::Stretch => imageops::resize(&image, width, height, FilterType::Triangle),
        ScaleMode::Fit => {
            let (w, h) = if target_ratio > img_ratio {
                // Target is wider, height limits
                (((src_w as f32 * height as f32 / src_h as f32) as u32).max(1), height)
            } else {
                (width, ((src_h as f32 * width as f32 / src_w as f32) as u32).max(1))
            };
            imageops::resize(&image, w, h, FilterType::Triangle)
        }
        ScaleMode::Fill => {
            let (w, h) = if target_ratio > img_ratio {
                (width, ((src_h as f32 * width as f32 / src_w as f32) as u32).max(height))
            } else {
                (((src_w as f32 * height as f32 / src_h as f32) as u32).max(width), height)
            };
            let resized = imageops::resize(&image, w, h, FilterType::Triangle);
            let x = (w - width) / 2;
            let y = (h - height) / 2;
            imageops::crop_imm(&resized, x, y, width, height).to_image()
        }
    };
    Ok(out)
}
